//! Message contracts exchanged with the rating subsystem.
//!
//! All contracts travel as camelCase JSON.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::request::{flexible_datetime, Address, Contact, Package, ShipmentRequest};

/// Request sent to the rating subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRequestCreated {
    /// Rate group.
    pub rate_group: String,
    /// Ship date.
    #[serde(with = "flexible_datetime")]
    pub ship_date: NaiveDateTime,
    /// Commitment date.
    #[serde(default, with = "flexible_datetime::option")]
    pub commitment_date: Option<NaiveDateTime>,
    /// Shipper account.
    pub shipper: String,
    /// Rate types to shop.
    pub rate_type: Vec<String>,
    /// Destination.
    pub receiver: RateReceiver,
    /// Packages in shipment order.
    pub packages: Vec<Package>,
}

/// Receiver block of a [`RateRequestCreated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateReceiver {
    /// Delivery address.
    pub address: Address,
    /// Receiver contact.
    pub contact: Contact,
}

impl RateRequestCreated {
    /// Build a rate request from an inbound shipment, trimming every string.
    pub fn from_request(request: &ShipmentRequest) -> Self {
        let a = &request.receiver.address;
        let c = &request.receiver.contact;
        Self {
            rate_group: trim(&request.rate_group),
            ship_date: request.ship_date,
            commitment_date: request.commitment_date,
            shipper: trim(&request.shipper),
            rate_type: request.rate_type.iter().map(|r| trim(r)).collect(),
            receiver: RateReceiver {
                address: Address {
                    city: trim(&a.city),
                    state: trim(&a.state),
                    postal_code: trim(&a.postal_code),
                    country_code: trim(&a.country_code),
                    residential: a.residential,
                },
                contact: Contact {
                    name: trim(&c.name),
                    email: trim(&c.email),
                    company: trim(&c.company),
                    phone: trim(&c.phone),
                },
            },
            packages: request
                .packages
                .iter()
                .map(|p| {
                    let mut p = p.clone();
                    p.dimensions.uom = trim(&p.dimensions.uom);
                    p.weight.uom = trim(&p.weight.uom);
                    p
                })
                .collect(),
        }
    }
}

fn trim(s: &str) -> String {
    s.trim().to_string()
}

/// Delivery commitment returned by the rater.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Commit {
    /// Delivery weekday.
    pub delivery_day: String,
    /// Delivery date.
    pub delivery_date: String,
    /// Transit days.
    pub transit_days: u32,
}

/// Reply from the rating subsystem.
///
/// A `None` carrier service means no service qualified for the shipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateResultCreated {
    /// Rate group.
    pub rate_group: String,
    /// Winning service, absent when none qualified.
    pub carrier_service_name: Option<String>,
    /// Receiver postal code.
    pub postal_code: String,
    /// Total rated cost.
    pub total_cost: f64,
    /// Rated weight.
    pub rated_weight: f64,
    /// Rated weight unit.
    #[serde(rename = "ratedWeightUOM")]
    pub rated_weight_uom: String,
    /// Ship date as sent by the rater.
    pub ship_date: Option<String>,
    /// Ship weekday.
    pub ship_day: Option<String>,
    /// Commitment date.
    pub commitment_date: Option<String>,
    /// Per-carrier rate results, passed through untouched.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub results: serde_json::Value,
    /// Delivery commitment.
    pub commit: Commit,
    /// Residential delivery.
    pub residential: bool,
    /// Signature required.
    pub signature_required: bool,
    /// Adult signature required.
    pub adult_signature_required: bool,
}

/// Retraining-feed event published after every authoritative rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainUnitCreated {
    /// Rate group.
    pub rate_group: String,
    /// Winning service.
    pub carrier_service_name: Option<String>,
    /// Receiver postal code.
    pub postal_code: String,
    /// Total rated cost.
    pub total_cost: f64,
    /// Rated weight.
    pub rated_weight: f64,
    /// Rated weight unit.
    #[serde(rename = "ratedWeightUOM")]
    pub rated_weight_uom: String,
    /// Ship date.
    pub ship_date: Option<String>,
    /// Ship weekday.
    pub ship_day: Option<String>,
    /// Commitment date.
    pub commitment_date: Option<String>,
    /// Per-carrier rate results.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub results: serde_json::Value,
    /// Residential delivery.
    pub residential: bool,
    /// Signature required.
    pub signature_required: bool,
    /// Adult signature required.
    pub adult_signature_required: bool,
    /// Delivery commitment.
    pub commit: Commit,
}

impl From<&RateResultCreated> for RetrainUnitCreated {
    fn from(r: &RateResultCreated) -> Self {
        Self {
            rate_group: r.rate_group.clone(),
            carrier_service_name: r.carrier_service_name.clone(),
            postal_code: r.postal_code.clone(),
            total_cost: r.total_cost,
            rated_weight: r.rated_weight,
            rated_weight_uom: r.rated_weight_uom.clone(),
            ship_date: r.ship_date.clone(),
            ship_day: r.ship_day.clone(),
            commitment_date: r.commitment_date.clone(),
            results: r.results.clone(),
            residential: r.residential,
            signature_required: r.signature_required,
            adult_signature_required: r.adult_signature_required,
            commit: r.commit.clone(),
        }
    }
}
