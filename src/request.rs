//! Inbound shipment request types and validation.
//!
//! The JSON shape mirrors what upstream callers already send: camelCase
//! fields, a receiver with address and contact, and an ordered package list.
//! Serde enforces presence of structural fields; [`ShipmentRequest::validate`]
//! enforces the content rules (non-empty strings, 5-digit postal code).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned when the rate group is missing or blank.
pub const RATE_GROUP_MESSAGE: &str = "Please provide a valid rate group in your request.";

/// Message returned when the receiver postal code is not 5 digits.
pub const POSTAL_CODE_MESSAGE: &str = "Please provide a valid 5-digit postal code.";

/// One or more request fields failed validation.
///
/// Carries every violated rule so the caller sees them all at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("request validation failed: {}", .messages.join("; "))]
pub struct ValidationError {
    /// Human-readable messages, one per violated rule.
    pub messages: Vec<String>,
}

impl ValidationError {
    /// Build an error carrying a single message.
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

/// A shipment to be classified and, possibly, rated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
    /// Named partition of traffic with its own model and historical dataset.
    #[serde(default)]
    pub rate_group: String,
    /// Date the shipment leaves the shipper.
    #[serde(with = "flexible_datetime")]
    pub ship_date: NaiveDateTime,
    /// Date the shipment has been promised by.
    #[serde(default, with = "flexible_datetime::option")]
    pub commitment_date: Option<NaiveDateTime>,
    /// Shipper account identifier.
    pub shipper: String,
    /// Destination address and contact.
    pub receiver: Receiver,
    /// Rate types to shop (e.g. `"LIST"`, `"ACCOUNT"`).
    pub rate_type: Vec<String>,
    /// Packages in shipment order.
    pub packages: Vec<Package>,
    /// Populate `detail.estimatedCost` from history when not carrier-rated.
    #[serde(default)]
    pub estimate_cost: Option<bool>,
    /// Populate `detail.estimatedTransitDays` from history when not carrier-rated.
    #[serde(default)]
    pub estimate_transit_days: Option<bool>,
}

/// Destination of a shipment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receiver {
    /// Delivery address.
    pub address: Address,
    /// Person or company receiving the shipment.
    pub contact: Contact,
}

/// Delivery address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// City name.
    pub city: String,
    /// State or province code.
    pub state: String,
    /// Five-digit postal code.
    pub postal_code: String,
    /// ISO country code.
    pub country_code: String,
    /// Whether the address is residential.
    #[serde(default)]
    pub residential: bool,
}

/// Receiver contact details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    /// Contact name.
    pub name: String,
    /// Contact e-mail.
    pub email: String,
    /// Company name.
    pub company: String,
    /// Phone number.
    pub phone: String,
}

/// A single package in the shipment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package dimensions.
    pub dimensions: Dimensions,
    /// Package weight.
    pub weight: Weight,
    /// Whether a signature is required on delivery.
    #[serde(default)]
    pub signature_required: bool,
    /// Whether an adult signature is required on delivery.
    #[serde(default)]
    pub adult_signature_required: bool,
}

/// Package dimensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    /// Unit of measure (e.g. `"IN"`).
    pub uom: String,
    /// Length in `uom`.
    pub length: u32,
    /// Width in `uom`.
    pub width: u32,
    /// Height in `uom`.
    pub height: u32,
}

/// Package weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Weight {
    /// Unit of measure (e.g. `"LB"`).
    pub uom: String,
    /// Weight value in `uom`.
    pub value: f64,
}

impl ShipmentRequest {
    /// Receiver postal code as sent by the caller.
    pub fn postal_code(&self) -> &str {
        &self.receiver.address.postal_code
    }

    /// Whether the caller asked for a historical cost estimate.
    pub fn wants_cost(&self) -> bool {
        self.estimate_cost.unwrap_or(false)
    }

    /// Whether the caller asked for a historical transit-day estimate.
    pub fn wants_transit_days(&self) -> bool {
        self.estimate_transit_days.unwrap_or(false)
    }

    /// Validate content rules that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every violated rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut messages = Vec::new();

        if self.rate_group.trim().is_empty() {
            messages.push(RATE_GROUP_MESSAGE.to_string());
        }
        if !is_valid_postal_code(self.postal_code()) {
            messages.push(POSTAL_CODE_MESSAGE.to_string());
        }

        let address = &self.receiver.address;
        let contact = &self.receiver.contact;
        for (field, value) in [
            ("Shipper", self.shipper.as_str()),
            ("City", address.city.as_str()),
            ("State", address.state.as_str()),
            ("CountryCode", address.country_code.as_str()),
            ("Name", contact.name.as_str()),
            ("Email", contact.email.as_str()),
            ("Company", contact.company.as_str()),
            ("Phone", contact.phone.as_str()),
        ] {
            if value.trim().is_empty() {
                messages.push(required(field));
            }
        }

        for package in &self.packages {
            if package.dimensions.uom.trim().is_empty() {
                messages.push(required("Dimensions.UOM"));
            }
            if package.weight.uom.trim().is_empty() {
                messages.push(required("Weight.UOM"));
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { messages })
        }
    }
}

fn required(field: &str) -> String {
    format!("The {field} field is required.")
}

/// Return `true` if `postal_code` is exactly five ASCII digits.
pub fn is_valid_postal_code(postal_code: &str) -> bool {
    postal_code.len() == 5 && postal_code.bytes().all(|b| b.is_ascii_digit())
}

/// Serde helpers accepting the date formats upstream callers send:
/// RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]`, or a bare `YYYY-MM-DD`.
pub mod flexible_datetime {
    use super::*;
    use serde::{Deserializer, Serializer};

    const OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Parse a date or date-time string.
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN))
    }

    /// Format a date-time the way it travels on the wire.
    pub fn format(value: &NaiveDateTime) -> String {
        value.format(OUTPUT_FORMAT).to_string()
    }

    /// Serialize a date-time.
    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(value))
    }

    /// Deserialize a date-time.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
    }

    /// Optional variant.
    pub mod option {
        use super::*;

        /// Serialize an optional date-time.
        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_some(&super::format(v)),
                None => s.serialize_none(),
            }
        }

        /// Deserialize an optional date-time.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}"))),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::ground_request;
    use super::*;

    #[test]
    fn test_valid_request_passes_validation() {
        assert!(ground_request().validate().is_ok());
    }

    #[test]
    fn test_missing_rate_group_deserializes_as_empty_and_fails_validation() {
        let mut json = serde_json::to_value(ground_request()).expect("test: ser");
        json.as_object_mut().expect("test: object").remove("rateGroup");
        let req: ShipmentRequest = serde_json::from_value(json).expect("test: deser");
        let err = req.validate().expect_err("test: must fail");
        assert_eq!(err.messages, vec![RATE_GROUP_MESSAGE.to_string()]);
    }

    #[test]
    fn test_postal_code_must_be_five_digits() {
        assert!(is_valid_postal_code("90210"));
        assert!(!is_valid_postal_code("9021"));
        assert!(!is_valid_postal_code("902100"));
        assert!(!is_valid_postal_code("90-21"));
        assert!(!is_valid_postal_code("9021a"));
    }

    #[test]
    fn test_validation_collects_every_violation() {
        let mut req = ground_request();
        req.rate_group = "  ".into();
        req.receiver.address.postal_code = "ABCDE".into();
        req.receiver.contact.email = String::new();
        let err = req.validate().expect_err("test: must fail");
        assert_eq!(err.messages.len(), 3, "got {:?}", err.messages);
        assert!(err.messages.iter().any(|m| m.contains("Email")));
    }

    #[test]
    fn test_empty_package_list_passes_validation() {
        let mut req = ground_request();
        req.packages.clear();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_estimate_flags_default_to_false() {
        let req = ground_request();
        assert!(!req.wants_cost());
        assert!(!req.wants_transit_days());
    }

    #[test]
    fn test_flexible_datetime_accepts_all_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6)
            .expect("test: date")
            .and_time(NaiveTime::MIN);
        for raw in [
            "2024-05-06",
            "2024-05-06T00:00:00",
            "2024-05-06T00:00:00.000",
            "2024-05-06T00:00:00Z",
        ] {
            assert_eq!(flexible_datetime::parse(raw), Some(expected), "{raw}");
        }
        assert_eq!(flexible_datetime::parse("not a date"), None);
    }

    #[test]
    fn test_invalid_ship_date_is_a_deserialization_error() {
        let mut json = serde_json::to_value(ground_request()).expect("test: ser");
        json["shipDate"] = serde_json::json!("yesterday");
        assert!(serde_json::from_value::<ShipmentRequest>(json).is_err());
    }
}
