//! One row of a historical dataset.
//!
//! Column order: id, rate group, carrier service, postal prefix, total cost,
//! rated weight, weight unit, ship day, commit delivery day, commit delivery
//! date, commit transit days, residential, signature required, adult
//! signature required.

/// Number of columns in a dataset row.
pub const COLUMNS: usize = 14;

/// A previously rated shipment.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRecord {
    /// Row identifier.
    pub id: String,
    /// Rate group.
    pub rate_group: String,
    /// Service the shipment was rated with.
    pub carrier_service_name: String,
    /// Three-digit postal prefix.
    pub postal_prefix: String,
    /// Rated total cost.
    pub total_cost: f64,
    /// Rated weight.
    pub rated_weight: f64,
    /// Rated weight unit.
    pub rated_weight_uom: String,
    /// Ship weekday.
    pub ship_day: String,
    /// Committed delivery weekday.
    pub commit_delivery_day: String,
    /// Committed delivery date.
    pub commit_delivery_date: String,
    /// Committed transit days.
    pub commit_transit_days: u32,
    /// Residential delivery.
    pub residential: bool,
    /// Signature required.
    pub signature_required: bool,
    /// Adult signature required.
    pub adult_signature_required: bool,
}

impl HistoricalRecord {
    /// Parse one CSV line.
    ///
    /// Returns `None` for header lines and for rows that do not have the
    /// expected column count or types.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields = split_csv(line);
        if fields.len() != COLUMNS {
            return None;
        }
        if fields[0].eq_ignore_ascii_case("id") {
            return None;
        }
        Some(Self {
            id: fields[0].clone(),
            rate_group: fields[1].clone(),
            carrier_service_name: fields[2].clone(),
            postal_prefix: normalize_prefix(&fields[3]),
            total_cost: fields[4].parse().ok()?,
            rated_weight: fields[5].parse().ok()?,
            rated_weight_uom: fields[6].clone(),
            ship_day: fields[7].clone(),
            commit_delivery_day: fields[8].clone(),
            commit_delivery_date: fields[9].clone(),
            commit_transit_days: parse_transit_days(&fields[10])?,
            residential: parse_bool(&fields[11])?,
            signature_required: parse_bool(&fields[12])?,
            adult_signature_required: parse_bool(&fields[13])?,
        })
    }
}

/// Left-pad numeric prefixes that lost their leading zeros (`"21"` → `"021"`).
pub fn normalize_prefix(raw: &str) -> String {
    if !raw.is_empty() && raw.len() < 3 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{raw:0>3}")
    } else {
        raw.to_string()
    }
}

fn parse_transit_days(raw: &str) -> Option<u32> {
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "y" | "yes" => Some(true),
        "false" | "0" | "n" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Split a CSV line, honouring double-quoted fields and `""` escapes.
fn split_csv(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}
