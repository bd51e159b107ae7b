//! Request-scoped address types shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An address split into Taiwanese administrative and street units.
///
/// Every field is optional. When present, `number` has the shape
/// `[附|臨]<digits>[之<digits>]號`, `lane`/`alley` end in `巷`/`弄` and
/// `section` ends in `段`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposedAddress {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub lane: Option<String>,
    #[serde(default)]
    pub alley: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub secondary_road: Option<String>,
    #[serde(default)]
    pub secondary_section: Option<String>,
}

impl DecomposedAddress {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_none()) && self.secondary_road.is_none()
    }

    /// True when a city or district was supplied.
    pub fn has_admin_unit(&self) -> bool {
        self.city.is_some() || self.district.is_some()
    }

    /// The seven primary fields in dispatch order.
    pub fn fields(&self) -> [&Option<String>; 7] {
        [
            &self.city,
            &self.district,
            &self.road,
            &self.section,
            &self.lane,
            &self.alley,
            &self.number,
        ]
    }

    /// Full literal address: every primary field concatenated.
    pub fn literal(&self) -> String {
        concat(&self.fields())
    }

    /// Address without administrative units: road through number.
    pub fn street(&self) -> String {
        concat(&[
            &self.road,
            &self.section,
            &self.lane,
            &self.alley,
            &self.number,
        ])
    }

    /// Road plus section, e.g. `中山北路二段`.
    pub fn road_with_section(&self) -> String {
        concat(&[&self.road, &self.section])
    }

    /// Everything up to (but excluding) the house number.
    pub fn without_number_literal(&self) -> String {
        concat(&[
            &self.city,
            &self.district,
            &self.road,
            &self.section,
            &self.lane,
            &self.alley,
        ])
    }

    pub fn without_city(&self) -> Self {
        Self {
            city: None,
            ..self.clone()
        }
    }

    pub fn without_district(&self) -> Self {
        Self {
            district: None,
            ..self.clone()
        }
    }

    pub fn with_number(&self, number: Option<String>) -> Self {
        Self {
            number,
            ..self.clone()
        }
    }

    /// Fill every missing field from `other`, leaving present fields untouched.
    pub fn fill_from(&mut self, other: &DecomposedAddress) {
        fill(&mut self.city, &other.city);
        fill(&mut self.district, &other.district);
        fill(&mut self.road, &other.road);
        fill(&mut self.section, &other.section);
        fill(&mut self.lane, &other.lane);
        fill(&mut self.alley, &other.alley);
        fill(&mut self.number, &other.number);
        fill(&mut self.secondary_road, &other.secondary_road);
        fill(&mut self.secondary_section, &other.secondary_section);
    }

    /// Dispatch field block: `city@district@road@section@lane@alley@number`.
    pub fn field_block(&self) -> String {
        self.fields()
            .iter()
            .map(|f| f.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("@")
    }

    /// Cross-road field block: `city@district@road@section`.
    pub fn cross_block(&self) -> String {
        [&self.city, &self.district, &self.road, &self.section]
            .iter()
            .map(|f| f.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("@")
    }
}

fn concat(parts: &[&Option<String>]) -> String {
    parts.iter().filter_map(|p| p.as_deref()).collect()
}

fn fill(slot: &mut Option<String>, source: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(source);
    }
}

/// Wrap a string as a field value, mapping empty/whitespace to `None`.
pub fn field(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// A record returned by the gazetteer/POI search store.
///
/// An empty `memo` marks a plain house-number record; a non-empty memo is the
/// landmark's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAddress {
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub memo: String,
    pub lng: f64,
    pub lat: f64,
}

impl CandidateAddress {
    pub fn is_landmark(&self) -> bool {
        !self.memo.trim().is_empty()
    }
}

/// The transcript of one call plus the request metadata dispatch needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUtterance {
    pub transcript: String,
    #[serde(default)]
    pub caller_phone: String,
    #[serde(default)]
    pub fleet_code: String,
    #[serde(default)]
    pub trunk_code: String,
    /// Union-pilot code carried over from the caller's previous trip.
    #[serde(default)]
    pub union_pilot: String,
    /// Passenger name carried over from the caller's previous trip.
    #[serde(default)]
    pub passenger_name: String,
    #[serde(default)]
    pub passenger_title: String,
    pub received_at: DateTime<Utc>,
}

impl RawUtterance {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            caller_phone: String::new(),
            fleet_code: String::new(),
            trunk_code: String::new(),
            union_pilot: String::new(),
            passenger_name: String::new(),
            passenger_title: String::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_caller(mut self, phone: impl Into<String>) -> Self {
        self.caller_phone = phone.into();
        self
    }

    pub fn with_fleet(mut self, fleet: impl Into<String>, trunk: impl Into<String>) -> Self {
        self.fleet_code = fleet.into();
        self.trunk_code = trunk.into();
        self
    }

    pub fn with_passenger(mut self, name: impl Into<String>, title: impl Into<String>) -> Self {
        self.passenger_name = name.into();
        self.passenger_title = title.into();
        self
    }

    pub fn with_union_pilot(mut self, code: impl Into<String>) -> Self {
        self.union_pilot = code.into();
        self
    }
}

/// How a pickup location was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    HouseNumber,
    Landmark,
    CrossRoad,
    JunctionApprox,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HouseNumber => "house_number",
            Self::Landmark => "landmark",
            Self::CrossRoad => "cross_road",
            Self::JunctionApprox => "junction_approx",
        }
    }
}

/// Terminal output of one resolution request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub kind: ResolutionKind,
    pub display_address: String,
    /// Second road's display text, cross-road results only.
    pub secondary_display_address: Option<String>,
    pub fields: DecomposedAddress,
    pub secondary_fields: Option<DecomposedAddress>,
    /// Landmark name, empty for other kinds.
    pub memo: String,
    /// Free-text remark for the driver (boarding exit, direction check).
    pub remark: String,
    pub lng: f64,
    pub lat: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taichung() -> DecomposedAddress {
        DecomposedAddress {
            city: field("台中市"),
            district: field("東區"),
            road: field("立德街"),
            number: field("29號"),
            ..Default::default()
        }
    }

    #[test]
    fn literal_concatenates_present_fields() {
        assert_eq!(taichung().literal(), "台中市東區立德街29號");
        assert_eq!(taichung().street(), "立德街29號");
        assert_eq!(taichung().without_number_literal(), "台中市東區立德街");
    }

    #[test]
    fn field_block_keeps_empty_slots() {
        assert_eq!(taichung().field_block(), "台中市@東區@立德街@@@@29號");
        assert_eq!(taichung().cross_block(), "台中市@東區@立德街@");
    }

    #[test]
    fn fill_from_only_fills_missing() {
        let mut partial = DecomposedAddress {
            road: field("中正路"),
            ..Default::default()
        };
        partial.fill_from(&taichung());
        assert_eq!(partial.road.as_deref(), Some("中正路"));
        assert_eq!(partial.city.as_deref(), Some("台中市"));
        assert_eq!(partial.number.as_deref(), Some("29號"));
    }

    #[test]
    fn field_rejects_blank() {
        assert_eq!(field("  "), None);
        assert_eq!(field(" 東區 ").as_deref(), Some("東區"));
    }

    #[test]
    fn empty_address() {
        assert!(DecomposedAddress::default().is_empty());
        assert!(!taichung().is_empty());
        assert!(taichung().has_admin_unit());
        assert!(!taichung().without_city().without_district().has_admin_unit());
    }

    #[test]
    fn candidate_json_defaults_memo() {
        let json = r#"{"address":"台中市東區立德街29號","lng":120.69,"lat":24.13}"#;
        let parsed: CandidateAddress = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_landmark());
        assert_eq!(parsed.city, "");
    }
}
