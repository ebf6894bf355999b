//! Custody record model.
//!
//! Four record kinds form a chain rooted at a [`Collection`]. Downstream
//! records hold a plain [`RecordId`] reference to that root; the reference is
//! checked once at admission and never rewritten.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Collection,
    Transport,
    Processing,
    LabTest,
}

impl RecordKind {
    /// Every kind, in chain order.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Collection,
        RecordKind::Transport,
        RecordKind::Processing,
        RecordKind::LabTest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Transport => "transport",
            Self::Processing => "processing",
            Self::LabTest => "lab_test",
        }
    }

    /// Tag that prefixes the identifier inside a token.
    pub fn token_tag(self) -> &'static str {
        match self {
            Self::Collection => "CollectionID",
            Self::Transport => "TransportID",
            Self::Processing => "ProcessingID",
            Self::LabTest => "LabTestID",
        }
    }

    pub fn from_token_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token_tag() == tag)
    }

    /// Parse a user-facing kind name (`collection`, `lab_test`, `lab`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collection" | "collect" => Some(Self::Collection),
            "transport" => Some(Self::Transport),
            "processing" | "process" => Some(Self::Processing),
            "lab_test" | "labtest" | "lab-test" | "lab" => Some(Self::LabTest),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-assigned record identity. Never reused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Mint a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// An already-authenticated identity, stored verbatim on the record it wrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Actor(String);

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

/// Environmental readings captured at harvest time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SensorReadings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_moisture_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
}

impl SensorReadings {
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none()
            && self.humidity_pct.is_none()
            && self.soil_moisture_pct.is_none()
            && self.ph.is_none()
    }
}

/// Chain root: a harvested lot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub collector: Actor,
    pub species: String,
    pub quantity_kg: f64,
    /// Cultivation or harvesting method (e.g. "organic", "wild").
    pub method: String,
    pub location: GeoPoint,
    #[serde(default, skip_serializing_if = "SensorReadings::is_empty")]
    pub sensors: SensorReadings,
}

/// One movement leg of a collection lot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transport {
    pub collection_id: RecordId,
    pub carrier: Actor,
    pub quantity_kg: f64,
    pub destination: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Processing {
    pub collection_id: RecordId,
    pub operator: Actor,
    pub received_quantity_kg: f64,
    pub processed_quantity_kg: f64,
    pub method: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabTest {
    pub collection_id: RecordId,
    pub technician: Actor,
    pub tested_quantity_kg: f64,
    pub test_type: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_links: Vec<String>,
    pub location: GeoPoint,
}

/// Tagged union over the four record kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    Collection(Collection),
    Transport(Transport),
    Processing(Processing),
    LabTest(LabTest),
}

impl RecordBody {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Collection(_) => RecordKind::Collection,
            Self::Transport(_) => RecordKind::Transport,
            Self::Processing(_) => RecordKind::Processing,
            Self::LabTest(_) => RecordKind::LabTest,
        }
    }

    /// The collection this record links back to; `None` for the root.
    pub fn upstream(&self) -> Option<RecordId> {
        match self {
            Self::Collection(_) => None,
            Self::Transport(t) => Some(t.collection_id),
            Self::Processing(p) => Some(p.collection_id),
            Self::LabTest(l) => Some(l.collection_id),
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            Self::Collection(c) => &c.collector,
            Self::Transport(t) => &t.carrier,
            Self::Processing(p) => &p.operator,
            Self::LabTest(l) => &l.technician,
        }
    }
}

/// A persisted, immutable record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub body: RecordBody,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        self.body.kind()
    }

    pub fn reference(&self) -> RecordRef {
        RecordRef {
            kind: self.kind(),
            id: self.id,
        }
    }

    pub fn upstream(&self) -> Option<RecordId> {
        self.body.upstream()
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match &self.body {
            RecordBody::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_transport(&self) -> Option<&Transport> {
        match &self.body {
            RecordBody::Transport(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_processing(&self) -> Option<&Processing> {
        match &self.body {
            RecordBody::Processing(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_lab_test(&self) -> Option<&LabTest> {
        match &self.body {
            RecordBody::LabTest(l) => Some(l),
            _ => None,
        }
    }
}

/// A (kind, id) pair naming one record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(kind: RecordKind, id: RecordId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_tags_map_back_to_kinds() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_token_tag(kind.token_tag()), Some(kind));
        }
        assert_eq!(RecordKind::from_token_tag("labtestid"), None);
    }

    #[test]
    fn parse_accepts_short_names() {
        assert_eq!(RecordKind::parse("lab"), Some(RecordKind::LabTest));
        assert_eq!(RecordKind::parse(" Transport "), Some(RecordKind::Transport));
        assert_eq!(RecordKind::parse("process"), Some(RecordKind::Processing));
        assert_eq!(RecordKind::parse("farm"), None);
    }

    #[test]
    fn geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(12.97, 77.59).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn body_serializes_with_kind_tag() {
        let body = RecordBody::Transport(Transport {
            collection_id: RecordId::new(),
            carrier: Actor::new("carrier-7"),
            quantity_kg: 12.5,
            destination: "Plant A".to_string(),
            location: GeoPoint::new(10.0, 20.0),
        });

        let value = match serde_json::to_value(&body) {
            Ok(v) => v,
            Err(err) => panic!("serialize failed: {err}"),
        };
        assert_eq!(value["kind"], "transport");
        assert_eq!(value["carrier"], "carrier-7");
        assert_eq!(body.kind(), RecordKind::Transport);
        assert!(body.upstream().is_some());
    }

    #[test]
    fn empty_sensor_readings_are_omitted() {
        let body = RecordBody::Collection(Collection {
            collector: Actor::new("farmer-1"),
            species: "Ashwagandha".to_string(),
            quantity_kg: 25.0,
            method: "organic".to_string(),
            location: GeoPoint::new(10.0, 20.0),
            sensors: SensorReadings::default(),
        });

        let value = match serde_json::to_value(&body) {
            Ok(v) => v,
            Err(err) => panic!("serialize failed: {err}"),
        };
        assert!(value.get("sensors").is_none());
        assert_eq!(body.upstream(), None);
    }
}
