//! Stage Gateway: write-time admission for custody records.
//!
//! A submission is validated in full before the store is touched. Field
//! checks and upstream-token decoding are pure; the only store read is the
//! existence check on the referenced collection, and the only write is the
//! final `put`. A rejected submission leaves the store unchanged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, Result, ValidationError};
use crate::records::{
    Actor, Collection, GeoPoint, LabTest, Processing, Record, RecordBody, RecordId, RecordKind,
    SensorReadings, Transport,
};
use crate::store::{RecordStore, StoreError};
use crate::token::TokenCodec;

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CollectionPayload {
    pub species: Option<String>,
    pub quantity_kg: Option<f64>,
    pub method: Option<String>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub sensors: SensorReadings,
    /// Creation time to record; the store stamps "now" when absent.
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransportPayload {
    pub quantity_kg: Option<f64>,
    pub destination: Option<String>,
    pub location: Option<GeoPoint>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingPayload {
    pub received_quantity_kg: Option<f64>,
    pub processed_quantity_kg: Option<f64>,
    pub method: Option<String>,
    pub location: Option<GeoPoint>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabTestPayload {
    pub tested_quantity_kg: Option<f64>,
    pub test_type: Option<String>,
    pub result: Option<String>,
    #[serde(default)]
    pub certificate_links: Vec<String>,
    pub location: Option<GeoPoint>,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Unvalidated submission for one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    Collection(CollectionPayload),
    Transport(TransportPayload),
    Processing(ProcessingPayload),
    LabTest(LabTestPayload),
}

impl StagePayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Collection(_) => RecordKind::Collection,
            Self::Transport(_) => RecordKind::Transport,
            Self::Processing(_) => RecordKind::Processing,
            Self::LabTest(_) => RecordKind::LabTest,
        }
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Collection(p) => p.recorded_at,
            Self::Transport(p) => p.recorded_at,
            Self::Processing(p) => p.recorded_at,
            Self::LabTest(p) => p.recorded_at,
        }
    }
}

/// An admitted record and the token minted for it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Submitted {
    pub record: Record,
    pub token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────────────────

pub struct StageGateway {
    store: Arc<dyn RecordStore>,
    codec: TokenCodec,
}

impl StageGateway {
    pub fn new(store: Arc<dyn RecordStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Validate and persist one stage record on behalf of `actor`.
    ///
    /// Downstream kinds must present the token of an existing collection.
    /// Collections must not present one.
    pub fn submit(
        &self,
        actor: &Actor,
        payload: StagePayload,
        upstream_token: Option<&str>,
    ) -> Result<Submitted> {
        let kind = payload.kind();
        let recorded_at = payload.recorded_at();

        let body = match self.admit(actor, payload, upstream_token) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(
                    %kind,
                    actor = %actor,
                    category = err.category().as_str(),
                    error = %err,
                    "Submission rejected"
                );
                return Err(err);
            }
        };

        let record = self.store.put(body, recorded_at).map_err(|err| {
            tracing::warn!(%kind, error = %err, "Record store write failed");
            ChainError::from(err)
        })?;
        let token = self.codec.encode_ref(record.reference());

        tracing::info!(
            %kind,
            id = %record.id,
            collection_id = ?record.upstream().map(|id| id.to_string()),
            actor = %actor,
            "Record admitted"
        );
        Ok(Submitted { record, token })
    }

    fn admit(
        &self,
        actor: &Actor,
        payload: StagePayload,
        upstream_token: Option<&str>,
    ) -> Result<RecordBody> {
        if actor.is_blank() {
            return Err(ValidationError::MissingField { field: "actor" }.into());
        }

        let upstream = self.decode_upstream(payload.kind(), upstream_token)?;
        let body = build_body(actor, payload, upstream)?;

        if let Some(collection_id) = upstream {
            self.ensure_collection(collection_id)?;
        }
        Ok(body)
    }

    fn decode_upstream(
        &self,
        kind: RecordKind,
        token: Option<&str>,
    ) -> std::result::Result<Option<RecordId>, ValidationError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());

        match (kind, token) {
            (RecordKind::Collection, None) => Ok(None),
            (RecordKind::Collection, Some(_)) => {
                Err(ValidationError::UnexpectedUpstreamToken { kind })
            }
            (_, None) => Err(ValidationError::UpstreamTokenRequired { kind }),
            (_, Some(token)) => {
                let reference = self
                    .codec
                    .decode(token)
                    .map_err(ValidationError::MalformedUpstreamToken)?;
                if reference.kind != RecordKind::Collection {
                    return Err(ValidationError::UpstreamNotCollection {
                        found: reference.kind,
                    });
                }
                Ok(Some(reference.id))
            }
        }
    }

    fn ensure_collection(&self, id: RecordId) -> Result<()> {
        match self.store.get(RecordKind::Collection, &id) {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. }) => Err(ChainError::Reference {
                kind: RecordKind::Collection,
                id,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field validation
// ─────────────────────────────────────────────────────────────────────────────

fn build_body(
    actor: &Actor,
    payload: StagePayload,
    upstream: Option<RecordId>,
) -> std::result::Result<RecordBody, ValidationError> {
    let kind = payload.kind();
    let linked = || upstream.ok_or(ValidationError::UpstreamTokenRequired { kind });

    let body = match payload {
        StagePayload::Collection(p) => RecordBody::Collection(Collection {
            collector: actor.clone(),
            species: required_text("species", p.species)?,
            quantity_kg: positive("quantity_kg", p.quantity_kg)?,
            method: required_text("method", p.method)?,
            location: location(p.location)?,
            sensors: sensors(p.sensors)?,
        }),
        StagePayload::Transport(p) => RecordBody::Transport(Transport {
            collection_id: linked()?,
            carrier: actor.clone(),
            quantity_kg: positive("quantity_kg", p.quantity_kg)?,
            destination: required_text("destination", p.destination)?,
            location: location(p.location)?,
        }),
        StagePayload::Processing(p) => {
            let received = positive("received_quantity_kg", p.received_quantity_kg)?;
            let processed = positive("processed_quantity_kg", p.processed_quantity_kg)?;
            if processed > received {
                return Err(ValidationError::OutOfRange {
                    field: "processed_quantity_kg",
                    reason: format!("output {processed} kg exceeds received {received} kg"),
                });
            }
            RecordBody::Processing(Processing {
                collection_id: linked()?,
                operator: actor.clone(),
                received_quantity_kg: received,
                processed_quantity_kg: processed,
                method: required_text("method", p.method)?,
                location: location(p.location)?,
            })
        }
        StagePayload::LabTest(p) => RecordBody::LabTest(LabTest {
            collection_id: linked()?,
            technician: actor.clone(),
            tested_quantity_kg: positive("tested_quantity_kg", p.tested_quantity_kg)?,
            test_type: required_text("test_type", p.test_type)?,
            result: required_text("result", p.result)?,
            certificate_links: p
                .certificate_links
                .into_iter()
                .map(|link| link.trim().to_string())
                .filter(|link| !link.is_empty())
                .collect(),
            location: location(p.location)?,
        }),
    };
    Ok(body)
}

fn required_text(
    field: &'static str,
    value: Option<String>,
) -> std::result::Result<String, ValidationError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField { field }),
    }
}

fn positive(field: &'static str, value: Option<f64>) -> std::result::Result<f64, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField { field })?;
    if !value.is_finite() {
        return Err(ValidationError::InvalidValue {
            field,
            reason: "must be a finite number".to_string(),
        });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositive { field, value });
    }
    Ok(value)
}

fn location(value: Option<GeoPoint>) -> std::result::Result<GeoPoint, ValidationError> {
    let point = value.ok_or(ValidationError::MissingField { field: "location" })?;
    if !point.is_valid() {
        return Err(ValidationError::OutOfRange {
            field: "location",
            reason: format!("({}, {}) is not a latitude/longitude pair", point.lat, point.lng),
        });
    }
    Ok(point)
}

fn sensors(readings: SensorReadings) -> std::result::Result<SensorReadings, ValidationError> {
    in_range("sensors.temperature_c", readings.temperature_c, -60.0, 70.0)?;
    in_range("sensors.humidity_pct", readings.humidity_pct, 0.0, 100.0)?;
    in_range("sensors.soil_moisture_pct", readings.soil_moisture_pct, 0.0, 100.0)?;
    in_range("sensors.ph", readings.ph, 0.0, 14.0)?;
    Ok(readings)
}

fn in_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> std::result::Result<(), ValidationError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ValidationError::OutOfRange {
            field,
            reason: format!("{v} is outside {min}..={max}"),
        }),
        _ => Ok(()),
    }
}
