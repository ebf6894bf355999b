//! Stage submission commands: `collect`, `transport`, `process`, `lab`.
//!
//! Flags map one-to-one onto gateway payload fields. Required fields are
//! optional at the flag level so the gateway reports them the same way it
//! would for any other surface.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use herbtrace_core::{
    Actor, CollectionPayload, GeoPoint, Herbtrace, LabTestPayload, ProcessingPayload,
    SensorReadings, StagePayload, TransportPayload,
};

use crate::{print_json, render};

/// Identity and timing shared by every submission.
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Authenticated actor performing this stage.
    #[arg(long = "actor", short = 'a', env = "HERBTRACE_ACTOR")]
    pub actor: String,

    /// When the stage happened (RFC 3339); defaults to now.
    #[arg(long = "recorded-at", value_name = "TIMESTAMP")]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    /// Latitude in decimal degrees.
    #[arg(long = "lat", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude in decimal degrees.
    #[arg(long = "lng", allow_negative_numbers = true)]
    pub lng: Option<f64>,
}

impl LocationArgs {
    fn point(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.lat?, self.lng?))
    }
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    #[command(flatten)]
    pub submit: SubmitArgs,

    /// Botanical species harvested.
    #[arg(long = "species", short = 's')]
    pub species: Option<String>,

    /// Harvested quantity in kilograms.
    #[arg(long = "quantity", short = 'q')]
    pub quantity: Option<f64>,

    /// Cultivation or harvesting method (e.g. organic, wild).
    #[arg(long = "method", short = 'm')]
    pub method: Option<String>,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Air temperature in degrees Celsius.
    #[arg(long = "temperature", allow_negative_numbers = true)]
    pub temperature: Option<f64>,

    /// Relative humidity, percent.
    #[arg(long = "humidity")]
    pub humidity: Option<f64>,

    /// Soil moisture, percent.
    #[arg(long = "soil-moisture")]
    pub soil_moisture: Option<f64>,

    /// Soil pH.
    #[arg(long = "ph")]
    pub ph: Option<f64>,
}

#[derive(Debug, Args)]
pub struct TransportArgs {
    #[command(flatten)]
    pub submit: SubmitArgs,

    /// Collection token this leg belongs to.
    #[arg(long = "from", short = 'f', value_name = "TOKEN")]
    pub from: Option<String>,

    /// Quantity moved in kilograms.
    #[arg(long = "quantity", short = 'q')]
    pub quantity: Option<f64>,

    #[arg(long = "destination", short = 'd')]
    pub destination: Option<String>,

    #[command(flatten)]
    pub location: LocationArgs,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub submit: SubmitArgs,

    /// Collection token being processed.
    #[arg(long = "from", short = 'f', value_name = "TOKEN")]
    pub from: Option<String>,

    /// Quantity received in kilograms.
    #[arg(long = "received")]
    pub received: Option<f64>,

    /// Quantity output in kilograms; cannot exceed `--received`.
    #[arg(long = "output")]
    pub output: Option<f64>,

    /// Processing method (e.g. drying, grinding).
    #[arg(long = "method", short = 'm')]
    pub method: Option<String>,

    #[command(flatten)]
    pub location: LocationArgs,
}

#[derive(Debug, Args)]
pub struct LabArgs {
    #[command(flatten)]
    pub submit: SubmitArgs,

    /// Collection token under test.
    #[arg(long = "from", short = 'f', value_name = "TOKEN")]
    pub from: Option<String>,

    /// Sample quantity in kilograms.
    #[arg(long = "quantity", short = 'q')]
    pub quantity: Option<f64>,

    #[arg(long = "test-type", short = 't')]
    pub test_type: Option<String>,

    #[arg(long = "result", short = 'r')]
    pub result: Option<String>,

    /// Evidence link; repeat for several.
    #[arg(long = "certificate", value_name = "URL")]
    pub certificates: Vec<String>,

    #[command(flatten)]
    pub location: LocationArgs,
}

/// A parsed command ready for the gateway.
#[derive(Debug)]
pub(crate) struct Submission {
    actor: Actor,
    payload: StagePayload,
    upstream: Option<String>,
}

impl CollectArgs {
    pub(crate) fn into_submission(self) -> Submission {
        let location = self.location.point();
        Submission {
            actor: Actor::new(self.submit.actor),
            payload: StagePayload::Collection(CollectionPayload {
                species: self.species,
                quantity_kg: self.quantity,
                method: self.method,
                location,
                sensors: SensorReadings {
                    temperature_c: self.temperature,
                    humidity_pct: self.humidity,
                    soil_moisture_pct: self.soil_moisture,
                    ph: self.ph,
                },
                recorded_at: self.submit.recorded_at,
            }),
            upstream: None,
        }
    }
}

impl TransportArgs {
    pub(crate) fn into_submission(self) -> Submission {
        let location = self.location.point();
        Submission {
            actor: Actor::new(self.submit.actor),
            payload: StagePayload::Transport(TransportPayload {
                quantity_kg: self.quantity,
                destination: self.destination,
                location,
                recorded_at: self.submit.recorded_at,
            }),
            upstream: self.from,
        }
    }
}

impl ProcessArgs {
    pub(crate) fn into_submission(self) -> Submission {
        let location = self.location.point();
        Submission {
            actor: Actor::new(self.submit.actor),
            payload: StagePayload::Processing(ProcessingPayload {
                received_quantity_kg: self.received,
                processed_quantity_kg: self.output,
                method: self.method,
                location,
                recorded_at: self.submit.recorded_at,
            }),
            upstream: self.from,
        }
    }
}

impl LabArgs {
    pub(crate) fn into_submission(self) -> Submission {
        let location = self.location.point();
        Submission {
            actor: Actor::new(self.submit.actor),
            payload: StagePayload::LabTest(LabTestPayload {
                tested_quantity_kg: self.quantity,
                test_type: self.test_type,
                result: self.result,
                certificate_links: self.certificates,
                location,
                recorded_at: self.submit.recorded_at,
            }),
            upstream: self.from,
        }
    }
}

pub(crate) fn submit(engine: &Herbtrace, submission: Submission, json: bool) -> anyhow::Result<()> {
    let kind = submission.payload.kind();
    let submitted = engine
        .submit(
            &submission.actor,
            submission.payload,
            submission.upstream.as_deref(),
        )
        .with_context(|| format!("submitting {kind} record"))?;

    if json {
        print_json(&render::submitted_json(&submitted))?;
    } else {
        print!("{}", render::submitted_text(&submitted));
    }
    Ok(())
}
