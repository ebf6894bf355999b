//! Text and JSON rendering for command output.

use std::fmt::Write as _;

use herbtrace_core::{
    ChainView, Record, RecordBody, RecordRef, SensorReadings, Submitted, TokenCodec,
};
use serde_json::json;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn submitted_text(submitted: &Submitted) -> String {
    let record = &submitted.record;
    let mut out = format!("Recorded {} {}\n", record.kind(), record.id);
    if let Some(upstream) = record.upstream() {
        let _ = writeln!(out, "  collection: {upstream}");
    }
    let _ = writeln!(out, "  {}", describe(record));
    let _ = writeln!(out, "  token: {}", submitted.token);
    out
}

pub fn submitted_json(submitted: &Submitted) -> serde_json::Value {
    json!({
        "record": submitted.record,
        "token": submitted.token,
    })
}

pub fn chain_json(view: &ChainView, codec: &TokenCodec) -> serde_json::Value {
    json!({
        "stage": view.stage(),
        "root_token": codec.encode_ref(view.collection.reference()),
        "tokens": view.tokens(codec),
        "total_transported_kg": view.total_transported_kg(),
        "chain": view,
    })
}

pub fn chain_text(view: &ChainView, codec: &TokenCodec) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Chain {} (stage: {})",
        codec.encode_ref(view.collection.reference()),
        view.stage()
    );
    if view.entry.kind != view.collection.kind() {
        let _ = writeln!(out, "  resolved from {}", view.entry);
    }

    let _ = writeln!(out, "\nCollection");
    line(&mut out, &view.collection);

    if view.transports.is_empty() {
        let _ = writeln!(out, "\nTransport: none recorded");
    } else {
        let _ = writeln!(
            out,
            "\nTransport ({} legs, {} kg moved)",
            view.transports.len(),
            view.total_transported_kg()
        );
        for leg in &view.transports {
            line(&mut out, leg);
        }
    }

    let _ = writeln!(out, "\nProcessing");
    match &view.processing {
        Some(record) => line(&mut out, record),
        None => {
            let _ = writeln!(out, "  not yet recorded");
        }
    }

    let _ = writeln!(out, "\nLab test");
    match &view.lab_test {
        Some(record) => line(&mut out, record),
        None => {
            let _ = writeln!(out, "  not yet recorded");
        }
    }

    if view.has_surplus() {
        let _ = writeln!(out, "\nAdditional records (not part of the main chain)");
        for record in view
            .surplus_processing
            .iter()
            .chain(view.surplus_lab_tests.iter())
        {
            line(&mut out, record);
        }
    }
    out
}

pub fn reference_text(reference: RecordRef, codec: &TokenCodec) -> String {
    format!(
        "kind:  {}\nid:    {}\ntoken: {}\n",
        reference.kind,
        reference.id,
        codec.encode_ref(reference)
    )
}

fn line(out: &mut String, record: &Record) {
    let _ = writeln!(
        out,
        "  {}  {}  {}",
        record.created_at.format(TIME_FORMAT),
        record.id,
        describe(record)
    );
    match &record.body {
        RecordBody::Collection(c) if !c.sensors.is_empty() => {
            let _ = writeln!(out, "      sensors: {}", sensors(&c.sensors));
        }
        RecordBody::LabTest(l) => {
            for link in &l.certificate_links {
                let _ = writeln!(out, "      certificate: {link}");
            }
        }
        _ => {}
    }
}

fn describe(record: &Record) -> String {
    match &record.body {
        RecordBody::Collection(c) => format!(
            "{}, {} kg, {} by {} at {}",
            c.species, c.quantity_kg, c.method, c.collector, c.location
        ),
        RecordBody::Transport(t) => format!(
            "{} kg to {} by {} at {}",
            t.quantity_kg, t.destination, t.carrier, t.location
        ),
        RecordBody::Processing(p) => format!(
            "{}: {} kg in, {} kg out by {} at {}",
            p.method, p.received_quantity_kg, p.processed_quantity_kg, p.operator, p.location
        ),
        RecordBody::LabTest(l) => format!(
            "{} on {} kg: {} by {} at {}",
            l.test_type, l.tested_quantity_kg, l.result, l.technician, l.location
        ),
    }
}

fn sensors(readings: &SensorReadings) -> String {
    let parts: Vec<String> = [
        readings.temperature_c.map(|v| format!("temperature {v} C")),
        readings.humidity_pct.map(|v| format!("humidity {v}%")),
        readings.soil_moisture_pct.map(|v| format!("soil moisture {v}%")),
        readings.ph.map(|v| format!("pH {v}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    parts.join(", ")
}
