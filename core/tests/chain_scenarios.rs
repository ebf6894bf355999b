//! End-to-end chain scenarios against both record store backends.

use std::sync::Arc;
use std::thread;

use herbtrace_core::store::SqliteOptions;
use herbtrace_core::{
    Actor, Backend, ChainError, ChainStage, CollectionPayload, ErrorCategory, GeoPoint, Herbtrace,
    HerbtraceConfig, LabTestPayload, MemoryRecordStore, ProcessingPayload, RecordId, RecordKind,
    SqliteRecordStore, StagePayload, Submitted, TokenCodec, TransportPayload, ValidationError,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Fixture {
    name: &'static str,
    engine: Herbtrace,
    _dir: Option<TempDir>,
}

fn fixtures() -> Vec<Fixture> {
    let dir = TempDir::new().unwrap();
    let sqlite =
        SqliteRecordStore::open(&dir.path().join("records.db"), &SqliteOptions::default())
            .unwrap();

    vec![
        Fixture {
            name: "memory",
            engine: Herbtrace::with_store(Arc::new(MemoryRecordStore::new()), TokenCodec::default()),
            _dir: None,
        },
        Fixture {
            name: "sqlite",
            engine: Herbtrace::with_store(Arc::new(sqlite), TokenCodec::default()),
            _dir: Some(dir),
        },
    ]
}

fn collect(engine: &Herbtrace, species: &str, quantity: f64) -> Submitted {
    engine
        .submit(
            &Actor::new("farmer-1"),
            StagePayload::Collection(CollectionPayload {
                species: Some(species.to_string()),
                quantity_kg: Some(quantity),
                method: Some("organic".to_string()),
                location: Some(GeoPoint::new(26.91, 75.79)),
                ..Default::default()
            }),
            None,
        )
        .unwrap()
}

fn transport(quantity: f64, destination: &str) -> StagePayload {
    StagePayload::Transport(TransportPayload {
        quantity_kg: Some(quantity),
        destination: Some(destination.to_string()),
        location: Some(GeoPoint::new(26.92, 75.80)),
        recorded_at: None,
    })
}

fn processing(received: f64, output: f64) -> StagePayload {
    StagePayload::Processing(ProcessingPayload {
        received_quantity_kg: Some(received),
        processed_quantity_kg: Some(output),
        method: Some("drying".to_string()),
        location: Some(GeoPoint::new(26.95, 75.81)),
        recorded_at: None,
    })
}

fn lab_test(result: &str) -> StagePayload {
    StagePayload::LabTest(LabTestPayload {
        tested_quantity_kg: Some(0.5),
        test_type: Some("heavy metals".to_string()),
        result: Some(result.to_string()),
        certificate_links: vec!["https://lab.example/cert/42".to_string()],
        location: Some(GeoPoint::new(26.99, 75.85)),
        recorded_at: None,
    })
}

#[test]
fn ashwagandha_chain_resolves_from_lab_token() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Ashwagandha", 25.0);
        let leg = engine
            .submit(&Actor::new("carrier-1"), transport(25.0, "Plant A"), Some(&root.token))
            .unwrap();
        let processed = engine
            .submit(&Actor::new("operator-1"), processing(25.0, 20.0), Some(&root.token))
            .unwrap();
        let lab = engine
            .submit(&Actor::new("tech-1"), lab_test("Pass"), Some(&root.token))
            .unwrap();

        let view = engine.resolve(&lab.token).unwrap();
        assert_eq!(view.collection, root.record, "{name}");
        assert_eq!(view.transports, vec![leg.record], "{name}");
        assert_eq!(view.processing, Some(processed.record), "{name}");
        assert_eq!(view.lab_test, Some(lab.record.clone()), "{name}");
        assert_eq!(view.stage(), ChainStage::Tested, "{name}");

        let collection = view.collection.as_collection().unwrap();
        assert_eq!(collection.species, "Ashwagandha");
        assert_eq!(collection.quantity_kg, 25.0);
        let lab_body = view.lab_test.as_ref().and_then(|r| r.as_lab_test()).unwrap();
        assert_eq!(lab_body.result, "Pass");
    }
}

#[test]
fn any_token_in_the_chain_resolves_the_same_chain() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Brahmi", 10.0);
        let leg = engine
            .submit(&Actor::new("carrier-1"), transport(10.0, "Depot"), Some(&root.token))
            .unwrap();
        let processed = engine
            .submit(&Actor::new("operator-1"), processing(10.0, 8.0), Some(&root.token))
            .unwrap();

        let from_root = engine.resolve(&root.token).unwrap();
        let from_leg = engine.resolve(&leg.token).unwrap();
        let from_processing = engine.resolve(&processed.token).unwrap();

        assert_eq!(from_leg.collection, from_root.collection, "{name}");
        assert_eq!(from_processing.transports, from_root.transports, "{name}");
        assert_eq!(from_leg.entry, leg.record.reference(), "{name}");
        assert_eq!(from_root.stage(), ChainStage::Processed, "{name}");
    }
}

#[test]
fn fresh_collection_has_no_downstream_records() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Tulsi", 4.0);
        let view = engine.resolve(&root.token).unwrap();

        assert!(view.transports.is_empty(), "{name}");
        assert_eq!(view.processing, None, "{name}");
        assert_eq!(view.lab_test, None, "{name}");
        assert_eq!(view.stage(), ChainStage::Initiated, "{name}");
    }
}

#[test]
fn transports_resolve_in_submission_order() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Shatavari", 30.0);
        let other = collect(&engine, "Neem", 30.0);

        let mut expected = Vec::new();
        for destination in ["T1", "T2", "T3"] {
            let leg = engine
                .submit(&Actor::new("carrier-1"), transport(10.0, destination), Some(&root.token))
                .unwrap();
            engine
                .submit(&Actor::new("carrier-2"), transport(1.0, "Elsewhere"), Some(&other.token))
                .unwrap();
            expected.push(leg.record);
        }

        let view = engine.resolve(&root.token).unwrap();
        assert_eq!(view.transports, expected, "{name}");
        assert_eq!(view.total_transported_kg(), 30.0, "{name}");
    }
}

#[test]
fn dangling_reference_is_rejected_and_nothing_is_written() {
    for Fixture { name, engine, .. } in fixtures() {
        let missing = engine.codec().encode(RecordKind::Collection, &RecordId::new());

        for payload in [transport(5.0, "Plant A"), processing(5.0, 4.0), lab_test("Pass")] {
            let kind = payload.kind();
            let err = engine
                .submit(&Actor::new("someone"), payload, Some(&missing))
                .unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Reference, "{name} {kind}");
            assert_eq!(engine.store().count(kind).unwrap(), 0, "{name} {kind}");
        }
    }
}

#[test]
fn malformed_upstream_token_is_validation_not_reference() {
    for Fixture { name, engine, .. } in fixtures() {
        for token in ["", "CollectionID", "CollectionID:xyz", "BatchID:1234"] {
            let err = engine
                .submit(&Actor::new("carrier-1"), transport(5.0, "Plant A"), Some(token))
                .unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Validation, "{name} {token:?}");
        }
        assert_eq!(engine.store().count(RecordKind::Transport).unwrap(), 0, "{name}");
    }
}

#[test]
fn invalid_collection_writes_nothing() {
    for Fixture { name, engine, .. } in fixtures() {
        let cases = [
            CollectionPayload {
                species: Some("Tulsi".to_string()),
                quantity_kg: Some(0.0),
                method: Some("organic".to_string()),
                location: Some(GeoPoint::new(1.0, 1.0)),
                ..Default::default()
            },
            CollectionPayload {
                species: Some("Tulsi".to_string()),
                quantity_kg: Some(-2.0),
                method: Some("organic".to_string()),
                location: Some(GeoPoint::new(1.0, 1.0)),
                ..Default::default()
            },
            CollectionPayload {
                quantity_kg: Some(5.0),
                method: Some("organic".to_string()),
                location: Some(GeoPoint::new(1.0, 1.0)),
                ..Default::default()
            },
            CollectionPayload {
                species: Some("Tulsi".to_string()),
                quantity_kg: Some(5.0),
                location: Some(GeoPoint::new(1.0, 1.0)),
                ..Default::default()
            },
            CollectionPayload {
                species: Some("Tulsi".to_string()),
                quantity_kg: Some(5.0),
                method: Some("organic".to_string()),
                ..Default::default()
            },
        ];

        for payload in cases {
            let err = engine
                .submit(&Actor::new("farmer-1"), StagePayload::Collection(payload), None)
                .unwrap_err();
            assert!(matches!(err, ChainError::Validation(_)), "{name}: {err:?}");
        }
        assert_eq!(engine.store().count(RecordKind::Collection).unwrap(), 0, "{name}");
    }
}

#[test]
fn upstream_token_must_name_a_collection() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Giloy", 5.0);
        let leg = engine
            .submit(&Actor::new("carrier-1"), transport(5.0, "Plant A"), Some(&root.token))
            .unwrap();

        let err = engine
            .submit(&Actor::new("tech-1"), lab_test("Pass"), Some(&leg.token))
            .unwrap_err();
        assert!(
            matches!(
                err,
                ChainError::Validation(ValidationError::UpstreamNotCollection {
                    found: RecordKind::Transport
                })
            ),
            "{name}: {err:?}"
        );
    }
}

#[test]
fn unknown_and_malformed_tokens_on_resolve() {
    for Fixture { name, engine, .. } in fixtures() {
        let unknown = engine.codec().encode(RecordKind::LabTest, &RecordId::new());
        let err = engine.resolve(&unknown).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound, "{name}");

        for garbage in ["", "nonsense", "LabTestID:", "LabTestID:123"] {
            let err = engine.resolve(garbage).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::Malformed, "{name} {garbage:?}");
        }
    }
}

#[test]
fn second_processing_is_kept_as_surplus() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Amla", 40.0);
        let first = engine
            .submit(&Actor::new("operator-1"), processing(40.0, 35.0), Some(&root.token))
            .unwrap();
        let second = engine
            .submit(&Actor::new("operator-2"), processing(40.0, 30.0), Some(&root.token))
            .unwrap();

        let view = engine.resolve(&second.token).unwrap();
        assert_eq!(view.processing, Some(first.record), "{name}");
        assert_eq!(view.surplus_processing, vec![second.record], "{name}");
        assert!(view.has_surplus(), "{name}");
    }
}

#[test]
fn concurrent_transports_against_one_collection() {
    for Fixture { name, engine, .. } in fixtures() {
        let root = collect(&engine, "Moringa", 80.0);

        let submitted: Vec<Submitted> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let engine = &engine;
                    let token = root.token.as_str();
                    scope.spawn(move || {
                        engine
                            .submit(
                                &Actor::new(format!("carrier-{i}")),
                                transport(10.0, &format!("Depot {i}")),
                                Some(token),
                            )
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let view = engine.resolve(&root.token).unwrap();
        assert_eq!(view.transports.len(), 8, "{name}");
        for leg in submitted {
            assert!(view.transports.contains(&leg.record), "{name}");
        }
        assert_eq!(view.total_transported_kg(), 80.0, "{name}");
    }
}

#[test]
fn chain_survives_reopening_from_config() {
    let dir = TempDir::new().unwrap();
    let config = HerbtraceConfig {
        db_path: dir.path().join("chain.db").to_string_lossy().into_owned(),
        backend: Backend::Sqlite,
        ..Default::default()
    };

    let (root, leg) = {
        let engine = Herbtrace::open(&config).unwrap();
        let root = collect(&engine, "Ashwagandha", 25.0);
        let leg = engine
            .submit(&Actor::new("carrier-1"), transport(25.0, "Plant A"), Some(&root.token))
            .unwrap();
        (root, leg)
    };

    let reopened = Herbtrace::open(&config).unwrap();
    let view = reopened.resolve(&leg.token).unwrap();
    assert_eq!(view.collection, root.record);
    assert_eq!(view.transports, vec![leg.record]);
}
