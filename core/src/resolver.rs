//! Chain Resolver: reconstructs a custody chain from any of its tokens.
//!
//! Resolution is read-only and holds no locks across store calls. A resolve
//! racing a submission sees whatever was committed when each read ran.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, Result};
use crate::records::{Record, RecordKind, RecordRef};
use crate::store::RecordStore;
use crate::token::TokenCodec;

/// Lifecycle position of a chain, derived from which stages are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStage {
    Initiated,
    InTransit,
    Processed,
    Tested,
}

impl ChainStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::InTransit => "in_transit",
            Self::Processed => "processed",
            Self::Tested => "tested",
        }
    }
}

impl fmt::Display for ChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembled view of one chain. Missing stages are `None`/empty, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainView {
    /// The record the caller's token named.
    pub entry: RecordRef,
    pub collection: Record,
    /// Transport legs, earliest first.
    pub transports: Vec<Record>,
    pub processing: Option<Record>,
    pub lab_test: Option<Record>,
    /// Processing records after the first, earliest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surplus_processing: Vec<Record>,
    /// Lab tests after the first, earliest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surplus_lab_tests: Vec<Record>,
}

impl ChainView {
    pub fn stage(&self) -> ChainStage {
        if self.lab_test.is_some() {
            ChainStage::Tested
        } else if self.processing.is_some() {
            ChainStage::Processed
        } else if !self.transports.is_empty() {
            ChainStage::InTransit
        } else {
            ChainStage::Initiated
        }
    }

    /// Every record in chain order: root, transports, processing, lab tests.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        std::iter::once(&self.collection)
            .chain(self.transports.iter())
            .chain(self.processing.iter())
            .chain(self.surplus_processing.iter())
            .chain(self.lab_test.iter())
            .chain(self.surplus_lab_tests.iter())
    }

    /// Tokens for every record, in the same order as [`ChainView::records`].
    pub fn tokens(&self, codec: &TokenCodec) -> Vec<String> {
        self.records()
            .map(|record| codec.encode_ref(record.reference()))
            .collect()
    }

    pub fn total_transported_kg(&self) -> f64 {
        self.transports
            .iter()
            .filter_map(Record::as_transport)
            .map(|t| t.quantity_kg)
            .sum()
    }

    pub fn has_surplus(&self) -> bool {
        !self.surplus_processing.is_empty() || !self.surplus_lab_tests.is_empty()
    }
}

pub struct ChainResolver {
    store: Arc<dyn RecordStore>,
    codec: TokenCodec,
}

impl ChainResolver {
    pub fn new(store: Arc<dyn RecordStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Decode `token` and resolve the chain it belongs to.
    pub fn resolve(&self, token: &str) -> Result<ChainView> {
        let entry = self.codec.decode(token)?;
        self.resolve_ref(entry)
    }

    pub fn resolve_ref(&self, entry: RecordRef) -> Result<ChainView> {
        let collection = match entry.kind {
            RecordKind::Collection => self.store.get(RecordKind::Collection, &entry.id)?,
            _ => {
                let record = self.store.get(entry.kind, &entry.id)?;
                let Some(root_id) = record.upstream() else {
                    return Err(ChainError::NotFound {
                        kind: RecordKind::Collection,
                        id: entry.id,
                    });
                };
                self.store.get(RecordKind::Collection, &root_id)?
            }
        };
        let root_id = collection.id;

        let transports = self
            .store
            .find_by_reference(RecordKind::Transport, &root_id)?;
        let (processing, surplus_processing) =
            split_current(self.store.find_by_reference(RecordKind::Processing, &root_id)?);
        let (lab_test, surplus_lab_tests) =
            split_current(self.store.find_by_reference(RecordKind::LabTest, &root_id)?);

        if !surplus_processing.is_empty() || !surplus_lab_tests.is_empty() {
            tracing::warn!(
                collection_id = %root_id,
                surplus_processing = surplus_processing.len(),
                surplus_lab_tests = surplus_lab_tests.len(),
                "Chain has more than one processing or lab test record"
            );
        }

        let view = ChainView {
            entry,
            collection,
            transports,
            processing,
            lab_test,
            surplus_processing,
            surplus_lab_tests,
        };

        tracing::debug!(
            entry = %entry,
            collection_id = %root_id,
            transports = view.transports.len(),
            stage = %view.stage(),
            "Chain resolved"
        );
        Ok(view)
    }
}

/// First record is current; the rest are surplus.
fn split_current(mut records: Vec<Record>) -> (Option<Record>, Vec<Record>) {
    if records.is_empty() {
        return (None, Vec::new());
    }
    let surplus = records.split_off(1);
    (records.pop(), surplus)
}
