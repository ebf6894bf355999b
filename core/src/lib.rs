//! herbtrace: chain-of-custody records for harvested botanicals.
//!
//! A chain is rooted at one collection (a harvested lot) and grows through
//! transport legs, a processing step and a laboratory test. Every record is
//! written once and never changed. Each record gets a self-describing token
//! that travels with the physical lot (typically as a QR code), and any token
//! in the chain is enough to reconstruct the whole chain.
//!
//! - [`store`]: durable append-only storage (SQLite or in-memory)
//! - [`token`]: record token codec
//! - [`gateway`]: validated admission of new stage records
//! - [`resolver`]: chain reconstruction
//!
//! [`Herbtrace`] bundles all four behind one handle.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod errors;
pub mod gateway;
pub mod records;
pub mod resolver;
pub mod store;
pub mod token;

pub use config::{Backend, HerbtraceConfig};
pub use errors::{ChainError, ErrorCategory, Result, ValidationError};
pub use gateway::{
    CollectionPayload, LabTestPayload, ProcessingPayload, StageGateway, StagePayload, Submitted,
    TransportPayload,
};
pub use records::{
    Actor, Collection, GeoPoint, LabTest, Processing, Record, RecordBody, RecordId, RecordKind,
    RecordRef, SensorReadings, Transport,
};
pub use resolver::{ChainResolver, ChainStage, ChainView};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore, StoreError};
pub use token::{TokenCodec, TokenError};

use std::sync::Arc;

/// herbtrace version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main entry point: one store shared by a gateway and a resolver.
pub struct Herbtrace {
    store: Arc<dyn RecordStore>,
    codec: TokenCodec,
    gateway: StageGateway,
    resolver: ChainResolver,
}

impl Herbtrace {
    /// Open the store the configuration names.
    pub fn open(cfg: &HerbtraceConfig) -> Result<Self> {
        let store: Arc<dyn RecordStore> = match cfg.backend {
            Backend::Sqlite => {
                let path = cfg.resolved_db_path();
                Arc::new(SqliteRecordStore::open(&path, &cfg.store.sqlite_options())?)
            }
            Backend::Memory => Arc::new(MemoryRecordStore::new()),
        };

        tracing::info!(
            version = VERSION,
            backend = ?cfg.backend,
            db_path = %cfg.resolved_db_path().display(),
            "herbtrace engine initialized"
        );

        Ok(Self::with_store(store, cfg.token.codec()))
    }

    /// Engine over a fresh in-memory store with the default codec.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryRecordStore::new()), TokenCodec::default())
    }

    pub fn with_store(store: Arc<dyn RecordStore>, codec: TokenCodec) -> Self {
        let gateway = StageGateway::new(Arc::clone(&store), codec.clone());
        let resolver = ChainResolver::new(Arc::clone(&store), codec.clone());
        Self {
            store,
            codec,
            gateway,
            resolver,
        }
    }

    /// See [`StageGateway::submit`].
    pub fn submit(
        &self,
        actor: &Actor,
        payload: StagePayload,
        upstream_token: Option<&str>,
    ) -> Result<Submitted> {
        self.gateway.submit(actor, payload, upstream_token)
    }

    /// See [`ChainResolver::resolve`].
    pub fn resolve(&self, token: &str) -> Result<ChainView> {
        self.resolver.resolve(token)
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}
