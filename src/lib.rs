// Price Ledger - Core Library
// Archive ingest/export pipeline shared by the CLI, the API server, and tests

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod parser;
pub mod record;
pub mod schema;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use archive::{build_archive, ArchiveExtractor, ArchiveLayout};
pub use config::Config;
pub use db::{setup_database, PriceStore, SqliteStore};
pub use error::{PipelineError, PipelineResult};
pub use export::{encode_records, export_archive, payload_digest, ExportArtifact, RecordSerializer};
pub use ingest::{decode_records, ingest_archive};
pub use parser::RecordParser;
pub use record::{BatchCommit, PriceStats, RawRow, Record, HEADER};
pub use schema::RecordValidator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
