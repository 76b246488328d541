//! Fixture ingestion for a youth football club: turns messy pasted FA
//! text, key:value emails and spreadsheet exports into reconciled
//! fixture records with their follow-up tasks.

pub mod config;
pub mod dates;
pub mod dedupe;
pub mod import_to_postgres;
pub mod ingest;
pub mod line_parser;
pub mod normalize;
pub mod parse_csv;
pub mod pitch_matcher;
pub mod reconcile;
pub mod store;
pub mod team_resolver;
pub mod types;

pub use ingest::Ingestor;
pub use store::{FixtureStore, MemoryStore};
pub use types::ImportSummary;
