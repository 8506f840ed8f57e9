//! ITBN features - session label log normalizer
//!
//! Turns per-session experiment label logs into a fixed-width feature table for
//! interval temporal Bayesian network structure learning, through a
//! deterministic pipeline: log parsing → policy resolution → line
//! normalization → session table → feature matrix → export.
//!
//! ## Modules
//!
//! - **Schema**: log line format and the static channel vocabulary
//! - **Corrections / Split**: static per-session tables and the training manifest
//! - **Normalizer**: the per-line rewrite rules and their session context
//! - **Features / Encoder**: matrix layout with absent sentinels, and its exports

pub mod config;
pub mod context;
pub mod corrections;
pub mod encoder;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod split;
pub mod types;

pub use config::{CanonicalLines, Config};
pub use corrections::CorrectionTables;
pub use error::ComputeError;
pub use features::{FeatureMatrix, ABSENT, PRESENT};
pub use pipeline::{normalize_session, FeatureProcessor, ProcessOutput, ProcessReport};
pub use split::{ManifestRules, SplitRegistry};
pub use types::{CanonicalEventTable, CorrectionPolicy, Event, Facet, FacetKind, SessionKey};

// Schema exports
pub use schema::{LogAdapter, RawChannel, RawEventRecord, LOG_FORMAT};

/// Crate version embedded in exported payloads
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported payloads
pub const PRODUCER_NAME: &str = "itbn-features";
