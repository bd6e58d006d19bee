//! Wire support for clinical attention records.
//!
//! Each episode is stored as a single YAML document, `ATTENTION.yaml`, inside its own
//! version-controlled directory. The wire model is flat and uses the nullable booleans of the
//! REST contract (`medic_approved`, `supervisor_approved`, `pertinencia`, `is_closed`), while the
//! domain model in `ulr-workflow` uses one enum per review axis.
//!
//! This crate focuses on:
//! - serialisation/deserialisation with strict schema checks
//! - translation between the wire model and [`ClinicalAttention`], rejecting combinations of
//!   fields the domain cannot represent

pub mod attention;

pub use attention::AttentionRecord;

pub use ulr_workflow::ClinicalAttention;

/// Errors returned by the `records` crate.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("inconsistent record: {0}")]
    Inconsistent(String),
}

/// Type alias for Results that can fail with a [`RecordsError`].
pub type RecordsResult<T> = Result<T, RecordsError>;
