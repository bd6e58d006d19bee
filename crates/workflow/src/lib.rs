//! # ULR Workflow
//!
//! The clinical-attention approval workflow as a pure, backend-agnostic model.
//!
//! This crate contains no I/O. It defines:
//! - the episode model ([`ClinicalAttention`]) with one explicit status enum per review axis,
//! - the authenticated actor context ([`Actor`], [`Role`]) injected into every operation,
//! - the transition function [`apply`] for the four workflow commands,
//! - the urgency-law derivation ([`derive_urgency_law_outcome`]) shared by every surface that
//!   displays or acts on the outcome,
//! - aggregate counts ([`AttentionSummary`]) for performance dashboards.
//!
//! Storage, HTTP and CLI concerns live in `ulr-core`, `api-rest` and `ulr-cli`.

pub mod actor;
pub mod model;
pub mod outcome;
pub mod summary;
pub mod transition;

pub use actor::{Actor, ActorId, Role};
pub use model::{
    ClinicalAttention, ClosingReason, Closure, NewAttention, Observation, PatientRef, Pertinence,
    ResidentDecision, ResidentReview, SupervisorReview,
};
pub use outcome::{derive_from_nullable, derive_urgency_law_outcome, UrgencyLawOutcome};
pub use summary::AttentionSummary;
pub use transition::{
    apply, default_resident_reason, Command, SupervisorVerdict, MIN_OBSERVATION_CHARS,
};

/// Errors produced by workflow validation and transitions.
///
/// Every variant is a rejection: a failed transition never yields a partially updated episode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// No authenticated user could be resolved for the action.
    #[error("no authenticated actor could be identified")]
    ActorNotIdentified,

    /// The actor's role may not perform the requested action.
    #[error("role '{role}' is not permitted to {action}")]
    RoleNotPermitted { role: Role, action: &'static str },

    /// The resident axis has already left `Pending`.
    #[error("resident review has already been decided")]
    AlreadyDecided,

    /// A supervisor objection was submitted without adequate observation text.
    #[error("supervisor objection requires an observation of at least {min} characters")]
    InsufficientObservation { min: usize },

    /// The episode is closed and its review fields are read-only.
    #[error("clinical attention is closed")]
    EpisodeClosed,

    /// A closure was requested without selecting a reason.
    #[error("a closing reason is required")]
    MissingClosingReason,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Type alias for Results that can fail with a [`WorkflowError`].
pub type WorkflowResult<T> = Result<T, WorkflowError>;
