//! Workflow transitions.
//!
//! [`apply`] is the single entry point for every mutation of the review fields. It is pure:
//! it takes the current episode by reference and returns the next one, so a rejected command
//! leaves the caller's state untouched.
//!
//! Checks run in a fixed order: role, then the closure gate, then the axis-specific rule.

use crate::actor::{Actor, Role};
use crate::model::{
    ClinicalAttention, ClosingReason, Closure, Observation, Pertinence, ResidentDecision,
    ResidentReview, SupervisorReview,
};
use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use ulr_types::NonEmptyText;

/// Minimum number of characters (after trimming) for a supervisor objection.
pub const MIN_OBSERVATION_CHARS: usize = 5;

const RESIDENT_APPROVED_REASON: &str = "Aprobado por médico residente";
const RESIDENT_REJECTED_REASON: &str = "Rechazado por médico residente";

/// Supervisor decision requested by a review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorVerdict {
    Ratify,
    Object,
    /// Return the supervisor axis to "no observation".
    Withdraw,
}

impl SupervisorVerdict {
    /// Maps the wire value of `supervisor_approved`.
    pub fn from_nullable(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Ratify,
            Some(false) => Self::Object,
            None => Self::Withdraw,
        }
    }
}

/// A workflow command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ResidentApproval {
        approved: bool,
        reason: Option<String>,
    },
    SupervisorReview {
        verdict: SupervisorVerdict,
        observation: Option<String>,
    },
    SetPertinence(Pertinence),
    /// `None` models a closure submitted without a selected reason.
    Close(Option<ClosingReason>),
}

impl Command {
    /// Human-readable action name used in errors and logs.
    pub const fn action(&self) -> &'static str {
        match self {
            Self::ResidentApproval { .. } => "submit resident approval",
            Self::SupervisorReview { .. } => "submit supervisor review",
            Self::SetPertinence(_) => "set pertinence",
            Self::Close(_) => "close episode",
        }
    }

    /// Roles allowed to issue this command.
    pub const fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Self::ResidentApproval { .. } => &[Role::Resident, Role::Admin],
            Self::SupervisorReview { .. } => &[Role::Supervisor, Role::Admin],
            Self::SetPertinence(_) => &[Role::Admin],
            Self::Close(_) => &[Role::Resident, Role::Supervisor, Role::Admin],
        }
    }

    /// Validation that needs no episode state.
    ///
    /// Clients run this before dispatching a request; [`apply`] runs it again.
    pub fn validate(&self) -> WorkflowResult<()> {
        match self {
            Self::SupervisorReview {
                verdict: SupervisorVerdict::Object,
                observation,
            } => Observation::new(observation.as_deref().unwrap_or_default()).map(|_| ()),
            Self::Close(None) => Err(WorkflowError::MissingClosingReason),
            _ => Ok(()),
        }
    }
}

/// Reason recorded when the resident does not supply one.
pub fn default_resident_reason(approved: bool) -> &'static str {
    if approved {
        RESIDENT_APPROVED_REASON
    } else {
        RESIDENT_REJECTED_REASON
    }
}

/// Applies `command` on behalf of `actor` at time `at`, returning the next episode state.
///
/// # Errors
///
/// - [`WorkflowError::RoleNotPermitted`] if the actor's role may not issue the command.
/// - [`WorkflowError::EpisodeClosed`] for any review command or re-closure once closed.
/// - [`WorkflowError::AlreadyDecided`] for a second resident decision.
/// - [`WorkflowError::InsufficientObservation`] for an objection without adequate text.
/// - [`WorkflowError::MissingClosingReason`] for a closure without a reason.
pub fn apply(
    attention: &ClinicalAttention,
    actor: &Actor,
    command: Command,
    at: DateTime<Utc>,
) -> WorkflowResult<ClinicalAttention> {
    actor.require_role(command.allowed_roles(), command.action())?;

    let mut next = attention.clone();

    match command {
        Command::ResidentApproval { approved, reason } => {
            ensure_open(attention)?;
            if !attention.resident.is_pending() {
                return Err(WorkflowError::AlreadyDecided);
            }

            let reason = reason
                .as_deref()
                .and_then(|r| NonEmptyText::new(r).ok())
                .map_or_else(
                    || NonEmptyText::new(default_resident_reason(approved)),
                    Ok,
                )
                .map_err(|e| WorkflowError::InvalidInput(format!("reason: {e}")))?;

            let decision = ResidentDecision {
                reason,
                decided_by: actor.id().clone(),
                decided_at: at,
            };
            next.resident = if approved {
                ResidentReview::Approved(decision)
            } else {
                ResidentReview::Rejected(decision)
            };
        }
        Command::SupervisorReview {
            verdict,
            observation,
        } => {
            ensure_open(attention)?;

            next.supervisor = match verdict {
                SupervisorVerdict::Ratify => SupervisorReview::Ratified {
                    observation: observation.as_deref().and_then(|o| NonEmptyText::new(o).ok()),
                    reviewed_by: actor.id().clone(),
                    reviewed_at: at,
                },
                SupervisorVerdict::Object => SupervisorReview::Objected {
                    observation: Observation::new(observation.as_deref().unwrap_or_default())?,
                    reviewed_by: actor.id().clone(),
                    reviewed_at: at,
                },
                SupervisorVerdict::Withdraw => SupervisorReview::NoObservation,
            };
        }
        Command::SetPertinence(value) => {
            next.pertinence = value;
        }
        Command::Close(reason) => {
            ensure_open(attention)?;
            let reason = reason.ok_or(WorkflowError::MissingClosingReason)?;
            next.closure = Some(Closure {
                reason,
                closed_by: actor.id().clone(),
                closed_at: at,
            });
        }
    }

    Ok(next)
}

fn ensure_open(attention: &ClinicalAttention) -> WorkflowResult<()> {
    if attention.is_closed() {
        Err(WorkflowError::EpisodeClosed)
    } else {
        Ok(())
    }
}
