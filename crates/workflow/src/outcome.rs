//! Urgency-law derivation.
//!
//! The outcome combines the AI result with the human review chain in a fixed order: AI, then the
//! resident, then the supervisor. A resident rejection inverts the AI call and a supervisor
//! objection inverts whatever the resident concluded. Every surface that displays or acts on the
//! outcome goes through this module.

use crate::model::ClinicalAttention;
use serde::{Deserialize, Serialize};

/// Whether the urgency law applies to an episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLawOutcome {
    Applies,
    DoesNotApply,
    /// The AI result is missing or the resident has not decided yet.
    Unresolved,
}

impl UrgencyLawOutcome {
    pub fn as_nullable(self) -> Option<bool> {
        match self {
            Self::Applies => Some(true),
            Self::DoesNotApply => Some(false),
            Self::Unresolved => None,
        }
    }

    fn from_nullable(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Applies,
            Some(false) => Self::DoesNotApply,
            None => Self::Unresolved,
        }
    }
}

/// Derives the outcome from the three nullable wire fields.
///
/// `supervisor_approved == Some(true)` and `None` leave the resident's conclusion as is.
pub fn derive_from_nullable(
    ai_result: Option<bool>,
    medic_approved: Option<bool>,
    supervisor_approved: Option<bool>,
) -> Option<bool> {
    let ai = ai_result?;
    let approved = medic_approved?;

    let base = if approved { ai } else { !ai };
    if supervisor_approved == Some(false) {
        Some(!base)
    } else {
        Some(base)
    }
}

/// Derives the outcome of an episode.
pub fn derive_urgency_law_outcome(attention: &ClinicalAttention) -> UrgencyLawOutcome {
    UrgencyLawOutcome::from_nullable(derive_from_nullable(
        attention.ai_result,
        attention.medic_approved(),
        attention.supervisor_approved(),
    ))
}
