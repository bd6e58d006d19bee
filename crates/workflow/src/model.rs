//! Episode model.
//!
//! Each review axis is an explicit enum instead of a nullable boolean, so states such as "an
//! objection without an observation" or "a resident decision without a reason" cannot be
//! constructed. The nullable projections used on the wire (`medic_approved`,
//! `supervisor_approved`, `pertinencia`) are derived from these enums.

use crate::actor::ActorId;
use crate::transition::MIN_OBSERVATION_CHARS;
use crate::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulr_types::NonEmptyText;
use uuid::Uuid;

/// Patient reference carried by an episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientRef {
    pub name: NonEmptyText,
    /// National or hospital identifier.
    pub identifier: NonEmptyText,
}

/// Raw creation input for a new episode, validated by [`ClinicalAttention::open`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewAttention {
    pub patient_name: String,
    pub patient_identifier: String,
    pub doctor_name: String,
    pub diagnostic: Option<String>,
    /// Upstream automated determination; set once at creation and never mutated.
    pub ai_result: Option<bool>,
}

/// A resident's recorded decision on the AI result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResidentDecision {
    pub reason: NonEmptyText,
    pub decided_by: ActorId,
    pub decided_at: DateTime<Utc>,
}

/// Resident axis: `Pending → Approved | Rejected`, terminal once decided.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ResidentReview {
    #[default]
    Pending,
    Approved(ResidentDecision),
    Rejected(ResidentDecision),
}

impl ResidentReview {
    /// `medic_approved` as carried on the wire.
    pub fn as_nullable(&self) -> Option<bool> {
        match self {
            Self::Pending => None,
            Self::Approved(_) => Some(true),
            Self::Rejected(_) => Some(false),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn decision(&self) -> Option<&ResidentDecision> {
        match self {
            Self::Pending => None,
            Self::Approved(d) | Self::Rejected(d) => Some(d),
        }
    }
}

/// Observation text attached to a supervisor objection.
///
/// Holds at least [`MIN_OBSERVATION_CHARS`] characters after trimming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation(NonEmptyText);

impl Observation {
    pub fn new(input: impl AsRef<str>) -> WorkflowResult<Self> {
        let insufficient = WorkflowError::InsufficientObservation {
            min: MIN_OBSERVATION_CHARS,
        };
        let text = NonEmptyText::new(input).map_err(|_| insufficient.clone())?;
        if text.char_count() < MIN_OBSERVATION_CHARS {
            return Err(insufficient);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Supervisor axis: `NoObservation ⇄ Ratified ⇄ Objected`, re-settable until closure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SupervisorReview {
    /// No action taken (tacit approval).
    #[default]
    NoObservation,
    Ratified {
        observation: Option<NonEmptyText>,
        reviewed_by: ActorId,
        reviewed_at: DateTime<Utc>,
    },
    Objected {
        observation: Observation,
        reviewed_by: ActorId,
        reviewed_at: DateTime<Utc>,
    },
}

impl SupervisorReview {
    /// `supervisor_approved` as carried on the wire.
    pub fn as_nullable(&self) -> Option<bool> {
        match self {
            Self::NoObservation => None,
            Self::Ratified { .. } => Some(true),
            Self::Objected { .. } => Some(false),
        }
    }

    pub fn is_objected(&self) -> bool {
        matches!(self, Self::Objected { .. })
    }

    pub fn observation(&self) -> Option<&str> {
        match self {
            Self::NoObservation => None,
            Self::Ratified { observation, .. } => observation.as_ref().map(NonEmptyText::as_str),
            Self::Objected { observation, .. } => Some(observation.as_str()),
        }
    }

    pub fn reviewed_by(&self) -> Option<&ActorId> {
        match self {
            Self::NoObservation => None,
            Self::Ratified { reviewed_by, .. } | Self::Objected { reviewed_by, .. } => {
                Some(reviewed_by)
            }
        }
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::NoObservation => None,
            Self::Ratified { reviewed_at, .. } | Self::Objected { reviewed_at, .. } => {
                Some(*reviewed_at)
            }
        }
    }
}

/// Admin-controlled clinical pertinence tag, independent of the review chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Pertinence {
    #[default]
    Pending,
    Pertinent,
    NotPertinent,
}

impl Pertinence {
    pub fn from_nullable(value: Option<bool>) -> Self {
        match value {
            None => Self::Pending,
            Some(true) => Self::Pertinent,
            Some(false) => Self::NotPertinent,
        }
    }

    pub fn as_nullable(self) -> Option<bool> {
        match self {
            Self::Pending => None,
            Self::Pertinent => Some(true),
            Self::NotPertinent => Some(false),
        }
    }

    /// Label shown in list views.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Pertinent => "Pertinente",
            Self::NotPertinent => "No Pertinente",
        }
    }
}

/// Why an episode was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClosingReason {
    Muerte,
    #[serde(rename = "Hospitalización", alias = "Hospitalizacion")]
    Hospitalizacion,
    Alta,
    Traslado,
}

impl ClosingReason {
    pub const ALL: [ClosingReason; 4] = [
        Self::Muerte,
        Self::Hospitalizacion,
        Self::Alta,
        Self::Traslado,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Muerte => "Muerte",
            Self::Hospitalizacion => "Hospitalización",
            Self::Alta => "Alta",
            Self::Traslado => "Traslado",
        }
    }
}

impl fmt::Display for ClosingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClosingReason {
    type Err = WorkflowError;

    /// Case-insensitive; the accent in "Hospitalización" is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(WorkflowError::MissingClosingReason);
        }
        match trimmed.to_lowercase().as_str() {
            "muerte" => Ok(Self::Muerte),
            "hospitalización" | "hospitalizacion" => Ok(Self::Hospitalizacion),
            "alta" => Ok(Self::Alta),
            "traslado" => Ok(Self::Traslado),
            _ => Err(WorkflowError::InvalidInput(format!(
                "unknown closing reason: '{trimmed}'"
            ))),
        }
    }
}

/// Terminal closure record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Closure {
    pub reason: ClosingReason,
    pub closed_by: ActorId,
    pub closed_at: DateTime<Utc>,
}

/// One clinical attention (episode) and its workflow state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicalAttention {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: ActorId,
    pub patient: PatientRef,
    pub doctor_name: NonEmptyText,
    pub diagnostic: Option<NonEmptyText>,
    pub ai_result: Option<bool>,
    pub resident: ResidentReview,
    pub supervisor: SupervisorReview,
    pub pertinence: Pertinence,
    pub closure: Option<Closure>,
}

impl ClinicalAttention {
    /// Builds a new, open episode with every review axis at its initial state.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] if the patient name, patient identifier or doctor
    /// name is blank.
    pub fn open(
        id: Uuid,
        draft: NewAttention,
        created_by: ActorId,
        created_at: DateTime<Utc>,
    ) -> WorkflowResult<Self> {
        let required = |field: &str, value: &str| {
            NonEmptyText::new(value)
                .map_err(|_| WorkflowError::InvalidInput(format!("{field} is required")))
        };

        Ok(Self {
            id,
            created_at,
            created_by,
            patient: PatientRef {
                name: required("patient_name", &draft.patient_name)?,
                identifier: required("patient_identifier", &draft.patient_identifier)?,
            },
            doctor_name: required("doctor_name", &draft.doctor_name)?,
            diagnostic: draft
                .diagnostic
                .as_deref()
                .and_then(|d| NonEmptyText::new(d).ok()),
            ai_result: draft.ai_result,
            resident: ResidentReview::Pending,
            supervisor: SupervisorReview::NoObservation,
            pertinence: Pertinence::Pending,
            closure: None,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }

    pub fn medic_approved(&self) -> Option<bool> {
        self.resident.as_nullable()
    }

    pub fn supervisor_approved(&self) -> Option<bool> {
        self.supervisor.as_nullable()
    }

    pub fn pertinencia(&self) -> Option<bool> {
        self.pertinence.as_nullable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewAttention {
        NewAttention {
            patient_name: "Ana Rojas".into(),
            patient_identifier: "12.345.678-9".into(),
            doctor_name: "Dr. Soto".into(),
            diagnostic: Some("  ".into()),
            ai_result: Some(true),
        }
    }

    #[test]
    fn open_starts_with_all_axes_unset() {
        let a = ClinicalAttention::open(
            Uuid::new_v4(),
            draft(),
            ActorId::new("res-1").unwrap(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(a.medic_approved(), None);
        assert_eq!(a.supervisor_approved(), None);
        assert_eq!(a.pertinencia(), None);
        assert!(!a.is_closed());
        assert_eq!(a.diagnostic, None);
    }

    #[test]
    fn open_rejects_blank_doctor() {
        let mut d = draft();
        d.doctor_name = " ".into();
        let err = ClinicalAttention::open(
            Uuid::new_v4(),
            d,
            ActorId::new("res-1").unwrap(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidInput("doctor_name is required".into())
        );
    }

    #[test]
    fn observation_enforces_minimum_after_trim() {
        assert!(Observation::new("  ok  ").is_err());
        assert!(Observation::new("12345").is_ok());
        assert_eq!(
            Observation::new("").unwrap_err(),
            WorkflowError::InsufficientObservation {
                min: MIN_OBSERVATION_CHARS
            }
        );
    }

    #[test]
    fn closing_reason_parses_labels() {
        assert_eq!(
            "hospitalizacion".parse::<ClosingReason>().unwrap(),
            ClosingReason::Hospitalizacion
        );
        assert_eq!(
            "Hospitalización".parse::<ClosingReason>().unwrap(),
            ClosingReason::Hospitalizacion
        );
        assert_eq!("ALTA".parse::<ClosingReason>().unwrap(), ClosingReason::Alta);
        assert_eq!(
            "".parse::<ClosingReason>().unwrap_err(),
            WorkflowError::MissingClosingReason
        );
        assert!(matches!(
            "Fuga".parse::<ClosingReason>().unwrap_err(),
            WorkflowError::InvalidInput(_)
        ));
    }

    #[test]
    fn closing_reason_serialises_with_accent() {
        let json = serde_json::to_string(&ClosingReason::Hospitalizacion).unwrap();
        assert_eq!(json, "\"Hospitalización\"");
        let back: ClosingReason = serde_json::from_str("\"Hospitalizacion\"").unwrap();
        assert_eq!(back, ClosingReason::Hospitalizacion);
    }

    #[test]
    fn pertinence_nullable_mapping() {
        for value in [None, Some(true), Some(false)] {
            assert_eq!(Pertinence::from_nullable(value).as_nullable(), value);
        }
        assert_eq!(Pertinence::NotPertinent.label(), "No Pertinente");
    }
}
