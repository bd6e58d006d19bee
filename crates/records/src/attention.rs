//! Clinical attention wire model and translation helpers.
//!
//! Responsibilities:
//! - Define a strict wire model for `ATTENTION.yaml`
//! - Translate between the wire model and [`ClinicalAttention`]
//! - Reject records whose nullable fields describe a state the workflow cannot reach
//!
//! Notes:
//! - The file is overwritten on every transition; history lives in the git log
//! - Timestamps are RFC 3339 in UTC

use crate::{RecordsError, RecordsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulr_types::NonEmptyText;
use ulr_uuid::ShardableUuid;
use ulr_workflow::{
    ActorId, ClinicalAttention, ClosingReason, Closure, Observation, PatientRef, Pertinence,
    ResidentDecision, ResidentReview, SupervisorReview,
};

/// Clinical attention record operations.
///
/// Zero-sized namespace for the parse/render facade.
pub struct AttentionRecord;

impl AttentionRecord {
    /// Parse an episode from YAML text.
    ///
    /// Schema mismatches are reported with the path of the failing field (for example
    /// `resident.medic_approved`).
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError`] if:
    /// - the YAML does not match the wire schema or carries unknown keys,
    /// - a required text field is blank,
    /// - the review fields are inconsistent (for example an objection without an observation).
    pub fn parse(yaml_text: &str) -> RecordsResult<ClinicalAttention> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, AttentionWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(RecordsError::Translation(format!(
                    "attention schema mismatch at {path}: {source}"
                )));
            }
        };

        wire_to_domain(wire)
    }

    /// Render an episode as YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`RecordsError::InvalidYaml`] if serialisation fails.
    pub fn render(attention: &ClinicalAttention) -> RecordsResult<String> {
        let wire = domain_to_wire(attention);
        Ok(serde_yaml::to_string(&wire)?)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct AttentionWire {
    id: ShardableUuid,
    created_at: DateTime<Utc>,
    created_by: String,
    patient: PatientWire,
    doctor_name: String,
    #[serde(default)]
    diagnostic: Option<String>,
    #[serde(default)]
    ai_result: Option<bool>,
    resident: ResidentWire,
    supervisor: SupervisorWire,
    #[serde(default)]
    pertinencia: Option<bool>,
    closure: ClosureWire,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct PatientWire {
    name: String,
    identifier: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct ResidentWire {
    #[serde(default)]
    medic_approved: Option<bool>,
    #[serde(default)]
    medic_approved_reason: Option<String>,
    #[serde(default)]
    medic_approved_by: Option<String>,
    #[serde(default)]
    medic_approved_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct SupervisorWire {
    #[serde(default)]
    supervisor_approved: Option<bool>,
    #[serde(default)]
    supervisor_observation: Option<String>,
    #[serde(default)]
    reviewed_by: Option<String>,
    #[serde(default)]
    reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct ClosureWire {
    is_closed: bool,
    #[serde(default)]
    closing_reason: Option<ClosingReason>,
    #[serde(default)]
    closed_by: Option<String>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Translation (internal)
// ============================================================================

fn required_text(field: &str, value: &str) -> RecordsResult<NonEmptyText> {
    NonEmptyText::new(value)
        .map_err(|e| RecordsError::Translation(format!("{field}: {e}")))
}

fn actor_id(field: &str, value: Option<String>) -> RecordsResult<ActorId> {
    let value =
        value.ok_or_else(|| RecordsError::Inconsistent(format!("{field} is missing")))?;
    ActorId::new(&value).map_err(|e| RecordsError::Translation(format!("{field}: {e}")))
}

fn timestamp(field: &str, value: Option<DateTime<Utc>>) -> RecordsResult<DateTime<Utc>> {
    value.ok_or_else(|| RecordsError::Inconsistent(format!("{field} is missing")))
}

fn wire_to_domain(wire: AttentionWire) -> RecordsResult<ClinicalAttention> {
    let created_by = actor_id("created_by", Some(wire.created_by))?;

    Ok(ClinicalAttention {
        id: wire.id.uuid(),
        created_at: wire.created_at,
        created_by,
        patient: PatientRef {
            name: required_text("patient.name", &wire.patient.name)?,
            identifier: required_text("patient.identifier", &wire.patient.identifier)?,
        },
        doctor_name: required_text("doctor_name", &wire.doctor_name)?,
        diagnostic: wire
            .diagnostic
            .as_deref()
            .and_then(|d| NonEmptyText::new(d).ok()),
        ai_result: wire.ai_result,
        resident: resident_to_domain(wire.resident)?,
        supervisor: supervisor_to_domain(wire.supervisor)?,
        pertinence: Pertinence::from_nullable(wire.pertinencia),
        closure: closure_to_domain(wire.closure)?,
    })
}

fn resident_to_domain(wire: ResidentWire) -> RecordsResult<ResidentReview> {
    let Some(approved) = wire.medic_approved else {
        if wire.medic_approved_reason.is_some() || wire.medic_approved_by.is_some() {
            return Err(RecordsError::Inconsistent(
                "resident decision details present while medic_approved is null".into(),
            ));
        }
        return Ok(ResidentReview::Pending);
    };

    let reason = wire
        .medic_approved_reason
        .ok_or_else(|| RecordsError::Inconsistent("medic_approved_reason is missing".into()))?;
    let decision = ResidentDecision {
        reason: required_text("resident.medic_approved_reason", &reason)?,
        decided_by: actor_id("resident.medic_approved_by", wire.medic_approved_by)?,
        decided_at: timestamp("resident.medic_approved_at", wire.medic_approved_at)?,
    };

    Ok(if approved {
        ResidentReview::Approved(decision)
    } else {
        ResidentReview::Rejected(decision)
    })
}

fn supervisor_to_domain(wire: SupervisorWire) -> RecordsResult<SupervisorReview> {
    let Some(approved) = wire.supervisor_approved else {
        return Ok(SupervisorReview::NoObservation);
    };

    let reviewed_by = actor_id("supervisor.reviewed_by", wire.reviewed_by)?;
    let reviewed_at = timestamp("supervisor.reviewed_at", wire.reviewed_at)?;

    if approved {
        Ok(SupervisorReview::Ratified {
            observation: wire
                .supervisor_observation
                .as_deref()
                .and_then(|o| NonEmptyText::new(o).ok()),
            reviewed_by,
            reviewed_at,
        })
    } else {
        let observation = Observation::new(wire.supervisor_observation.unwrap_or_default())
            .map_err(|e| RecordsError::Inconsistent(format!("supervisor objection: {e}")))?;
        Ok(SupervisorReview::Objected {
            observation,
            reviewed_by,
            reviewed_at,
        })
    }
}

fn closure_to_domain(wire: ClosureWire) -> RecordsResult<Option<Closure>> {
    if !wire.is_closed {
        if wire.closing_reason.is_some() {
            return Err(RecordsError::Inconsistent(
                "closing_reason present on an open episode".into(),
            ));
        }
        return Ok(None);
    }

    let reason = wire
        .closing_reason
        .ok_or_else(|| RecordsError::Inconsistent("closed episode without closing_reason".into()))?;

    Ok(Some(Closure {
        reason,
        closed_by: actor_id("closure.closed_by", wire.closed_by)?,
        closed_at: timestamp("closure.closed_at", wire.closed_at)?,
    }))
}

fn domain_to_wire(a: &ClinicalAttention) -> AttentionWire {
    let text = |t: &NonEmptyText| t.as_str().to_string();

    let resident = match a.resident.decision() {
        None => ResidentWire::default(),
        Some(d) => ResidentWire {
            medic_approved: a.medic_approved(),
            medic_approved_reason: Some(text(&d.reason)),
            medic_approved_by: Some(d.decided_by.to_string()),
            medic_approved_at: Some(d.decided_at),
        },
    };

    let supervisor = SupervisorWire {
        supervisor_approved: a.supervisor_approved(),
        supervisor_observation: a.supervisor.observation().map(str::to_string),
        reviewed_by: a.supervisor.reviewed_by().map(ToString::to_string),
        reviewed_at: a.supervisor.reviewed_at(),
    };

    let closure = match &a.closure {
        None => ClosureWire::default(),
        Some(c) => ClosureWire {
            is_closed: true,
            closing_reason: Some(c.reason),
            closed_by: Some(c.closed_by.to_string()),
            closed_at: Some(c.closed_at),
        },
    };

    AttentionWire {
        id: ShardableUuid::from_uuid(a.id),
        created_at: a.created_at,
        created_by: a.created_by.to_string(),
        patient: PatientWire {
            name: text(&a.patient.name),
            identifier: text(&a.patient.identifier),
        },
        doctor_name: text(&a.doctor_name),
        diagnostic: a.diagnostic.as_ref().map(text),
        ai_result: a.ai_result,
        resident,
        supervisor,
        pertinencia: a.pertinencia(),
        closure,
    }
}
