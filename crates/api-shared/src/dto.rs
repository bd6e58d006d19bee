//! JSON request and response types for the clinical attention API.
//!
//! Nullable booleans (`medic_approved`, `supervisor_approved`, `pertinencia`) are always
//! serialised, as `null` when unset. In PATCH bodies an absent field and an explicit `null` mean
//! different things, so those fields are `Option<Option<_>>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use ulr_workflow::{
    derive_urgency_law_outcome, Actor, AttentionSummary, ClinicalAttention, ClosingReason,
    Command, NewAttention, Pertinence, SupervisorVerdict, WorkflowError, WorkflowResult,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

// ============================================================================
// Envelopes
// ============================================================================

/// Response envelope for single-item calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[aliases(
    AttentionResponse = ApiResponse<AttentionDto>,
    HealthResponse = ApiResponse<HealthRes>,
    SummaryResponse = ApiResponse<SummaryDto>,
    HistoryResponse = ApiResponse<HistoryDto>
)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success without a payload (HTTP 204 or a non-JSON body).
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Response envelope for paginated listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[aliases(AttentionListResponse = ListResponse<AttentionDto>)]
pub struct ListResponse<T> {
    pub success: bool,
    pub results: Vec<T>,
    /// Items matching the filters across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    /// Items on this page.
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ListResponse<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            total: 0,
            page: 0,
            page_size: 0,
            count: 0,
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Episode
// ============================================================================

/// A clinical attention as returned by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttentionDto {
    /// 32 lowercase hex characters.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub patient_name: String,
    pub patient_identifier: String,
    pub doctor_name: String,
    pub diagnostic: Option<String>,
    pub ai_result: Option<bool>,
    pub medic_approved: Option<bool>,
    pub medic_approved_reason: Option<String>,
    pub medic_approved_by: Option<String>,
    pub medic_approved_at: Option<DateTime<Utc>>,
    pub supervisor_approved: Option<bool>,
    pub supervisor_observation: Option<String>,
    pub supervisor_reviewed_by: Option<String>,
    pub supervisor_reviewed_at: Option<DateTime<Utc>>,
    pub pertinencia: Option<bool>,
    /// "Pendiente", "Pertinente" or "No Pertinente".
    pub pertinencia_label: String,
    pub is_closed: bool,
    pub closing_reason: Option<String>,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Derived: whether the urgency law applies (`null` while unresolved).
    pub urgency_law: Option<bool>,
}

impl From<&ClinicalAttention> for AttentionDto {
    fn from(a: &ClinicalAttention) -> Self {
        let decision = a.resident.decision();
        Self {
            id: a.id.simple().to_string(),
            created_at: a.created_at,
            created_by: a.created_by.to_string(),
            patient_name: a.patient.name.to_string(),
            patient_identifier: a.patient.identifier.to_string(),
            doctor_name: a.doctor_name.to_string(),
            diagnostic: a.diagnostic.as_ref().map(ToString::to_string),
            ai_result: a.ai_result,
            medic_approved: a.medic_approved(),
            medic_approved_reason: decision.map(|d| d.reason.to_string()),
            medic_approved_by: decision.map(|d| d.decided_by.to_string()),
            medic_approved_at: decision.map(|d| d.decided_at),
            supervisor_approved: a.supervisor_approved(),
            supervisor_observation: a.supervisor.observation().map(str::to_string),
            supervisor_reviewed_by: a.supervisor.reviewed_by().map(ToString::to_string),
            supervisor_reviewed_at: a.supervisor.reviewed_at(),
            pertinencia: a.pertinencia(),
            pertinencia_label: a.pertinence.label().to_string(),
            is_closed: a.is_closed(),
            closing_reason: a.closure.as_ref().map(|c| c.reason.to_string()),
            closed_by: a.closure.as_ref().map(|c| c.closed_by.to_string()),
            closed_at: a.closure.as_ref().map(|c| c.closed_at),
            urgency_law: derive_urgency_law_outcome(a).as_nullable(),
        }
    }
}

impl AttentionDto {
    /// Replaces the pertinence fields, keeping the label in step.
    pub fn set_pertinencia(&mut self, value: Option<bool>) {
        self.pertinencia = value;
        self.pertinencia_label = Pertinence::from_nullable(value).label().to_string();
    }
}

/// Body of `POST /clinical_attentions`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAttentionReq {
    pub patient_name: String,
    pub patient_identifier: String,
    pub doctor_name: String,
    #[serde(default)]
    pub diagnostic: Option<String>,
    #[serde(default)]
    pub ai_result: Option<bool>,
}

impl From<CreateAttentionReq> for NewAttention {
    fn from(req: CreateAttentionReq) -> Self {
        Self {
            patient_name: req.patient_name,
            patient_identifier: req.patient_identifier,
            doctor_name: req.doctor_name,
            diagnostic: req.diagnostic,
            ai_result: req.ai_result,
        }
    }
}

// ============================================================================
// PATCH body
// ============================================================================

/// Serde adapter distinguishing an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
mod double_option {
    use super::*;

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Body of `PATCH /clinical_attentions/{id}`. Carries exactly one workflow action.
///
/// | Action | Fields |
/// |---|---|
/// | resident approval | `medic_approved`, `medic_approved_reason`?, `medic_approved_by`? |
/// | supervisor review | `supervisor_approved` (`null` withdraws), `supervisor_observation`? |
/// | pertinence | `pertinencia` (`true`, `false` or `null`) |
/// | closure | `closing_reason` |
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PatchAttentionReq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medic_approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medic_approved_reason: Option<String>,
    /// Must equal the `x-actor-id` header when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medic_approved_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<bool>, nullable)]
    pub supervisor_approved: Option<Option<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_observation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<bool>, nullable)]
    pub pertinencia: Option<Option<bool>>,

    /// One of "Muerte", "Hospitalización", "Alta", "Traslado".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_reason: Option<String>,
}

impl PatchAttentionReq {
    pub fn resident_approval(approved: bool, reason: Option<String>, by: Option<String>) -> Self {
        Self {
            medic_approved: Some(approved),
            medic_approved_reason: reason,
            medic_approved_by: by,
            ..Default::default()
        }
    }

    pub fn supervisor_review(approved: Option<bool>, observation: Option<String>) -> Self {
        Self {
            supervisor_approved: Some(approved),
            supervisor_observation: observation,
            ..Default::default()
        }
    }

    pub fn pertinence(value: Option<bool>) -> Self {
        Self {
            pertinencia: Some(value),
            ..Default::default()
        }
    }

    pub fn close(reason: impl Into<String>) -> Self {
        Self {
            closing_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Turns the body into a workflow command on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] if the body carries no action or several, if
    /// detail fields are sent without their action, if `medic_approved_by` names someone other
    /// than `actor`, or if `closing_reason` is not a known reason.
    pub fn into_command(self, actor: &Actor) -> WorkflowResult<Command> {
        let actions = [
            self.medic_approved.is_some(),
            self.supervisor_approved.is_some(),
            self.pertinencia.is_some(),
            self.closing_reason.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        if actions != 1 {
            return Err(WorkflowError::InvalidInput(
                "request must carry exactly one of medic_approved, supervisor_approved, pertinencia, closing_reason".into(),
            ));
        }

        let stray_resident_details = self.medic_approved.is_none()
            && (self.medic_approved_reason.is_some() || self.medic_approved_by.is_some());
        let stray_observation =
            self.supervisor_approved.is_none() && self.supervisor_observation.is_some();
        if stray_resident_details || stray_observation {
            return Err(WorkflowError::InvalidInput(
                "detail fields sent without their action".into(),
            ));
        }

        if let Some(approved) = self.medic_approved {
            if let Some(by) = self.medic_approved_by.as_deref() {
                if by.trim() != actor.id().as_str() {
                    return Err(WorkflowError::InvalidInput(
                        "medic_approved_by must match the authenticated actor".into(),
                    ));
                }
            }
            return Ok(Command::ResidentApproval {
                approved,
                reason: self.medic_approved_reason,
            });
        }

        if let Some(approved) = self.supervisor_approved {
            return Ok(Command::SupervisorReview {
                verdict: SupervisorVerdict::from_nullable(approved),
                observation: self.supervisor_observation,
            });
        }

        if let Some(value) = self.pertinencia {
            return Ok(Command::SetPertinence(Pertinence::from_nullable(value)));
        }

        let reason = self.closing_reason.unwrap_or_default();
        match reason.parse::<ClosingReason>() {
            Ok(reason) => Ok(Command::Close(Some(reason))),
            Err(WorkflowError::MissingClosingReason) => Ok(Command::Close(None)),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Summary and history
// ============================================================================

/// Aggregate counts over the filtered episodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SummaryDto {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    pub resident_pending: usize,
    pub resident_approved: usize,
    pub resident_rejected: usize,
    pub supervisor_no_observation: usize,
    pub supervisor_ratified: usize,
    pub supervisor_objected: usize,
    pub urgency_law_applies: usize,
    pub urgency_law_does_not_apply: usize,
    pub urgency_law_unresolved: usize,
    pub pertinent: usize,
    pub not_pertinent: usize,
    pub pertinence_pending: usize,
    pub by_closing_reason: BTreeMap<String, usize>,
}

impl From<AttentionSummary> for SummaryDto {
    fn from(s: AttentionSummary) -> Self {
        Self {
            total: s.total,
            open: s.open,
            closed: s.closed,
            resident_pending: s.resident_pending,
            resident_approved: s.resident_approved,
            resident_rejected: s.resident_rejected,
            supervisor_no_observation: s.supervisor_no_observation,
            supervisor_ratified: s.supervisor_ratified,
            supervisor_objected: s.supervisor_objected,
            urgency_law_applies: s.urgency_law_applies,
            urgency_law_does_not_apply: s.urgency_law_does_not_apply,
            urgency_law_unresolved: s.urgency_law_unresolved,
            pertinent: s.pertinent,
            not_pertinent: s.not_pertinent,
            pertinence_pending: s.pertinence_pending,
            by_closing_reason: s.by_closing_reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryDto {
    pub commit: String,
    pub at: DateTime<Utc>,
    /// `create`, `resident`, `supervisor`, `pertinence` or `close`.
    pub action: String,
    pub summary: String,
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
    pub care_location: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryDto {
    pub attention_id: String,
    /// Newest first.
    pub entries: Vec<HistoryEntryDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulr_workflow::{apply, ActorId, Role};

    fn actor(id: &str, role: Role) -> Actor {
        Actor::new(ActorId::new(id).unwrap(), role)
    }

    fn patch(json: &str) -> PatchAttentionReq {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn null_pertinencia_differs_from_absent() {
        assert_eq!(patch(r#"{"pertinencia": null}"#).pertinencia, Some(None));
        assert_eq!(patch(r#"{"closing_reason": "Alta"}"#).pertinencia, None);

        let json = serde_json::to_string(&PatchAttentionReq::pertinence(None)).unwrap();
        assert_eq!(json, r#"{"pertinencia":null}"#);
    }

    #[test]
    fn supervisor_null_withdraws() {
        let cmd = patch(r#"{"supervisor_approved": null}"#)
            .into_command(&actor("sup-1", Role::Supervisor))
            .unwrap();
        assert_eq!(
            cmd,
            Command::SupervisorReview {
                verdict: SupervisorVerdict::Withdraw,
                observation: None
            }
        );
    }

    #[test]
    fn exactly_one_action_is_required() {
        let sup = actor("sup-1", Role::Supervisor);
        for body in [
            "{}",
            r#"{"supervisor_approved": true, "closing_reason": "Alta"}"#,
            r#"{"supervisor_observation": "sin acción asociada"}"#,
        ] {
            assert!(matches!(
                patch(body).into_command(&sup),
                Err(WorkflowError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<PatchAttentionReq>(r#"{"is_closed": true}"#).is_err());
    }

    #[test]
    fn medic_approved_by_must_match_actor() {
        let body = PatchAttentionReq::resident_approval(true, None, Some("someone-else".into()));
        assert!(matches!(
            body.into_command(&actor("res-1", Role::Resident)),
            Err(WorkflowError::InvalidInput(_))
        ));

        let body = PatchAttentionReq::resident_approval(false, None, Some("res-1".into()));
        assert_eq!(
            body.into_command(&actor("res-1", Role::Resident)).unwrap(),
            Command::ResidentApproval {
                approved: false,
                reason: None
            }
        );
    }

    #[test]
    fn blank_closing_reason_becomes_missing_reason() {
        let admin = actor("adm-1", Role::Admin);
        assert_eq!(
            PatchAttentionReq::close("").into_command(&admin).unwrap(),
            Command::Close(None)
        );
        assert_eq!(
            PatchAttentionReq::close("Hospitalización")
                .into_command(&admin)
                .unwrap(),
            Command::Close(Some(ClosingReason::Hospitalizacion))
        );
        assert!(PatchAttentionReq::close("Fuga").into_command(&admin).is_err());
    }

    #[test]
    fn dto_carries_derived_urgency_law_and_nulls() {
        let a = ClinicalAttention::open(
            uuid::Uuid::new_v4(),
            NewAttention {
                patient_name: "Ana Rojas".into(),
                patient_identifier: "12.345.678-9".into(),
                doctor_name: "Dr. Soto".into(),
                diagnostic: None,
                ai_result: Some(true),
            },
            ActorId::new("res-1").unwrap(),
            Utc::now(),
        )
        .unwrap();
        let a = apply(
            &a,
            &actor("res-1", Role::Resident),
            Command::ResidentApproval {
                approved: false,
                reason: None,
            },
            Utc::now(),
        )
        .unwrap();

        let dto = AttentionDto::from(&a);
        assert_eq!(dto.id.len(), 32);
        assert_eq!(dto.urgency_law, Some(false));
        assert_eq!(dto.medic_approved_by.as_deref(), Some("res-1"));
        assert_eq!(dto.pertinencia_label, "Pendiente");

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json["supervisor_approved"].is_null());
        assert!(json["pertinencia"].is_null());
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let json = serde_json::to_string(&ApiResponse::<HealthRes>::failure("boom")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"boom"}"#);
    }
}
