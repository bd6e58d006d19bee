use crate::envelope::{self, ApiResult, RawOutcome};
use crate::optimistic::{run_optimistic, AttentionCache, PertinenceEdit};
use crate::{ClientError, ClientResult};
use api_shared::{
    auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
    AttentionDto, CreateAttentionReq, HealthRes, HistoryDto, ListResponse, PatchAttentionReq,
    SummaryDto,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use ulr_workflow::{
    default_resident_reason, Actor, ClosingReason, Command, SupervisorVerdict, WorkflowError,
};

/// Filters for listing and summary calls. Unset fields are left out of the query string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListAttentionsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_search: Option<String>,
    /// `"true"`, `"false"` or `"null"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medic_approved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_approved: Option<String>,
}

/// Client for one ULR server, acting on behalf of at most one actor.
///
/// Every call is a single attempt: no retry and no backoff. Failures surface as
/// [`ClientError::NetworkOrServer`] with the server's message verbatim.
#[derive(Clone, Debug)]
pub struct AttentionClient {
    base_url: String,
    http: reqwest::Client,
    actor: Option<Actor>,
}

impl AttentionClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the HTTP client cannot be constructed.
    pub fn new(base_url: impl AsRef<str>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            http,
            actor: None,
        })
    }

    /// Sets the actor named in the `x-actor-*` headers of every request.
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    fn require_actor(&self) -> ClientResult<&Actor> {
        self.actor
            .as_ref()
            .ok_or(ClientError::Validation(WorkflowError::ActorNotIdentified))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.actor {
            Some(actor) => builder
                .header(ACTOR_ID_HEADER, actor.id().as_str())
                .header(ACTOR_ROLE_HEADER, actor.role().as_str()),
            None => builder,
        }
    }

    async fn dispatch(&self, builder: RequestBuilder) -> RawOutcome {
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("request failed: {e}");
                return RawOutcome::Failed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return envelope::status_failure(status);
        }
        if status == StatusCode::NO_CONTENT {
            return RawOutcome::Empty;
        }

        match response.bytes().await {
            Ok(bytes) if bytes.is_empty() => RawOutcome::Empty,
            Ok(bytes) => RawOutcome::Body(bytes.to_vec()),
            Err(e) => RawOutcome::Failed(e.to_string()),
        }
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        envelope::into_api_result(self.dispatch(builder).await)
    }

    // ------------------------------------------------------------------
    // Envelope-level calls
    // ------------------------------------------------------------------

    pub async fn health_envelope(&self) -> ApiResult<HealthRes> {
        self.call(self.request(Method::GET, "/health")).await
    }

    pub async fn get_envelope(&self, id: &str) -> ApiResult<AttentionDto> {
        self.call(self.request(Method::GET, &format!("/clinical_attentions/{id}")))
            .await
    }

    /// Sends a raw PATCH body with no local validation.
    pub async fn patch_envelope(&self, id: &str, body: &PatchAttentionReq) -> ApiResult<AttentionDto> {
        self.call(
            self.request(Method::PATCH, &format!("/clinical_attentions/{id}"))
                .json(body),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    pub async fn health(&self) -> ClientResult<HealthRes> {
        envelope::into_data(self.health_envelope().await)
    }

    pub async fn list(&self, query: &ListAttentionsQuery) -> ClientResult<ListResponse<AttentionDto>> {
        let builder = self.request(Method::GET, "/clinical_attentions").query(query);
        envelope::into_list_response(self.dispatch(builder).await)
    }

    pub async fn summary(&self, query: &ListAttentionsQuery) -> ClientResult<SummaryDto> {
        let builder = self
            .request(Method::GET, "/clinical_attentions/summary")
            .query(query);
        envelope::into_data(self.call(builder).await)
    }

    pub async fn get(&self, id: &str) -> ClientResult<AttentionDto> {
        envelope::into_data(self.get_envelope(id).await)
    }

    pub async fn history(&self, id: &str) -> ClientResult<HistoryDto> {
        envelope::into_data(
            self.call(self.request(Method::GET, &format!("/clinical_attentions/{id}/history")))
                .await,
        )
    }

    pub async fn create(&self, req: &CreateAttentionReq) -> ClientResult<AttentionDto> {
        self.require_actor()?;
        envelope::into_data(
            self.call(self.request(Method::POST, "/clinical_attentions").json(req))
                .await,
        )
    }

    /// Records the resident decision. Without a reason the fixed reason for the direction is
    /// sent.
    pub async fn submit_resident_approval(
        &self,
        id: &str,
        approved: bool,
        reason: Option<String>,
    ) -> ClientResult<AttentionDto> {
        let actor = self.require_actor()?;
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| default_resident_reason(approved).to_string());
        let body = PatchAttentionReq::resident_approval(
            approved,
            Some(reason),
            Some(actor.id().to_string()),
        );
        envelope::into_data(self.patch_envelope(id, &body).await)
    }

    /// Ratifies (`Some(true)`), objects (`Some(false)`) or withdraws (`None`) the supervisor
    /// review. An objection without adequate observation text is rejected before sending.
    pub async fn submit_supervisor_review(
        &self,
        id: &str,
        approved: Option<bool>,
        observation: Option<String>,
    ) -> ClientResult<AttentionDto> {
        self.require_actor()?;
        Command::SupervisorReview {
            verdict: SupervisorVerdict::from_nullable(approved),
            observation: observation.clone(),
        }
        .validate()?;

        let body = PatchAttentionReq::supervisor_review(approved, observation);
        envelope::into_data(self.patch_envelope(id, &body).await)
    }

    pub async fn set_pertinence(&self, id: &str, value: Option<bool>) -> ClientResult<AttentionDto> {
        self.require_actor()?;
        envelope::into_data(
            self.patch_envelope(id, &PatchAttentionReq::pertinence(value))
                .await,
        )
    }

    /// Sets the pertinence in `cache` immediately, then confirms with the server.
    ///
    /// On failure the cached value is restored; on success the cache adopts the server's copy.
    pub async fn set_pertinence_optimistic(
        &self,
        cache: &mut AttentionCache,
        id: &str,
        value: Option<bool>,
    ) -> ClientResult<AttentionDto> {
        let edit = PertinenceEdit::new(id, value);
        run_optimistic(cache, &edit, || self.set_pertinence(id, value)).await
    }

    /// Closes the episode. A missing reason is rejected before sending.
    pub async fn close_episode(
        &self,
        id: &str,
        reason: Option<ClosingReason>,
    ) -> ClientResult<AttentionDto> {
        self.require_actor()?;
        Command::Close(reason).validate()?;
        let reason = reason.ok_or(WorkflowError::MissingClosingReason)?;

        envelope::into_data(
            self.patch_envelope(id, &PatchAttentionReq::close(reason.as_str()))
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulr_workflow::{ActorId, Role};

    fn supervisor() -> Actor {
        Actor::new(ActorId::new("sup-1").unwrap(), Role::Supervisor)
    }

    // Port 9 (discard) on localhost: local validation must fail before anything is sent.
    fn offline_client() -> AttentionClient {
        AttentionClient::new("http://127.0.0.1:9/").unwrap()
    }

    #[tokio::test]
    async fn mutations_without_actor_are_rejected_locally() {
        let err = offline_client()
            .set_pertinence("0123456789abcdef0123456789abcdef", Some(true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(WorkflowError::ActorNotIdentified)
        ));
    }

    #[tokio::test]
    async fn short_objection_is_rejected_locally() {
        let client = offline_client().with_actor(supervisor());
        let err = client
            .submit_supervisor_review("0123456789abcdef0123456789abcdef", Some(false), Some("no".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(WorkflowError::InsufficientObservation { .. })
        ));
    }

    #[tokio::test]
    async fn missing_closing_reason_is_rejected_locally() {
        let client = offline_client().with_actor(supervisor());
        let err = client
            .close_episode("0123456789abcdef0123456789abcdef", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(WorkflowError::MissingClosingReason)
        ));
    }

    #[test]
    fn query_leaves_out_unset_filters() {
        let query = ListAttentionsQuery {
            page: Some(2),
            medic_approved: Some("null".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, serde_json::json!({"page": 2, "medic_approved": "null"}));
    }
}
