use crate::{error::ApiError, AppState};
use api_shared::{
    auth::{actor_from_headers, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
    ApiResponse, AttentionDto, CreateAttentionReq, HealthRes, HealthService, HistoryDto,
    HistoryEntryDto, ListResponse, PatchAttentionReq, SummaryDto,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path as AxumPath, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use ulr_core::{
    workflow::{Actor, NewAttention},
    AttentionQuery, AttentionResult, AttentionService, Initialised, NullableFilter, ShardableUuid,
};

/// Query string of `GET /clinical_attentions` and `GET /clinical_attentions/summary`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAttentionsParams {
    /// 1-based page number (default 1).
    pub page: Option<usize>,
    /// Items per page (default 10, capped at 100).
    pub page_size: Option<usize>,
    /// Substring of the patient name or identifier.
    pub patient_search: Option<String>,
    /// Substring of the doctor name.
    pub doctor_search: Option<String>,
    /// `true`, `false` or `null` (pending).
    pub medic_approved: Option<String>,
    /// `true`, `false` or `null` (no observation).
    pub supervisor_approved: Option<String>,
}

impl TryFrom<ListAttentionsParams> for AttentionQuery {
    type Error = ApiError;

    fn try_from(p: ListAttentionsParams) -> Result<Self, Self::Error> {
        let filter = |value: Option<String>| -> Result<NullableFilter, ApiError> {
            Ok(value
                .as_deref()
                .map(str::parse::<NullableFilter>)
                .transpose()?
                .unwrap_or_default())
        };

        Ok(AttentionQuery {
            page: p.page,
            page_size: p.page_size,
            patient_search: p.patient_search.filter(|s| !s.trim().is_empty()),
            doctor_search: p.doctor_search.filter(|s| !s.trim().is_empty()),
            medic_approved: filter(p.medic_approved)?,
            supervisor_approved: filter(p.supervisor_approved)?,
        })
    }
}

fn header_actor(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Ok(actor_from_headers(
        value(ACTOR_ID_HEADER),
        value(ACTOR_ROLE_HEADER),
    )?)
}

fn attention_service(state: &AppState, id: &str) -> Result<AttentionService<Initialised>, ApiError> {
    let attention_id = match ShardableUuid::parse(id) {
        Ok(uuid) => uuid.uuid(),
        Err(e) => {
            tracing::debug!("Invalid clinical attention id: {:?}", e);
            return Err(ApiError::bad_request("Invalid clinical attention id"));
        }
    };
    Ok(AttentionService::with_id(
        state.cfg.clone(),
        state.locks.clone(),
        attention_id,
    ))
}

fn uninitialised_service(state: &AppState) -> AttentionService<ulr_core::Uninitialised> {
    AttentionService::new(state.cfg.clone(), state.locks.clone())
}

/// Runs a store call on the blocking pool. The store does file IO, libgit2 commits and waits on
/// per-episode locks, none of which may run on an async worker.
async fn run_store<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> AttentionResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = api_shared::HealthResponse)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub(crate) async fn health() -> Json<ApiResponse<HealthRes>> {
    Json(ApiResponse::ok(HealthService::check_health()))
}

#[utoipa::path(
    get,
    path = "/clinical_attentions",
    params(ListAttentionsParams),
    responses(
        (status = 200, description = "Page of clinical attentions, newest first", body = api_shared::AttentionListResponse),
        (status = 400, description = "Invalid filter or pagination"),
        (status = 500, description = "Internal server error")
    )
)]
/// List clinical attentions
///
/// Filters combine with AND. `total` counts every match; `count` counts the items on this page.
#[axum::debug_handler]
pub(crate) async fn list_attentions(
    State(state): State<AppState>,
    params: Result<Query<ListAttentionsParams>, QueryRejection>,
) -> Response {
    let query = match params {
        Ok(Query(p)) => AttentionQuery::try_from(p),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    };
    let page = match query {
        Ok(q) => {
            let service = uninitialised_service(&state);
            run_store(move || service.list(&q)).await
        }
        Err(e) => Err(e),
    };

    match page {
        Ok(page) => Json(ListResponse {
            success: true,
            results: page.results.iter().map(AttentionDto::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            count: page.count,
            error: None,
        })
        .into_response(),
        Err(e) => e.into_list_response::<AttentionDto>(),
    }
}

#[utoipa::path(
    post,
    path = "/clinical_attentions",
    request_body = api_shared::CreateAttentionReq,
    params(
        ("x-actor-id" = String, Header, description = "Authenticated actor id"),
        ("x-actor-role" = String, Header, description = "resident, supervisor, admin or insurer"),
    ),
    responses(
        (status = 201, description = "Clinical attention created", body = api_shared::AttentionResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Actor not identified"),
        (status = 403, description = "Role not permitted"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new clinical attention
///
/// All three review axes start unset.
#[axum::debug_handler]
pub(crate) async fn create_attention(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateAttentionReq>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AttentionDto>>), ApiError> {
    let actor = header_actor(&headers)?;
    let draft = NewAttention::from(json_body(body)?);

    let service = uninitialised_service(&state);
    let (_, attention) = run_store(move || service.create(&actor, draft)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AttentionDto::from(&attention))),
    ))
}

#[utoipa::path(
    get,
    path = "/clinical_attentions/summary",
    params(ListAttentionsParams),
    responses(
        (status = 200, description = "Counts over every matching clinical attention", body = api_shared::SummaryResponse),
        (status = 400, description = "Invalid filter")
    )
)]
/// Aggregate counts
///
/// Uses the same filters as the listing; pagination parameters are ignored.
#[axum::debug_handler]
pub(crate) async fn attention_summary(
    State(state): State<AppState>,
    params: Result<Query<ListAttentionsParams>, QueryRejection>,
) -> Result<Json<ApiResponse<SummaryDto>>, ApiError> {
    let Query(params) = params.map_err(|r| ApiError::bad_request(r.body_text()))?;
    let query = AttentionQuery::try_from(params)?;

    let service = uninitialised_service(&state);
    let summary = run_store(move || Ok(service.summary(&query))).await?;
    Ok(Json(ApiResponse::ok(SummaryDto::from(summary))))
}

#[utoipa::path(
    get,
    path = "/clinical_attentions/{id}",
    params(("id" = String, Path, description = "Clinical attention id (32 lowercase hex)")),
    responses(
        (status = 200, description = "Clinical attention", body = api_shared::AttentionResponse),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Read a clinical attention
#[axum::debug_handler]
pub(crate) async fn get_attention(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ApiResponse<AttentionDto>>, ApiError> {
    let service = attention_service(&state, &id)?;
    let attention = run_store(move || service.read()).await?;
    Ok(Json(ApiResponse::ok(AttentionDto::from(&attention))))
}

#[utoipa::path(
    patch,
    path = "/clinical_attentions/{id}",
    request_body = api_shared::PatchAttentionReq,
    params(
        ("id" = String, Path, description = "Clinical attention id (32 lowercase hex)"),
        ("x-actor-id" = String, Header, description = "Authenticated actor id"),
        ("x-actor-role" = String, Header, description = "resident, supervisor, admin or insurer"),
    ),
    responses(
        (status = 200, description = "Updated clinical attention", body = api_shared::AttentionResponse),
        (status = 400, description = "Invalid body or failed validation"),
        (status = 401, description = "Actor not identified"),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Resident review already decided, or episode closed"),
        (status = 500, description = "Internal server error")
    )
)]
/// Apply one workflow action
///
/// The body selects the action: resident approval, supervisor review, pertinence or closure.
/// The action is applied as one transaction; a rejected action leaves the episode unchanged.
#[axum::debug_handler]
pub(crate) async fn patch_attention(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    body: Result<Json<PatchAttentionReq>, JsonRejection>,
) -> Result<Json<ApiResponse<AttentionDto>>, ApiError> {
    let actor = header_actor(&headers)?;
    let service = attention_service(&state, &id)?;
    let command = json_body(body)?.into_command(&actor)?;

    let attention = run_store(move || service.execute(&actor, command)).await?;
    Ok(Json(ApiResponse::ok(AttentionDto::from(&attention))))
}

#[utoipa::path(
    get,
    path = "/clinical_attentions/{id}/history",
    params(("id" = String, Path, description = "Clinical attention id (32 lowercase hex)")),
    responses(
        (status = 200, description = "Audit trail, newest first", body = api_shared::HistoryResponse),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Audit trail of a clinical attention
#[axum::debug_handler]
pub(crate) async fn attention_history(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ApiResponse<HistoryDto>>, ApiError> {
    let service = attention_service(&state, &id)?;
    let attention_id = service.attention_id().to_string();
    let entries = run_store(move || service.history())
        .await?
        .into_iter()
        .map(|h| HistoryEntryDto {
            commit: h.commit,
            at: h.at,
            action: h.action.to_string(),
            summary: h.summary,
            actor_id: h.actor_id,
            actor_role: h.actor_role,
            care_location: h.care_location,
        })
        .collect();

    Ok(Json(ApiResponse::ok(HistoryDto {
        attention_id,
        entries,
    })))
}
