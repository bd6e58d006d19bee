//! Mapping of raw HTTP outcomes onto the response envelope.
//!
//! - 2xx with a JSON body: the body is the envelope
//! - 204, an empty body or a non-JSON body: success without data
//! - any other status: failure `"HTTP <status>: <reason>"`; the body is not read
//! - transport failure: failure carrying the transport error

use crate::{ClientError, ClientResult};
use api_shared::{ApiResponse, ListResponse};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Result of one API call, always in envelope form.
pub type ApiResult<T> = ApiResponse<T>;

/// What came back from the server before envelope parsing.
pub(crate) enum RawOutcome {
    Body(Vec<u8>),
    Empty,
    Failed(String),
}

pub(crate) fn status_failure(status: StatusCode) -> RawOutcome {
    RawOutcome::Failed(format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    ))
}

/// Parses the body as JSON, treating non-JSON as no body at all.
fn parse_json<E: DeserializeOwned>(bytes: &[u8]) -> Result<Option<E>, String> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| format!("unexpected response shape: {e}"))
}

pub(crate) fn into_api_result<T: DeserializeOwned>(outcome: RawOutcome) -> ApiResult<T> {
    match outcome {
        RawOutcome::Empty => ApiResult::ok_empty(),
        RawOutcome::Failed(error) => ApiResult::failure(error),
        RawOutcome::Body(bytes) => match parse_json::<ApiResponse<T>>(&bytes) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => ApiResult::ok_empty(),
            Err(error) => ApiResult::failure(error),
        },
    }
}

pub(crate) fn into_list_response<T: DeserializeOwned>(outcome: RawOutcome) -> ClientResult<ListResponse<T>> {
    match outcome {
        RawOutcome::Failed(error) => Err(ClientError::NetworkOrServer(error)),
        RawOutcome::Empty => Err(ClientError::EmptyResponse),
        RawOutcome::Body(bytes) => match parse_json::<ListResponse<T>>(&bytes) {
            Ok(Some(list)) if list.success => Ok(list),
            Ok(Some(list)) => Err(ClientError::NetworkOrServer(
                list.error.unwrap_or_else(|| "request failed".into()),
            )),
            Ok(None) => Err(ClientError::EmptyResponse),
            Err(error) => Err(ClientError::NetworkOrServer(error)),
        },
    }
}

/// Unwraps the payload of a successful envelope.
pub(crate) fn into_data<T>(result: ApiResult<T>) -> ClientResult<T> {
    match result {
        ApiResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ApiResponse { success: true, .. } => Err(ClientError::EmptyResponse),
        ApiResponse { error, .. } => Err(ClientError::NetworkOrServer(
            error.unwrap_or_else(|| "request failed".into()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_shared::HealthRes;

    #[test]
    fn non_success_status_uses_reason_phrase() {
        let result: ApiResult<HealthRes> =
            into_api_result(status_failure(StatusCode::CONFLICT));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP 409: Conflict"));
    }

    #[test]
    fn empty_and_non_json_bodies_are_success_without_data() {
        let empty: ApiResult<HealthRes> = into_api_result(RawOutcome::Empty);
        assert!(empty.success && empty.data.is_none());

        let html: ApiResult<HealthRes> =
            into_api_result(RawOutcome::Body(b"<html>ok</html>".to_vec()));
        assert!(html.success && html.data.is_none());
    }

    #[test]
    fn json_body_is_the_envelope() {
        let body = br#"{"success":true,"data":{"ok":true,"message":"up"}}"#.to_vec();
        let result: ApiResult<HealthRes> = into_api_result(RawOutcome::Body(body));
        assert_eq!(result.data.map(|h| h.message), Some("up".to_string()));

        let body = br#"{"success":false,"error":"clinical attention is closed"}"#.to_vec();
        let result: ApiResult<HealthRes> = into_api_result(RawOutcome::Body(body));
        match into_data(result) {
            Err(ClientError::NetworkOrServer(msg)) => assert_eq!(msg, "clinical attention is closed"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn success_without_data_is_not_a_payload() {
        assert!(matches!(
            into_data(ApiResult::<HealthRes>::ok_empty()),
            Err(ClientError::EmptyResponse)
        ));
    }
}
