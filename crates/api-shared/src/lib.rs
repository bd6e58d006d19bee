//! # API Shared
//!
//! Wire types and shared services for the clinical attention REST API.
//!
//! Contains:
//! - Request/response DTOs with OpenAPI schemas (`dto` module)
//! - The response envelopes `{success, data?, error?}` and the paginated list envelope
//! - Actor header resolution (`auth`)
//! - `HealthService`
//!
//! Used by `api-rest` on the server side and by `ulr-client` on the client side, so both ends
//! agree on one JSON shape.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
