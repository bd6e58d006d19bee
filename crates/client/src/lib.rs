//! # ULR Client
//!
//! Typed async client for the clinical attention REST API.
//!
//! - [`AttentionClient`]: one method per workflow operation, with local validation before any
//!   request is sent
//! - [`ApiResult`]: the `{success, data?, error?}` envelope every call resolves to
//! - [`run_optimistic`]: apply an edit locally, confirm it once with the server, roll back on
//!   failure

mod client;
mod envelope;
pub mod error;
pub mod optimistic;

pub use client::{AttentionClient, ListAttentionsQuery};
pub use envelope::ApiResult;
pub use error::{ClientError, ClientResult};
pub use optimistic::{run_optimistic, AttentionCache, LocalEdit, PertinenceEdit};

pub use api_shared as dto;
