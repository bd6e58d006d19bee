//! # ULR Core
//!
//! Episode store for the clinical attention workflow.
//!
//! This crate owns persistence and serialisation of workflow operations:
//! - sharded, git-versioned storage of one `ATTENTION.yaml` per episode
//! - per-episode mutual exclusion so each transition is a single atomic read-apply-commit
//! - the [`AttentionService`] facade (create, read, the four workflow commands, history)
//! - listing with filters and pagination, and summary tallies
//!
//! **No API concerns**: HTTP servers, request parsing and response envelopes belong in
//! `api-shared` and `api-rest`.

pub mod author;
pub mod config;
pub mod constants;
pub mod error;
pub mod locks;
pub mod query;
pub mod repositories;
pub mod validation;
pub mod versioned_files;

pub use author::CommitAuthor;
pub use config::CoreConfig;
pub use error::{AttentionError, AttentionResult};
pub use locks::AttentionLocks;
pub use query::{AttentionPage, AttentionQuery, NullableFilter};
pub use repositories::attention::{AttentionService, HistoryEntry, Initialised, Uninitialised};
pub use versioned_files::AttentionAction;

pub use ulr_uuid::ShardableUuid;
pub use ulr_workflow as workflow;
