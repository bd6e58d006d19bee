//! Repository services.
//!
//! Each clinical attention is stored in its own sharded, git-versioned directory.

pub mod attention;
pub mod shared;
