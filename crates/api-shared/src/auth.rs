//! Actor resolution from request headers.
//!
//! The REST API is stateless: every request names its actor in `x-actor-id` and
//! `x-actor-role`. Session handling and credential checks happen upstream (reverse proxy or
//! identity gateway); this crate only turns the forwarded identity into an [`Actor`].

use ulr_workflow::{Actor, WorkflowResult};

/// Header carrying the authenticated actor's identifier.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the authenticated actor's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Resolves the actor from raw header values.
///
/// # Errors
///
/// - `ActorNotIdentified` when either header is missing or blank.
/// - `InvalidInput` when the role is not recognised.
pub fn actor_from_headers(id: Option<&str>, role: Option<&str>) -> WorkflowResult<Actor> {
    Actor::resolve(id, role)
}
