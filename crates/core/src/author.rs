//! Commit authorship.
//!
//! Every commit in an episode repository is attributed to the actor who performed the
//! operation. The git signature uses the actor id as the name and `{actor}@{namespace}` as the
//! e-mail; the actor's role travels in the `Actor-Role` trailer.

use crate::{AttentionError, AttentionResult};
use ulr_workflow::{Actor, Role};

/// Author information for a single commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitAuthor {
    name: String,
    email: String,
    role: Role,
}

impl CommitAuthor {
    /// Builds the commit author for `actor` within `namespace`.
    pub fn for_actor(actor: &Actor, namespace: &str) -> Self {
        let id = actor.id().as_str();
        Self {
            name: id.to_string(),
            email: format!("{id}@{namespace}"),
            role: actor.role(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Creates the git signature for this author at the current time.
    pub(crate) fn signature(&self) -> AttentionResult<git2::Signature<'static>> {
        git2::Signature::now(&self.name, &self.email).map_err(AttentionError::GitSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulr_workflow::ActorId;

    #[test]
    fn email_uses_namespace() {
        let actor = Actor::new(ActorId::new("sup-4").unwrap(), Role::Supervisor);
        let author = CommitAuthor::for_actor(&actor, "ulr.test");
        assert_eq!(author.name(), "sup-4");
        assert_eq!(author.email(), "sup-4@ulr.test");
        assert_eq!(author.role(), Role::Supervisor);
    }
}
