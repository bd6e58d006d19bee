//! Authenticated actor context.
//!
//! Workflow operations never read ambient session state. The calling surface (REST headers, CLI
//! flags) resolves an [`Actor`] once and passes it explicitly into every operation.

use crate::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulr_types::NonEmptyText;

/// Identifier of the resident, supervisor or administrator performing an action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(NonEmptyText);

impl ActorId {
    /// Parses an actor identifier. Blank or multi-line input is rejected.
    pub fn new(input: impl AsRef<str>) -> WorkflowResult<Self> {
        NonEmptyText::single_line(input)
            .map(Self)
            .map_err(|e| WorkflowError::InvalidInput(format!("actor id: {e}")))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an actor within the review chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Resident physician; validates the AI result.
    Resident,
    /// Supervising physician; ratifies or objects to the resident's call.
    Supervisor,
    /// Administrator; may act on either axis and owns the pertinence tag.
    Admin,
    /// Insurance company reviewer; read-only.
    Insurer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resident => "resident",
            Self::Supervisor => "supervisor",
            Self::Admin => "admin",
            Self::Insurer => "insurer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resident" => Ok(Self::Resident),
            "supervisor" => Ok(Self::Supervisor),
            "admin" => Ok(Self::Admin),
            "insurer" => Ok(Self::Insurer),
            other => Err(WorkflowError::InvalidInput(format!("unknown role: '{other}'"))),
        }
    }
}

/// The authenticated caller of a workflow operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    role: Role,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }

    /// Resolves an actor from optional raw credentials.
    ///
    /// A missing or blank id, or a missing role, means nobody is authenticated and yields
    /// [`WorkflowError::ActorNotIdentified`]. It is never defaulted. An unrecognised role is an
    /// [`WorkflowError::InvalidInput`].
    pub fn resolve(id: Option<&str>, role: Option<&str>) -> WorkflowResult<Self> {
        let id = id
            .filter(|s| !s.trim().is_empty())
            .ok_or(WorkflowError::ActorNotIdentified)?;
        let role = role
            .filter(|s| !s.trim().is_empty())
            .ok_or(WorkflowError::ActorNotIdentified)?;

        Ok(Self {
            id: ActorId::new(id)?,
            role: role.parse()?,
        })
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Fails with [`WorkflowError::RoleNotPermitted`] unless this actor's role is in `allowed`.
    pub fn require_role(&self, allowed: &[Role], action: &'static str) -> WorkflowResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(WorkflowError::RoleNotPermitted {
                role: self.role,
                action,
            })
        }
    }
}
