//! Organization directory boundary.
//!
//! The engine only reads from the directory: who an employee is, where they
//! sit in the organization, which approval chain applies to a request type,
//! and who currently holds a given role relative to an applicant.

mod static_directory;

pub use static_directory::{
    ChainEntry, DepartmentEntry, DirectoryFile, EmployeeEntry, RoleHolderEntry, StaticDirectory,
};

#[cfg(test)]
pub(crate) use static_directory::tests::sample_directory;

use serde::{Deserialize, Serialize};

use crate::entity::{Participant, ParticipantId};
use crate::error::Result;

/// A position in an approval chain, resolved to a person per applicant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoleRef {
    /// The applicant's direct superior
    ImmediateSuperior,
    /// Head of the applicant's department
    DepartmentHead,
    /// Named role such as `hr_manager` or `department_dean`
    Role(String),
    /// A fixed person
    Participant(ParticipantId),
}

impl std::fmt::Display for RoleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleRef::ImmediateSuperior => write!(f, "immediate_superior"),
            RoleRef::DepartmentHead => write!(f, "department_head"),
            RoleRef::Role(name) => write!(f, "role:{}", name),
            RoleRef::Participant(id) => write!(f, "participant:{}", id),
        }
    }
}

impl std::str::FromStr for RoleRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix("role:") {
            if name.is_empty() {
                return Err("Role name is empty".to_string());
            }
            return Ok(RoleRef::Role(name.to_lowercase()));
        }
        if let Some(id) = s.strip_prefix("participant:") {
            if id.is_empty() {
                return Err("Participant id is empty".to_string());
            }
            return Ok(RoleRef::Participant(ParticipantId::from(id)));
        }
        match s.to_lowercase().replace('-', "_").as_str() {
            "immediate_superior" | "superior" => Ok(RoleRef::ImmediateSuperior),
            "department_head" => Ok(RoleRef::DepartmentHead),
            _ => Err(format!("Unknown role reference: {}", s)),
        }
    }
}

impl TryFrom<String> for RoleRef {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RoleRef> for String {
    fn from(role: RoleRef) -> Self {
        role.to_string()
    }
}

/// Where an employee sits in the organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub department_id: String,
    pub job_class_id: String,
}

pub trait OrgDirectory {
    fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>>;

    fn placement(&self, id: &ParticipantId) -> Result<Option<Placement>>;

    /// Ordered role list for a request type, or `None` when nothing is
    /// configured for this department and job class.
    fn lookup_evaluator_chain(
        &self,
        request_path: &str,
        department_id: &str,
        job_class_id: &str,
    ) -> Result<Option<Vec<RoleRef>>>;

    fn resolve_role_to_participant(
        &self,
        role: &RoleRef,
        applicant_id: &ParticipantId,
    ) -> Result<ParticipantId>;
}
