use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{OrgDirectory, Placement, RoleRef};
use crate::entity::{Participant, ParticipantId};
use crate::error::{CountersignError, Result};

/// On-disk layout of `directory.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub employees: Vec<EmployeeEntry>,
    #[serde(default)]
    pub departments: Vec<DepartmentEntry>,
    #[serde(default)]
    pub roles: Vec<RoleHolderEntry>,
    #[serde(default)]
    pub chains: Vec<ChainEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeEntry {
    pub id: ParticipantId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub department: String,
    pub job_class: String,
    #[serde(default)]
    pub superior: Option<ParticipantId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head: Option<ParticipantId>,
}

/// Who holds a named role. Without `department` the holder is
/// organization-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleHolderEntry {
    pub role: String,
    #[serde(default)]
    pub department: Option<String>,
    pub holder: ParticipantId,
}

/// Evaluator chain for a request type. Omitted department or job class
/// matches any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub path: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub job_class: Option<String>,
    pub evaluators: Vec<RoleRef>,
}

type ChainKey = (String, Option<String>, Option<String>);

/// Directory held in memory, loaded from YAML.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    employees: HashMap<ParticipantId, EmployeeEntry>,
    department_heads: HashMap<String, ParticipantId>,
    // (role, department) -> holder; department None = organization-wide
    role_holders: HashMap<(String, Option<String>), ParticipantId>,
    chains: HashMap<ChainKey, Vec<RoleRef>>,
}

impl StaticDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: DirectoryFile = serde_yaml::from_str(text)?;
        Self::from_file(file)
    }

    pub fn from_file(file: DirectoryFile) -> Result<Self> {
        let mut directory = Self::default();

        for employee in file.employees {
            if directory.employees.contains_key(&employee.id) {
                return Err(CountersignError::Config(format!(
                    "duplicate employee id {} in directory",
                    employee.id
                )));
            }
            directory.employees.insert(employee.id.clone(), employee);
        }

        for department in file.departments {
            if let Some(head) = department.head {
                directory.department_heads.insert(department.id, head);
            }
        }

        for entry in file.roles {
            directory
                .role_holders
                .insert((entry.role.to_lowercase(), entry.department), entry.holder);
        }

        for chain in file.chains {
            let key = (chain.path, chain.department, chain.job_class);
            if directory.chains.contains_key(&key) {
                return Err(CountersignError::Config(format!(
                    "duplicate chain for path '{}' (department {:?}, job class {:?})",
                    key.0, key.1, key.2
                )));
            }
            directory.chains.insert(key, chain.evaluators);
        }

        Ok(directory)
    }

    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }

    fn employee(&self, id: &ParticipantId) -> Option<&EmployeeEntry> {
        self.employees.get(id)
    }
}

impl OrgDirectory for StaticDirectory {
    fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>> {
        Ok(self.employee(id).map(|e| Participant {
            id: e.id.clone(),
            name: e.name.clone(),
            email: e.email.clone(),
            picture: e.picture.clone(),
        }))
    }

    fn placement(&self, id: &ParticipantId) -> Result<Option<Placement>> {
        Ok(self.employee(id).map(|e| Placement {
            department_id: e.department.clone(),
            job_class_id: e.job_class.clone(),
        }))
    }

    fn lookup_evaluator_chain(
        &self,
        request_path: &str,
        department_id: &str,
        job_class_id: &str,
    ) -> Result<Option<Vec<RoleRef>>> {
        // Most specific configuration first
        let candidates = [
            (Some(department_id), Some(job_class_id)),
            (Some(department_id), None),
            (None, Some(job_class_id)),
            (None, None),
        ];

        for (department, job_class) in candidates {
            let key = (
                request_path.to_string(),
                department.map(str::to_string),
                job_class.map(str::to_string),
            );
            if let Some(chain) = self.chains.get(&key) {
                return Ok(Some(chain.clone()));
            }
        }
        Ok(None)
    }

    fn resolve_role_to_participant(
        &self,
        role: &RoleRef,
        applicant_id: &ParticipantId,
    ) -> Result<ParticipantId> {
        let unresolvable = || CountersignError::UnresolvableRole {
            role: role.to_string(),
            applicant: applicant_id.clone(),
        };

        let applicant = self
            .employee(applicant_id)
            .ok_or_else(|| CountersignError::ParticipantNotFound(applicant_id.clone()))?;

        match role {
            RoleRef::ImmediateSuperior => applicant.superior.clone().ok_or_else(unresolvable),
            RoleRef::DepartmentHead => self
                .department_heads
                .get(&applicant.department)
                .cloned()
                .ok_or_else(unresolvable),
            RoleRef::Role(name) => self
                .role_holders
                .get(&(name.clone(), Some(applicant.department.clone())))
                .or_else(|| self.role_holders.get(&(name.clone(), None)))
                .cloned()
                .ok_or_else(unresolvable),
            RoleRef::Participant(id) => Ok(id.clone()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_DIRECTORY: &str = r#"
employees:
  - id: E-100
    name: Ana Cruz
    email: ana@example.org
    department: nursing
    job_class: staff
    superior: E-050
  - id: E-101
    name: Eli Tan
    email: eli@example.org
    department: nursing
    job_class: faculty
    superior: E-050
  - id: E-050
    name: Ben Uy
    email: ben@example.org
    department: nursing
    job_class: supervisor
    superior: E-020
  - id: E-020
    name: Dan Sy
    email: dan@example.org
    department: nursing
    job_class: head
  - id: E-001
    name: Cora Lim
    email: cora@example.org
    picture: avatars/cora.png
    department: hr
    job_class: manager
  - id: E-030
    name: Fe Go
    email: fe@example.org
    department: nursing
    job_class: dean
  - id: E-200
    name: Gil Ong
    email: gil@example.org
    department: finance
    job_class: staff
departments:
  - id: nursing
    name: Nursing Service
    head: E-020
  - id: hr
    head: E-001
roles:
  - role: hr_manager
    holder: E-001
  - role: department_dean
    department: nursing
    holder: E-030
chains:
  - path: leave
    evaluators: [immediate_superior, "role:hr_manager"]
  - path: leave
    department: nursing
    job_class: faculty
    evaluators: [immediate_superior, "role:department_dean", "role:hr_manager"]
  - path: overtime
    department: nursing
    evaluators: [immediate_superior, department_head, "role:hr_manager"]
  - path: incident-action
    evaluators: [department_head, "role:hr_manager"]
"#;

    pub(crate) fn sample_directory() -> StaticDirectory {
        StaticDirectory::from_yaml_str(SAMPLE_DIRECTORY).unwrap()
    }

    #[test]
    fn test_load_sample() {
        let directory = sample_directory();
        assert_eq!(directory.employee_count(), 7);
        let cora = directory.participant(&ParticipantId::from("E-001")).unwrap().unwrap();
        assert_eq!(cora.picture.as_deref(), Some("avatars/cora.png"));
        assert!(directory.participant(&ParticipantId::from("E-404")).unwrap().is_none());
    }

    #[test]
    fn test_chain_precedence() {
        let directory = sample_directory();

        let exact = directory.lookup_evaluator_chain("leave", "nursing", "faculty").unwrap().unwrap();
        assert_eq!(exact.len(), 3);

        let fallback = directory.lookup_evaluator_chain("leave", "nursing", "staff").unwrap().unwrap();
        assert_eq!(fallback, vec![RoleRef::ImmediateSuperior, RoleRef::Role("hr_manager".into())]);

        let by_department = directory.lookup_evaluator_chain("overtime", "nursing", "staff").unwrap().unwrap();
        assert_eq!(by_department[1], RoleRef::DepartmentHead);

        assert!(directory.lookup_evaluator_chain("overtime", "finance", "staff").unwrap().is_none());
        assert!(directory.lookup_evaluator_chain("travel", "nursing", "staff").unwrap().is_none());
    }

    #[test]
    fn test_resolve_roles() {
        let directory = sample_directory();
        let ana = ParticipantId::from("E-100");

        let superior = directory.resolve_role_to_participant(&RoleRef::ImmediateSuperior, &ana).unwrap();
        assert_eq!(superior, ParticipantId::from("E-050"));

        let head = directory.resolve_role_to_participant(&RoleRef::DepartmentHead, &ana).unwrap();
        assert_eq!(head, ParticipantId::from("E-020"));

        let dean = directory
            .resolve_role_to_participant(&RoleRef::Role("department_dean".into()), &ana)
            .unwrap();
        assert_eq!(dean, ParticipantId::from("E-030"));

        let hr = directory
            .resolve_role_to_participant(&RoleRef::Role("hr_manager".into()), &ana)
            .unwrap();
        assert_eq!(hr, ParticipantId::from("E-001"));
    }

    #[test]
    fn test_unresolvable_roles() {
        let directory = sample_directory();

        // Department heads have no superior configured
        let err = directory
            .resolve_role_to_participant(&RoleRef::ImmediateSuperior, &ParticipantId::from("E-020"))
            .unwrap_err();
        assert!(matches!(err, CountersignError::UnresolvableRole { .. }));

        // No dean outside nursing and no organization-wide dean
        let err = directory
            .resolve_role_to_participant(&RoleRef::Role("department_dean".into()), &ParticipantId::from("E-200"))
            .unwrap_err();
        assert!(matches!(err, CountersignError::UnresolvableRole { .. }));

        let err = directory
            .resolve_role_to_participant(&RoleRef::DepartmentHead, &ParticipantId::from("E-404"))
            .unwrap_err();
        assert!(matches!(err, CountersignError::ParticipantNotFound(_)));
    }

    #[test]
    fn test_duplicate_chain_is_config_error() {
        let yaml = r#"
chains:
  - path: leave
    evaluators: [immediate_superior]
  - path: leave
    evaluators: [department_head]
"#;
        assert!(matches!(
            StaticDirectory::from_yaml_str(yaml),
            Err(CountersignError::Config(_))
        ));
    }

    #[test]
    fn test_bad_role_ref_is_yaml_error() {
        let yaml = r#"
chains:
  - path: leave
    evaluators: [janitor]
"#;
        assert!(matches!(
            StaticDirectory::from_yaml_str(yaml),
            Err(CountersignError::Yaml(_))
        ));
    }
}
