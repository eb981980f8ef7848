//! Project layout and `.countersign/config.yaml`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CountersignError, Result};
use crate::storage::SqliteStore;

pub const PROJECT_DIR: &str = ".countersign";
pub const CONFIG_FILE: &str = "config.yaml";

const DIRECTORY_SKELETON: &str = "\
# Organization directory used to resolve approval chains.
#
# employees:
#   - id: E-100
#     name: Ana Cruz
#     email: ana@example.org
#     department: nursing
#     job_class: staff
#     superior: E-050
# departments:
#   - id: nursing
#     head: E-020
# roles:
#   - role: hr_manager
#     holder: E-001
# chains:
#   - path: leave
#     evaluators: [immediate_superior, \"role:hr_manager\"]
employees: []
departments: []
roles: []
chains: []
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file name inside the project directory
    pub database: String,
    /// Directory file name inside the project directory
    pub directory: String,
    pub concurrency: ConcurrencyConfig,
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "countersign.db".to_string(),
            directory: "directory.yaml".to_string(),
            concurrency: ConcurrencyConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Attempts at a versioned write before giving up
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub busy_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff_ms: 15,
            busy_timeout_ms: 5000,
        }
    }
}

impl ConcurrencyConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Log,
    #[default]
    Outbox,
    None,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Log => write!(f, "log"),
            SinkKind::Outbox => write!(f, "outbox"),
            SinkKind::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub sink: SinkKind,
    /// Display name prefixed to notification subjects
    pub sender: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            sender: "HR Approvals".to_string(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty file is a valid all-defaults config
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| CountersignError::Config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency.max_attempts == 0 {
            return Err(CountersignError::Config(
                "concurrency.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.database.trim().is_empty() || self.directory.trim().is_empty() {
            return Err(CountersignError::Config(
                "database and directory file names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// An initialized project: its root, `.countersign/` and loaded config.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Create `.countersign/` under `root` with a default config, a
    /// directory skeleton and an empty database.
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(PROJECT_DIR);
        if dir.exists() {
            return Err(CountersignError::AlreadyInitialized);
        }
        fs::create_dir_all(&dir)?;

        let config = Config::default();
        fs::write(dir.join(CONFIG_FILE), serde_yaml::to_string(&config)?)?;
        fs::write(dir.join(&config.directory), DIRECTORY_SKELETON)?;

        let project = Self {
            root: root.to_path_buf(),
            config,
        };
        SqliteStore::open(&project.database_path(), project.config.concurrency.busy_timeout())?;
        Ok(project)
    }

    pub fn open(root: &Path) -> Result<Self> {
        let config_path = root.join(PROJECT_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(CountersignError::NotInitialized);
        }
        Ok(Self {
            root: root.to_path_buf(),
            config: Config::load(&config_path)?,
        })
    }

    /// Walk up from `start` to the nearest directory holding `.countersign/`.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = start;
        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Self::open(current);
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return Err(CountersignError::NotInitialized),
            }
        }
    }

    pub fn from_current_dir() -> Result<Self> {
        Self::discover(&env::current_dir()?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn project_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn database_path(&self) -> PathBuf {
        self.project_dir().join(&self.config.database)
    }

    pub fn directory_path(&self) -> PathBuf {
        self.project_dir().join(&self.config.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.concurrency.max_attempts, 5);
        assert_eq!(config.concurrency.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.notifications.sink, SinkKind::Outbox);
        assert_eq!(config.notifications.sender, "HR Approvals");
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_yaml_str(
            "concurrency:\n  max_attempts: 2\nnotifications:\n  sink: log\n",
        )
        .unwrap();
        assert_eq!(config.concurrency.max_attempts, 2);
        assert_eq!(config.concurrency.retry_backoff_ms, 15);
        assert_eq!(config.notifications.sink, SinkKind::Log);
        assert_eq!(config.database, "countersign.db");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            Config::from_yaml_str("notifications:\n  sink: pigeon\n"),
            Err(CountersignError::Config(_))
        ));
        assert!(matches!(
            Config::from_yaml_str("concurrency:\n  max_attempts: 0\n"),
            Err(CountersignError::Config(_))
        ));
    }

    #[test]
    fn test_init_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.project_dir().join(CONFIG_FILE).exists());
        assert!(project.directory_path().exists());
        assert!(project.database_path().exists());

        // The skeleton is a loadable, empty directory
        let directory = crate::directory::StaticDirectory::load(&project.directory_path()).unwrap();
        assert_eq!(directory.employee_count(), 0);

        assert!(matches!(
            Project::init(tmp.path()),
            Err(CountersignError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        Project::init(tmp.path()).unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root(), tmp.path());
    }

    #[test]
    fn test_open_uninitialized() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Project::open(tmp.path()),
            Err(CountersignError::NotInitialized)
        ));
    }
}
