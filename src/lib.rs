pub mod cli;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod mcp;
pub mod notify;
pub mod resolver;
pub mod service;
pub mod storage;

pub use config::Project;
pub use error::{CountersignError, Result};
pub use mcp::CountersignServer;
pub use service::ApprovalService;
pub use storage::SqliteStore;
