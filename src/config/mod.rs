//! Configuration module
//!
//! Settings come from a JSON file; the navigation graph and the known-error
//! catalogue come from a TOML declaration file.

pub mod graph_file;
pub mod settings;

pub use graph_file::GraphFile;
pub use settings::{EngineSettings, ManorConfig, MessageHandler, Settings, SlotConfig, TimedTask};

use crate::graph::GraphError;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid graph: {0}")]
    Graph(#[from] GraphError),
}
