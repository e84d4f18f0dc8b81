//! Error taxonomy shared by every engine subsystem

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the scene engine
///
/// The first three variants are structural: they are returned straight to
/// the caller and abort any traversal in progress. [`SceneError::Runtime`]
/// covers conditions raised by node hooks and backends mid-traversal, which
/// are reported through the `error` event before (optionally) unwinding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Malformed node constructor arguments
    #[error("Invalid node config: {0}")]
    InvalidNodeConfig(String),

    /// Lookup of a backend type that was never installed
    #[error("No backend installed of type '{0}'")]
    BackendNotFound(String),

    /// Installed backend is not of the requested concrete type
    #[error("Backend '{backend_type}' is not a {expected}")]
    BackendMismatch {
        /// Registered type string
        backend_type: String,
        /// Rust type the caller asked for
        expected: &'static str,
    },

    /// Operation on a destroyed or never-rendered scene
    #[error("Invalid scene graph: {0}")]
    InvalidSceneGraph(String),

    /// Condition raised by a node hook or backend during traversal
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration could not be loaded or failed validation
    #[error("Config error: {0}")]
    Config(String),
}

impl SceneError {
    /// Shorthand for a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Whether this is one of the structural errors
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidNodeConfig(_)
                | Self::BackendNotFound(_)
                | Self::BackendMismatch { .. }
                | Self::InvalidSceneGraph(_)
        )
    }
}

impl From<ConfigError> for SceneError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}
