/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

// Re-export subsystem errors
pub use crate::assets::AssetError;
pub use crate::gl::GlError;
pub use crate::memory::MemoryError;
pub use crate::tasks::TaskError;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Environment overrides must be positive integers.")
    )]
    InvalidValue { key: String, value: String },

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    #[diagnostic(code(config::out_of_range))]
    OutOfRange {
        field: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },
}

/// Unified runtime error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    #[error("Memory error: {0}")]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error("Task error: {0}")]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),

    #[error("GL error: {0}")]
    #[diagnostic(transparent)]
    Gl(#[from] GlError),

    #[error("Asset error: {0}")]
    #[diagnostic(transparent)]
    Asset(#[from] AssetError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(runtime::io_error),
        help("Filesystem or I/O operation failed. Check the path and permissions.")
    )]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Whether the caller should abort instead of continuing with other work
    pub fn is_fatal(&self) -> bool {
        match self {
            RuntimeError::Memory(err) => err.is_fatal(),
            RuntimeError::Task(err) => err.is_fatal(),
            RuntimeError::Gl(_) => true,
            RuntimeError::Asset(err) => err.is_fatal(),
            RuntimeError::Config(_) => true,
            RuntimeError::Io(_) => false,
        }
    }
}
