//! Error Types
//!
//! This module defines the error types used by the shader pipeline.
//!
//! # Overview
//!
//! The main error type [`ShaderError`] covers all failure modes including:
//! - Source lookup and file access failures
//! - Malformed `#include` / `#need` directives
//! - Compile and link rejections reported by the backend
//! - Configuration loading errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, ShaderError>`.
//!
//! ```rust,ignore
//! use myth_glsl::errors::{ShaderError, Result};
//!
//! fn compile() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for shader preprocessing, compilation and reloading.
///
/// During a multi-file compile only the first error is surfaced as the
/// overall result; later failures are logged.
#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// The shader stage could not be determined or is unsupported.
    #[error("Invalid shader type: {0}")]
    InvalidShaderType(String),

    /// A resolved file could not be read or stat'ed.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Absolute path of the missing file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// A root or `#need` name matched no file in the include paths.
    #[error("File not in include path: {0}")]
    FileNotInPath(String),

    /// An `#include` name matched no file in the include paths.
    #[error("Include not found: {0}")]
    IncludeNotFound(String),

    /// A directive argument could not be parsed.
    #[error("Malformed #{directive} directive in {file} (line {line})")]
    MalformedDirective {
        /// Buffer the directive was found in
        file: String,
        /// 1-based line number
        line: usize,
        /// Directive keyword
        directive: String,
    },

    /// Staleness could not be determined because a backing file vanished.
    #[error("Shader source unavailable: {0}")]
    SourceUnavailable(String),

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The backend rejected the assembled source.
    #[error("Compilation of {name} failed: {log}")]
    CompilationFailed {
        /// Name of the source used in logs
        name: String,
        /// Compiler info log
        log: String,
    },

    /// Linking the program failed.
    #[error("Program linkage failed: {0}")]
    LinkageFailed(String),

    /// The backend failed for reasons unrelated to source content.
    #[error("Backend error: {0}")]
    Backend(String),

    // ========================================================================
    // Registry & Configuration Errors
    // ========================================================================
    /// A `ProgramId` no longer refers to a live program.
    #[error("Unknown shader program")]
    UnknownProgram,

    /// Settings could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShaderError {
    /// Wraps an I/O failure on `path` as [`ShaderError::FileNotFound`].
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileNotFound {
            path: path.into(),
            source,
        }
    }
}

/// Alias for `Result<T, ShaderError>`.
pub type Result<T> = std::result::Result<T, ShaderError>;
