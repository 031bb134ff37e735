//! Compiler Settings & Compile Flags
//!
//! This module defines the embedder-facing configuration of the shader
//! pipeline.
//!
//! - [`CompileFlags`] selects how a single compilation interacts with the
//!   [`ShaderCache`](crate::ShaderCache).
//! - [`ShaderSettings`] carries the include paths, global definitions and the
//!   injected `#version` line. It can be deserialized from JSON.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_glsl::{ShaderSettings, CompileFlags};
//!
//! let settings = ShaderSettings {
//!     include_paths: vec!["assets/shaders".into()],
//!     version: Some("330 core".into()),
//!     ..Default::default()
//! };
//! assert_eq!(settings.flags(), CompileFlags::CACHED);
//! ```

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::defines::ShaderDefines;
use crate::errors::Result;

bitflags! {
    /// Controls cache interaction for one compilation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompileFlags: u8 {
        /// Reuse live objects registered in the cache.
        const LOOKUP_CACHE = 1 << 0;
        /// Register freshly built objects in the cache.
        const PUT_CACHE = 1 << 1;
        /// Re-validate cache hits against file modification times.
        const CHECK_OUTDATED = 1 << 2;

        const CACHED = Self::LOOKUP_CACHE.bits() | Self::PUT_CACHE.bits() | Self::CHECK_OUTDATED.bits();
    }
}

impl Default for CompileFlags {
    fn default() -> Self {
        Self::CACHED
    }
}

/// Configuration for a [`ShaderCompiler`](crate::ShaderCompiler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSettings {
    /// Ordered include-path list; the first directory containing a file wins.
    pub include_paths: Vec<PathBuf>,

    /// Global definitions injected before any file content.
    pub defines: ShaderDefines,

    /// Version/profile string injected as the very first `#version` line.
    pub version: Option<String>,

    /// Look up and populate the shader cache.
    pub use_cache: bool,

    /// Validate cache hits against file modification times.
    pub check_outdated: bool,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            defines: ShaderDefines::new(),
            version: None,
            use_cache: true,
            check_outdated: true,
        }
    }
}

impl ShaderSettings {
    /// Default compile flags derived from the cache policy.
    #[must_use]
    pub fn flags(&self) -> CompileFlags {
        let mut flags = CompileFlags::empty();
        if self.use_cache {
            flags |= CompileFlags::LOOKUP_CACHE | CompileFlags::PUT_CACHE;
        }
        if self.check_outdated {
            flags |= CompileFlags::CHECK_OUTDATED;
        }
        flags
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
