//! # Myth GLSL
//!
//! GLSL preprocessing, dependency-aware shader compilation and hot reload.
//!
//! - [`preprocessor`]: zero-copy directive scanner with `#include` / `#need`
//! - [`ShaderSource`] / [`ShaderObject`]: what to compile and what was built
//! - [`CompileState`]: breadth-first builder over `#need` dependencies
//! - [`ShaderCache`]: weak table sharing live objects between programs
//! - [`ShaderProgram`]: link and shadow-build hot reload with atomic swap
//! - [`ShaderManager`]: program registry driving `reload_all`
//!
//! The GPU itself is reached only through the [`ShaderBackend`] trait.
//!
//! Everything here is single-threaded (`Rc`-based) and must stay on the
//! thread that owns the [`ShaderManager`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod cache;
pub mod compile_state;
pub mod compiler;
pub mod defines;
pub mod errors;
pub mod manager;
pub mod object;
pub mod preprocessor;
pub mod program;
pub mod settings;
pub mod source;

pub use backend::{AttributeBinding, ProgramHandle, ReleaseQueue, ShaderBackend, ShaderHandle};
pub use cache::ShaderCache;
pub use compile_state::{CompileState, CompiledShaders};
pub use compiler::ShaderCompiler;
pub use defines::ShaderDefines;
pub use errors::{Result, ShaderError};
pub use manager::{ProgramId, ReloadSummary, ShaderManager};
pub use object::{IncludedFile, ReloadState, ShaderObject};
pub use preprocessor::{BufferId, DirectiveContext, Directives, Preprocessor, Segment};
pub use program::ShaderProgram;
pub use settings::{CompileFlags, ShaderSettings};
pub use source::{ShaderSource, ShaderStage, SourceKey, SourceKind};
