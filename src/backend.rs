//! Shader Backend Boundary
//!
//! The pipeline never talks to a graphics API directly. Everything that turns
//! text into GPU objects goes through the narrow [`ShaderBackend`] trait:
//!
//! | Method | GL equivalent |
//! |--------|---------------|
//! | [`ShaderBackend::compile_stage`]  | `glCreateShader` + `glShaderSource` + `glCompileShader` |
//! | [`ShaderBackend::link_program`]   | `glBindAttribLocation` + `glLinkProgram` |
//! | [`ShaderBackend::delete_shader`]  | `glDeleteShader` |
//! | [`ShaderBackend::delete_program`] | `glDeleteProgram` |
//!
//! Shader handles are released lazily: a dropped [`ShaderObject`](crate::ShaderObject)
//! pushes its handle onto a [`ReleaseQueue`] that the compiler drains into
//! [`ShaderBackend::delete_shader`] at safe points.

use std::cell::RefCell;
use std::fmt;

use crate::errors::Result;
use crate::source::ShaderStage;

/// Opaque handle of a compiled shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

/// Opaque handle of a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

impl fmt::Display for ShaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader#{}", self.0)
    }
}

impl fmt::Display for ProgramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Vertex attribute location bound before linking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    pub location: u32,
    pub name: String,
}

/// External compile/link capability.
///
/// Implementations report source rejections as
/// [`ShaderError::CompilationFailed`](crate::ShaderError::CompilationFailed) /
/// [`ShaderError::LinkageFailed`](crate::ShaderError::LinkageFailed) and any
/// other API failure as [`ShaderError::Backend`](crate::ShaderError::Backend).
pub trait ShaderBackend {
    /// Compiles the ordered `segments` as one stage. The concatenation of the
    /// segments is the full preprocessed source.
    fn compile_stage(
        &mut self,
        stage: ShaderStage,
        name: &str,
        segments: &[&str],
    ) -> Result<ShaderHandle>;

    /// Links the given stages into a program.
    fn link_program(
        &mut self,
        shaders: &[ShaderHandle],
        attributes: &[AttributeBinding],
    ) -> Result<ProgramHandle>;

    fn delete_shader(&mut self, handle: ShaderHandle);

    fn delete_program(&mut self, handle: ProgramHandle);
}

/// Handles whose owning objects have been dropped, awaiting deletion.
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    pending: RefCell<Vec<ShaderHandle>>,
}

impl ReleaseQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, handle: ShaderHandle) {
        self.pending.borrow_mut().push(handle);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Hands every queued handle to the backend. Returns how many were freed.
    pub fn flush(&self, backend: &mut dyn ShaderBackend) -> usize {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        for &handle in &pending {
            backend.delete_shader(handle);
        }
        pending.len()
    }
}
