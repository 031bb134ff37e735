//! Shader Programs & Hot Reload
//!
//! A [`ShaderProgram`] is a set of compiled [`ShaderObject`]s (the attached
//! sources plus every dependency they `#need`), attribute bindings, and the
//! linked program handle.
//!
//! # Hot reload
//!
//! [`ShaderProgram::reload`] never mutates the live program while building:
//!
//! 1. A linked program whose objects all report [`ReloadState::Uptodate`]
//!    is kept as is, whatever the cache policy.
//! 2. Otherwise a new, empty program is built in the shadow from the same
//!    sources with [`CompileFlags::CHECK_OUTDATED`], reusing up-to-date
//!    cached objects, and the same attribute bindings are applied.
//! 3. If the shadow build picked the same objects, the live program is kept.
//! 4. Otherwise the shadow program is linked. Only on success are the handle
//!    and the shader set swapped in, and only then is the old handle deleted.
//!
//! A broken edit therefore never disturbs a running program.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::backend::{AttributeBinding, ProgramHandle, ShaderHandle};
use crate::compiler::ShaderCompiler;
use crate::errors::Result;
use crate::object::{ReloadState, ShaderObject};
use crate::settings::CompileFlags;
use crate::source::{ShaderSource, ShaderStage, SourceKey};

#[derive(Debug, Default)]
pub struct ShaderProgram {
    handle: Option<ProgramHandle>,
    shaders: Vec<Rc<ShaderObject>>,
    attributes: Vec<AttributeBinding>,
    outdated: bool,
}

impl ShaderProgram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The linked program handle, if linked.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether shaders changed since the last successful link.
    #[inline]
    #[must_use]
    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    #[must_use]
    pub fn shaders(&self) -> &[Rc<ShaderObject>] {
        &self.shaders
    }

    pub fn shader_keys(&self) -> impl Iterator<Item = &SourceKey> {
        self.shaders.iter().map(|shader| shader.key())
    }

    #[must_use]
    pub fn shader(&self, key: &str) -> Option<&Rc<ShaderObject>> {
        self.shaders.iter().find(|shader| shader.key().as_str() == key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.shader(key).is_some()
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeBinding] {
        &self.attributes
    }

    /// Binds vertex attribute `name` to `location` for the next link.
    pub fn bind_attribute(&mut self, location: u32, name: &str) {
        if let Some(binding) = self.attributes.iter_mut().find(|b| b.name == name) {
            binding.location = location;
        } else {
            self.attributes.push(AttributeBinding {
                location,
                name: name.to_owned(),
            });
        }
        self.outdated = true;
    }

    /// Resolves `name` in the include paths and attaches it with its
    /// dependencies.
    pub fn add_shader_file(
        &mut self,
        compiler: &mut ShaderCompiler,
        name: &str,
        stage: Option<ShaderStage>,
    ) -> Result<()> {
        let source = compiler.file_source(name, stage)?;
        self.add_source(compiler, source)
    }

    /// Attaches in-memory code as a stage.
    pub fn add_shader_string(
        &mut self,
        compiler: &mut ShaderCompiler,
        stage: ShaderStage,
        name: &str,
        code: &str,
    ) -> Result<()> {
        self.add_source(compiler, ShaderSource::inline(stage, name, code))
    }

    /// Attaches `source` using the compiler's default flags.
    pub fn add_source(&mut self, compiler: &mut ShaderCompiler, source: ShaderSource) -> Result<()> {
        let flags = compiler.flags();
        self.add_source_with(compiler, source, flags)
    }

    /// Attaches `source` and its dependencies. Keys already attached are kept.
    pub fn add_source_with(
        &mut self,
        compiler: &mut ShaderCompiler,
        source: ShaderSource,
        flags: CompileFlags,
    ) -> Result<()> {
        if self.contains(source.key().as_str()) {
            return Ok(());
        }

        let compiled = compiler.compile(source, flags)?;
        for object in compiled.objects {
            if !self.contains(object.key().as_str()) {
                self.shaders.push(object);
                self.outdated = true;
            }
        }
        Ok(())
    }

    /// Links the attached shaders, replacing (and deleting) any previous
    /// handle on success.
    pub fn link(&mut self, compiler: &mut ShaderCompiler) -> Result<ProgramHandle> {
        let handles: SmallVec<[ShaderHandle; 4]> =
            self.shaders.iter().map(|shader| shader.handle()).collect();
        let handle = compiler.link(&handles, &self.attributes)?;

        if let Some(old) = self.handle.replace(handle) {
            compiler.delete_program(old);
        }
        self.outdated = false;
        log::debug!("Linked {handle} from {} shader(s)", handles.len());
        Ok(handle)
    }

    /// Rebuilds the program from its sources in the shadow and swaps it in
    /// on full success.
    ///
    /// Returns `Ok(true)` when the live program was replaced, `Ok(false)`
    /// when nothing changed. On error the live program is left untouched.
    pub fn reload(&mut self, compiler: &mut ShaderCompiler) -> Result<bool> {
        // Judged on the live objects: without LOOKUP_CACHE the shadow build
        // below always produces fresh ones.
        if self.is_linked() && !self.outdated && self.all_uptodate() {
            return Ok(false);
        }

        let flags = compiler.flags() | CompileFlags::CHECK_OUTDATED;

        let mut next = ShaderProgram::new();
        next.attributes.clone_from(&self.attributes);

        for shader in &self.shaders {
            if let Err(err) = next.add_source_with(compiler, shader.source().clone(), flags) {
                log::warn!("Reload of {} failed, keeping live program: {err}", shader.key());
                drop(next);
                compiler.collect_garbage();
                return Err(err);
            }
        }

        if self.is_linked() && !self.outdated && self.same_shaders(&next) {
            return Ok(false);
        }

        if let Err(err) = next.link(compiler) {
            log::warn!("Relink failed, keeping live program: {err}");
            drop(next);
            compiler.collect_garbage();
            return Err(err);
        }

        let previous = std::mem::replace(&mut self.handle, next.handle.take());
        self.shaders = std::mem::take(&mut next.shaders);
        self.outdated = false;

        if let Some(old) = previous {
            compiler.delete_program(old);
        }
        compiler.collect_garbage();

        log::info!(
            "Reloaded shader program {}",
            self.handle.map_or_else(String::new, |h| h.to_string())
        );
        Ok(true)
    }

    /// Deletes the program handle and drops every attached object.
    pub fn release(&mut self, compiler: &mut ShaderCompiler) {
        if let Some(handle) = self.handle.take() {
            compiler.delete_program(handle);
        }
        self.shaders.clear();
        self.outdated = false;
        compiler.collect_garbage();
    }

    fn all_uptodate(&self) -> bool {
        self.shaders
            .iter()
            .all(|shader| shader.needs_reload() == ReloadState::Uptodate)
    }

    fn same_shaders(&self, other: &ShaderProgram) -> bool {
        self.shaders.len() == other.shaders.len()
            && self.shaders.iter().all(|shader| {
                other
                    .shader(shader.key().as_str())
                    .is_some_and(|candidate| Rc::ptr_eq(shader, candidate))
            })
    }
}
