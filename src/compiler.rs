//! Shader Compiler
//!
//! [`ShaderCompiler`] is the context every compilation runs against. It owns
//!
//! - the [`ShaderBackend`] that turns text into handles,
//! - the [`ShaderSettings`] (include paths, global defines, `#version`),
//! - the global [`ShaderCache`] shared by all programs,
//! - the [`ReleaseQueue`] of handles whose objects have been dropped.
//!
//! ```rust,ignore
//! let mut compiler = ShaderCompiler::new(backend, ShaderSettings::default());
//! compiler.add_include_path("assets/shaders");
//!
//! let source = compiler.file_source("lit.frag", None)?;
//! let compiled = compiler.compile(source, CompileFlags::CACHED)?;
//! ```

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::{AttributeBinding, ProgramHandle, ReleaseQueue, ShaderBackend, ShaderHandle};
use crate::cache::ShaderCache;
use crate::compile_state::{CompileState, CompiledShaders};
use crate::defines::ShaderDefines;
use crate::errors::{Result, ShaderError};
use crate::preprocessor::include::resolve_in_paths;
use crate::settings::{CompileFlags, ShaderSettings};
use crate::source::{ShaderSource, ShaderStage};

pub struct ShaderCompiler {
    backend: Box<dyn ShaderBackend>,
    settings: ShaderSettings,
    cache: Rc<ShaderCache>,
    released: Rc<ReleaseQueue>,
}

impl ShaderCompiler {
    pub fn new(backend: impl ShaderBackend + 'static, settings: ShaderSettings) -> Self {
        Self::with_boxed_backend(Box::new(backend), settings)
    }

    #[must_use]
    pub fn with_boxed_backend(backend: Box<dyn ShaderBackend>, settings: ShaderSettings) -> Self {
        Self {
            backend,
            settings,
            cache: ShaderCache::new(),
            released: Rc::new(ReleaseQueue::new()),
        }
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &ShaderSettings {
        &self.settings
    }

    /// Default flags derived from the settings' cache policy.
    #[must_use]
    pub fn flags(&self) -> CompileFlags {
        self.settings.flags()
    }

    #[must_use]
    pub fn include_paths(&self) -> &[PathBuf] {
        &self.settings.include_paths
    }

    /// Appends a directory to the include-path list.
    pub fn add_include_path(&mut self, dir: impl Into<PathBuf>) {
        self.settings.include_paths.push(dir.into());
    }

    /// Inserts a directory at the front of the include-path list.
    pub fn prepend_include_path(&mut self, dir: impl Into<PathBuf>) {
        self.settings.include_paths.insert(0, dir.into());
    }

    /// Removes every occurrence of `dir`. Returns whether anything was removed.
    pub fn remove_include_path(&mut self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        let before = self.settings.include_paths.len();
        self.settings.include_paths.retain(|path| path != dir);
        before != self.settings.include_paths.len()
    }

    #[must_use]
    pub fn defines(&self) -> &ShaderDefines {
        &self.settings.defines
    }

    pub fn set_define(&mut self, name: &str, value: &str) {
        self.settings.defines.set(name, value);
    }

    pub fn remove_define(&mut self, name: &str) -> bool {
        self.settings.defines.remove(name)
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.settings.version.as_deref()
    }

    pub fn set_version(&mut self, version: Option<String>) {
        self.settings.version = version;
    }

    // ─── Resources ───────────────────────────────────────────────────────────

    /// The global cache.
    #[must_use]
    pub fn cache(&self) -> &Rc<ShaderCache> {
        &self.cache
    }

    pub fn backend_mut(&mut self) -> &mut dyn ShaderBackend {
        self.backend.as_mut()
    }

    pub(crate) fn release_queue(&self) -> Rc<ReleaseQueue> {
        Rc::clone(&self.released)
    }

    /// Number of dropped shader handles not yet deleted.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.released.len()
    }

    /// Deletes the handles of every dropped object. Returns how many.
    pub fn collect_garbage(&mut self) -> usize {
        let freed = self.released.flush(self.backend.as_mut());
        if freed > 0 {
            log::debug!("Released {freed} shader handle(s)");
        }
        freed
    }

    // ─── Compilation ─────────────────────────────────────────────────────────

    /// Finds `name` in the include paths.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        resolve_in_paths(name, self.include_paths())
            .ok_or_else(|| ShaderError::FileNotInPath(name.to_owned()))
    }

    /// A file source for `name`, resolved against the include paths.
    pub fn file_source(&self, name: &str, stage: Option<ShaderStage>) -> Result<ShaderSource> {
        Ok(ShaderSource::file(self.resolve(name)?, stage))
    }

    /// Compiles `root` and its dependencies against the global cache.
    pub fn compile(&mut self, root: ShaderSource, flags: CompileFlags) -> Result<CompiledShaders> {
        let cache = Rc::clone(&self.cache);
        self.compile_in(root, flags, &cache)
    }

    /// Compiles `root` and its dependencies against a caller-provided cache.
    pub fn compile_in(
        &mut self,
        root: ShaderSource,
        flags: CompileFlags,
        cache: &Rc<ShaderCache>,
    ) -> Result<CompiledShaders> {
        let result = {
            let mut state = CompileState::new(self, Rc::clone(cache), flags);
            match state.compile_all(root) {
                Ok(object) => Ok(state.finish(object)),
                Err(err) => Err(err),
            }
        };
        self.collect_garbage();
        result
    }

    /// Links the given stages through the backend.
    pub fn link(
        &mut self,
        shaders: &[ShaderHandle],
        attributes: &[AttributeBinding],
    ) -> Result<ProgramHandle> {
        if shaders.is_empty() {
            return Err(ShaderError::LinkageFailed("no shaders attached".into()));
        }
        self.backend.link_program(shaders, attributes)
    }

    pub fn delete_program(&mut self, handle: ProgramHandle) {
        self.backend.delete_program(handle);
    }
}
