//! Dependency Graph Builder
//!
//! [`CompileState`] compiles a root source and everything it transitively
//! `#need`s, breadth-first, into one `{key → ShaderObject}` table.
//!
//! # Algorithm
//!
//! 1. The root is queued.
//! 2. Each popped source whose key is already compiled in this pass is skipped.
//! 3. With [`CompileFlags::LOOKUP_CACHE`] the cache is consulted; a hit is
//!    re-validated via [`CompileState::reload`] when
//!    [`CompileFlags::CHECK_OUTDATED`] is set.
//! 4. Otherwise the source is loaded (preprocessed and compiled).
//! 5. Successes are recorded (and registered in the cache with
//!    [`CompileFlags::PUT_CACHE`]); their dependencies are queued once.
//!    Failures record the first error and the queue keeps draining so every
//!    broken file is reported in one pass.
//!
//! Discovery order is deterministic for a fixed set of directives.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{ReleaseQueue, ShaderHandle};
use crate::cache::ShaderCache;
use crate::compiler::ShaderCompiler;
use crate::errors::{Result, ShaderError};
use crate::object::{ReloadState, ShaderObject};
use crate::preprocessor::Preprocessor;
use crate::settings::CompileFlags;
use crate::source::{ShaderSource, ShaderStage, SourceKey};

/// Result of one successful [`CompileState::compile_all`].
#[derive(Debug, Clone)]
pub struct CompiledShaders {
    /// The object built for the requested root.
    pub root: Rc<ShaderObject>,
    /// All objects of the pass in discovery order, root first.
    pub objects: Vec<Rc<ShaderObject>>,
    /// How many objects were freshly built rather than reused.
    pub rebuilt: usize,
}

impl CompiledShaders {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Rc<ShaderObject>> {
        self.objects.iter().find(|object| object.key().as_str() == key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&SourceKey> {
        self.objects.iter().map(|object| object.key()).collect()
    }
}

/// Transient state of one compile invocation.
pub struct CompileState<'a> {
    compiler: &'a mut ShaderCompiler,
    cache: Rc<ShaderCache>,
    flags: CompileFlags,
    objects: Vec<Rc<ShaderObject>>,
    index: FxHashMap<SourceKey, usize>,
    queue: VecDeque<ShaderSource>,
    queued: FxHashSet<SourceKey>,
    error: Option<ShaderError>,
    failed: Vec<SourceKey>,
    rebuilt: usize,
}

impl<'a> CompileState<'a> {
    pub fn new(compiler: &'a mut ShaderCompiler, cache: Rc<ShaderCache>, flags: CompileFlags) -> Self {
        Self {
            compiler,
            cache,
            flags,
            objects: Vec::new(),
            index: FxHashMap::default(),
            queue: VecDeque::new(),
            queued: FxHashSet::default(),
            error: None,
            failed: Vec::new(),
            rebuilt: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> CompileFlags {
        self.flags
    }

    #[must_use]
    pub fn cache(&self) -> &Rc<ShaderCache> {
        &self.cache
    }

    /// Objects compiled so far in this pass, in discovery order.
    #[must_use]
    pub fn compiled(&self) -> &[Rc<ShaderObject>] {
        &self.objects
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Rc<ShaderObject>> {
        self.index.get(key).map(|&i| &self.objects[i])
    }

    /// Keys of every source that failed in this pass.
    #[must_use]
    pub fn failed(&self) -> &[SourceKey] {
        &self.failed
    }

    /// Number of objects freshly loaded (not reused from the cache).
    #[must_use]
    pub fn rebuilt(&self) -> usize {
        self.rebuilt
    }

    /// Records `error` unless an earlier one is already recorded.
    pub fn push_error(&mut self, error: ShaderError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn enqueue(&mut self, source: ShaderSource) {
        if self.queued.insert(source.key().clone()) {
            self.queue.push_back(source);
        }
    }

    /// Compiles `root` and all of its dependencies.
    ///
    /// Returns the root object, or the first error encountered anywhere in
    /// the graph.
    pub fn compile_all(&mut self, root: ShaderSource) -> Result<Rc<ShaderObject>> {
        let root_key = root.key().clone();
        self.enqueue(root);

        while let Some(source) = self.queue.pop_front() {
            if self.index.contains_key(source.key()) {
                continue;
            }

            match self.build(&source) {
                Ok(object) => {
                    for dependency in object.dependencies() {
                        self.enqueue(dependency.clone());
                    }
                    if self.flags.contains(CompileFlags::PUT_CACHE) {
                        self.cache.put(&object);
                    }
                    self.index.insert(source.key().clone(), self.objects.len());
                    self.objects.push(object);
                }
                Err(err) => {
                    log::error!("{}: {err}", source.name());
                    self.failed.push(source.key().clone());
                    self.push_error(err);
                }
            }
        }

        if let Some(err) = self.error.take() {
            return Err(err);
        }

        self.get(root_key.as_str())
            .cloned()
            .ok_or_else(|| ShaderError::SourceUnavailable(root_key.to_string()))
    }

    fn build(&mut self, source: &ShaderSource) -> Result<Rc<ShaderObject>> {
        if self.flags.contains(CompileFlags::LOOKUP_CACHE) {
            if let Some(cached) = self.cache.lookup(source.key()) {
                log::debug!("Cache hit: {}", source.key());
                if self.flags.contains(CompileFlags::CHECK_OUTDATED) {
                    return self.reload(&cached);
                }
                return Ok(cached);
            }
            log::debug!("Cache miss: {}", source.key());
        }
        self.load(source)
    }

    /// Returns `object` when it is up to date, or a freshly built replacement
    /// when any of its files changed. The old object is left untouched.
    pub fn reload(&mut self, object: &Rc<ShaderObject>) -> Result<Rc<ShaderObject>> {
        match object.needs_reload() {
            ReloadState::Uptodate => Ok(Rc::clone(object)),
            ReloadState::Outdated => {
                log::info!("Rebuilding outdated shader {}", object.key());
                self.load(object.source())
            }
            ReloadState::Failed => Err(ShaderError::SourceUnavailable(object.key().to_string())),
        }
    }

    fn load(&mut self, source: &ShaderSource) -> Result<Rc<ShaderObject>> {
        let object = source.load(self)?;
        self.rebuilt += 1;
        Ok(object)
    }

    /// Consumes the state after a successful [`compile_all`](Self::compile_all).
    #[must_use]
    pub fn finish(self, root: Rc<ShaderObject>) -> CompiledShaders {
        CompiledShaders {
            root,
            objects: self.objects,
            rebuilt: self.rebuilt,
        }
    }

    pub(crate) fn include_paths(&self) -> &[PathBuf] {
        self.compiler.include_paths()
    }

    /// Appends the `#version` line and the global `#define`s.
    pub(crate) fn inject_prelude(&self, pp: &mut Preprocessor) {
        if let Some(version) = self.compiler.version() {
            pp.inject("<version>", format!("#version {version}\n"));
        }
        let defines = self.compiler.defines();
        if !defines.is_empty() {
            pp.inject("<defines>", defines.to_source());
        }
    }

    pub(crate) fn compile_stage(
        &mut self,
        stage: ShaderStage,
        name: &str,
        segments: &[&str],
    ) -> Result<ShaderHandle> {
        self.compiler.backend_mut().compile_stage(stage, name, segments)
    }

    pub(crate) fn release_queue(&self) -> Rc<ReleaseQueue> {
        self.compiler.release_queue()
    }
}
