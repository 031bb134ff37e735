//! Compiled Shader Objects
//!
//! A [`ShaderObject`] is the immutable result of loading one
//! [`ShaderSource`]: the backend handle plus everything needed to decide
//! whether it must be rebuilt.
//!
//! - `includes` lists every file spliced in via `#include`, with the
//!   modification time observed when it was read. Only used for staleness.
//! - `dependencies` lists the sources named by `#need`. The compile state
//!   builds them alongside this object.
//!
//! Objects are shared through `Rc`. A [`ShaderCache`] may index an object
//! weakly; the object keeps a weak back-link to that cache and removes its own
//! entry when the last strong owner drops it.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::SystemTime;

use crate::backend::{ReleaseQueue, ShaderHandle};
use crate::cache::ShaderCache;
use crate::source::{modified_time, ShaderSource, ShaderStage, SourceKey, SourceKind};

/// A file spliced in via `#include` and the mtime it had when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    pub path: PathBuf,
    pub mtime: SystemTime,
}

/// Staleness verdict of a compiled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// Backing files unchanged.
    Uptodate,
    /// Something changed; rebuild from the source.
    Outdated,
    /// A backing file could not be stat'ed.
    Failed,
}

pub struct ShaderObject {
    handle: ShaderHandle,
    stage: ShaderStage,
    source: ShaderSource,
    mtime: Option<SystemTime>,
    includes: Vec<IncludedFile>,
    dependencies: Vec<ShaderSource>,
    cache: RefCell<Weak<ShaderCache>>,
    release: Rc<ReleaseQueue>,
}

impl ShaderObject {
    pub(crate) fn new(
        handle: ShaderHandle,
        stage: ShaderStage,
        source: ShaderSource,
        mtime: Option<SystemTime>,
        includes: Vec<IncludedFile>,
        dependencies: Vec<ShaderSource>,
        release: Rc<ReleaseQueue>,
    ) -> Rc<Self> {
        Rc::new(Self {
            handle,
            stage,
            source,
            mtime,
            includes,
            dependencies,
            cache: RefCell::new(Weak::new()),
            release,
        })
    }

    #[inline]
    #[must_use]
    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &ShaderSource {
        &self.source
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &SourceKey {
        self.source.key()
    }

    /// Modification time of the source file at load time (`None` for inline).
    #[must_use]
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    #[must_use]
    pub fn includes(&self) -> &[IncludedFile] {
        &self.includes
    }

    #[must_use]
    pub fn dependencies(&self) -> &[ShaderSource] {
        &self.dependencies
    }

    /// The cache this object is registered in, if it is still alive.
    #[must_use]
    pub fn cache(&self) -> Option<Rc<ShaderCache>> {
        self.cache.borrow().upgrade()
    }

    #[must_use]
    pub fn is_cached_in(&self, cache: &Rc<ShaderCache>) -> bool {
        std::ptr::eq(self.cache.borrow().as_ptr(), Rc::as_ptr(cache))
    }

    pub(crate) fn cache_ptr(&self) -> *const ShaderCache {
        self.cache.borrow().as_ptr()
    }

    pub(crate) fn link_cache(&self, cache: &Rc<ShaderCache>) {
        *self.cache.borrow_mut() = Rc::downgrade(cache);
    }

    pub(crate) fn unlink_cache(&self) {
        *self.cache.borrow_mut() = Weak::new();
    }

    /// Compares the recorded modification times against the filesystem.
    ///
    /// The source file is checked first; includes are only checked when it
    /// is unchanged.
    #[must_use]
    pub fn needs_reload(&self) -> ReloadState {
        if let SourceKind::File { path } = self.source.kind() {
            match modified_time(path) {
                Err(err) => {
                    log::warn!("Cannot stat {}: {err}", path.display());
                    return ReloadState::Failed;
                }
                Ok(mtime) if Some(mtime) != self.mtime => {
                    log::debug!("{} changed on disk", path.display());
                    return ReloadState::Outdated;
                }
                Ok(_) => {}
            }
        }

        for include in &self.includes {
            match modified_time(&include.path) {
                Err(err) => {
                    log::warn!("Cannot stat include {}: {err}", include.path.display());
                    return ReloadState::Failed;
                }
                Ok(mtime) if mtime != include.mtime => {
                    log::debug!(
                        "{} changed on disk (included by {})",
                        include.path.display(),
                        self.key()
                    );
                    return ReloadState::Outdated;
                }
                Ok(_) => {}
            }
        }

        ReloadState::Uptodate
    }
}

impl fmt::Debug for ShaderObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderObject")
            .field("key", self.key())
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .field("includes", &self.includes.len())
            .field("dependencies", &self.dependencies.len())
            .field("cached", &(self.cache.borrow().strong_count() > 0))
            .finish()
    }
}

impl Drop for ShaderObject {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.get_mut().upgrade() {
            cache.remove(self);
        }
        self.release.push(self.handle);
    }
}
