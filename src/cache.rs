//! Shader Object Cache
//!
//! [`ShaderCache`] maps [`SourceKey`]s to *weak* references of live
//! [`ShaderObject`]s, so independent programs that need the same file share
//! one compiled object without the cache keeping anything alive.
//!
//! # Invariants
//!
//! - Every entry either upgrades to a live object whose back-link points at
//!   this cache, or has already been removed. Objects remove their own entry
//!   when dropped; the cache never sweeps.
//! - An object is linked to at most one cache at a time.
//! - Registering a different object under a live key replaces the entry and
//!   unlinks the displaced object.
//!
//! The cache uses `Rc`/`RefCell` bookkeeping and is not thread-safe.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::object::ShaderObject;
use crate::source::SourceKey;

#[derive(Debug, Default)]
pub struct ShaderCache {
    entries: RefCell<FxHashMap<SourceKey, Weak<ShaderObject>>>,
}

impl ShaderCache {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Returns a strong reference to the live object registered under `key`.
    pub fn lookup<Q>(&self, key: &Q) -> Option<Rc<ShaderObject>>
    where
        SourceKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.borrow_mut();
        match entries.get(key).map(Weak::upgrade) {
            Some(Some(object)) => Some(object),
            Some(None) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Registers `object` under its key and links it to this cache.
    ///
    /// No-op when the object is already linked here. An object linked to a
    /// different cache is moved.
    pub fn put(self: &Rc<Self>, object: &Rc<ShaderObject>) {
        if object.is_cached_in(self) {
            return;
        }
        if let Some(previous) = object.cache() {
            previous.remove(object);
        }

        let displaced = self
            .entries
            .borrow_mut()
            .insert(object.key().clone(), Rc::downgrade(object))
            .and_then(|weak| weak.upgrade());

        if let Some(displaced) = displaced {
            log::debug!(
                "Cache entry {} replaced ({} -> {})",
                object.key(),
                displaced.handle(),
                object.handle()
            );
            displaced.unlink_cache();
        }

        object.link_cache(self);
    }

    /// Removes the entry for `object` if it still points at this exact object,
    /// and unlinks it. Returns whether an entry was removed.
    pub fn remove(&self, object: &ShaderObject) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let is_current = entries
                .get(object.key())
                .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), object));
            if is_current {
                entries.remove(object.key());
            }
            is_current
        };

        if removed && std::ptr::eq(object.cache_ptr(), self) {
            object.unlink_cache();
        }
        removed
    }

    #[must_use]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        SourceKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.borrow().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Keys of all entries, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<SourceKey> {
        let mut keys: Vec<_> = self.entries.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }
}
