//! Scope stack
//!
//! A scope is a bounded unit of work with its own cache of scoped-lifetime
//! instances. Scopes nest: entering pushes a frame, exiting pops it, and only
//! the topmost frame is consulted during resolution.
//!
//! [`ScopeStack`] is single-threaded bookkeeping. The container keeps one
//! stack per thread and hands out [`ScopeGuard`]s that pop their frame when
//! dropped.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::container::DIContainer;
use crate::error::{DIError, DIResult};
use crate::registry::Instance;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

struct ScopedEntry {
    generation: u64,
    instance: Instance,
}

/// One open scope and the scoped instances created inside it
pub struct ScopeFrame {
    id: ScopeId,
    instances: HashMap<&'static str, ScopedEntry>,
}

impl ScopeFrame {
    fn new() -> Self {
        Self {
            id: ScopeId::next(),
            instances: HashMap::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Number of scoped instances cached in this frame
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Cached instance for `key`, ignoring entries created under an older
    /// registration of the same key
    pub(crate) fn get(&self, key: &str, generation: u64) -> Option<Instance> {
        self.instances
            .get(key)
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.instance.clone())
    }

    /// Cache `instance` unless an entry for the same registration already
    /// exists; returns whichever instance ends up cached
    pub(crate) fn get_or_insert(
        &mut self,
        key: &'static str,
        generation: u64,
        instance: Instance,
    ) -> Instance {
        let entry = self
            .instances
            .entry(key)
            .or_insert_with(|| ScopedEntry {
                generation,
                instance: instance.clone(),
            });
        if entry.generation != generation {
            *entry = ScopedEntry {
                generation,
                instance,
            };
        }
        entry.instance.clone()
    }
}

impl fmt::Debug for ScopeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFrame")
            .field("id", &self.id)
            .field("instances", &self.instances.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// LIFO stack of scope frames for one logical execution context
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a fresh, empty frame
    pub fn enter_scope(&mut self) -> ScopeId {
        let frame = ScopeFrame::new();
        let id = frame.id;
        self.frames.push(frame);
        trace!(scope = %id, depth = self.frames.len(), "Entered scope");
        id
    }

    /// Pop the topmost frame, dropping its scoped instances
    pub fn exit_scope(&mut self) -> DIResult<ScopeFrame> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| DIError::no_active_scope("exit_scope"))?;
        trace!(
            scope = %frame.id,
            released = frame.instance_count(),
            "Exited scope"
        );
        Ok(frame)
    }

    /// Pop the frame `id` and every frame nested above it.
    ///
    /// Returns the popped frames, outermost first; empty when `id` is no
    /// longer on the stack.
    pub fn exit_to(&mut self, id: ScopeId) -> Vec<ScopeFrame> {
        match self.frames.iter().rposition(|frame| frame.id == id) {
            Some(index) => {
                let popped = self.frames.split_off(index);
                if popped.len() > 1 {
                    debug!(
                        scope = %id,
                        nested = popped.len() - 1,
                        "Closing scope with nested scopes still open"
                    );
                }
                popped
            }
            None => Vec::new(),
        }
    }

    pub fn current_frame(&self) -> Option<&ScopeFrame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut ScopeFrame> {
        self.frames.last_mut()
    }

    pub(crate) fn frame_mut(&mut self, id: ScopeId) -> Option<&mut ScopeFrame> {
        self.frames.iter_mut().rev().find(|frame| frame.id == id)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Handle for an open scope.
///
/// Dropping the guard closes the scope (and any scope nested inside it that
/// is still open), so the frame is released on every exit path including
/// `?` returns and panics. The guard is `!Send`: a scope belongs to the
/// thread that opened it.
#[must_use = "dropping the guard closes the scope immediately"]
pub struct ScopeGuard<'a> {
    container: &'a DIContainer,
    id: ScopeId,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ScopeGuard<'a> {
    pub(crate) fn new(container: &'a DIContainer, id: ScopeId) -> Self {
        Self {
            container,
            id,
            _not_send: PhantomData,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Close the scope now
    pub fn exit(self) {
        drop(self);
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.container.release_scope(self.id);
    }
}

impl fmt::Debug for ScopeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard").field("id", &self.id).finish()
    }
}
