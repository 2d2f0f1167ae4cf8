//! Service container
//!
//! Resolves service keys according to the lifetime of their registration:
//!
//! - **Singleton**: one instance per container, created on first resolution
//! - **Scoped**: one instance per open scope, dropped when the scope closes
//! - **PerRequest**: a new instance on every resolution, never cached
//!
//! Scope stacks are kept per thread. The singleton cache is shared and
//! constructs each key at most once, also under concurrent first use.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{DIError, DIResult};
use crate::key::ServiceKey;
use crate::params::ConstructionParams;
use crate::registry::{Instance, Registration, ServiceRegistry};
use crate::scope::{ScopeGuard, ScopeId, ScopeStack};
use crate::ServiceLifetime;

/// Lazily filled singleton cache entry for one registration generation
struct SingletonSlot {
    generation: u64,
    cell: OnceCell<Instance>,
}

impl SingletonSlot {
    fn new(generation: u64) -> Arc<Self> {
        Arc::new(Self {
            generation,
            cell: OnceCell::new(),
        })
    }
}

/// The dependency injection container
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use lifestyle_di::{DIContainer, ServiceKey};
///
/// trait Notifier: Send + Sync {
///     fn send(&self, to: &str) -> String;
/// }
///
/// struct MockNotifier;
///
/// impl Notifier for MockNotifier {
///     fn send(&self, to: &str) -> String {
///         format!("Mock email to {}", to)
///     }
/// }
///
/// const NOTIFIER: ServiceKey<dyn Notifier> = ServiceKey::new("notifier");
///
/// let container = DIContainer::new();
/// container.register_scoped(NOTIFIER, |_| Ok(Arc::new(MockNotifier) as Arc<dyn Notifier>));
///
/// let scope = container.enter_scope();
/// let first = container.resolve(NOTIFIER).unwrap();
/// let second = container.resolve(NOTIFIER).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// drop(scope);
///
/// assert!(container.resolve(NOTIFIER).is_err());
/// ```
pub struct DIContainer {
    registry: RwLock<ServiceRegistry>,
    singletons: RwLock<HashMap<&'static str, Arc<SingletonSlot>>>,
    scopes: DashMap<ThreadId, ScopeStack>,
}

impl DIContainer {
    /// Create a new empty DI container
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(ServiceRegistry::new()),
            singletons: RwLock::new(HashMap::new()),
            scopes: DashMap::new(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a factory under `key` with the given lifetime and no
    /// construction parameters. Overwrites any previous registration.
    pub fn register<T, F>(&self, key: ServiceKey<T>, lifetime: ServiceLifetime, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register_with_params(key, lifetime, ConstructionParams::new(), factory);
    }

    /// Register a factory together with the parameters it is called with
    pub fn register_with_params<T, F>(
        &self,
        key: ServiceKey<T>,
        lifetime: ServiceLifetime,
        params: ConstructionParams,
        factory: F,
    ) where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let previous = self
            .registry
            .write()
            .register(key, lifetime, params, factory);

        if previous.is_some() {
            // Scoped entries are invalidated lazily by generation.
            if self.singletons.write().remove(key.name()).is_some() {
                debug!(service = key.name(), "Discarded cached singleton of replaced registration");
            }
        }
    }

    pub fn register_singleton<T, F>(&self, key: ServiceKey<T>, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(key, ServiceLifetime::Singleton, factory);
    }

    pub fn register_scoped<T, F>(&self, key: ServiceKey<T>, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(key, ServiceLifetime::Scoped, factory);
    }

    pub fn register_per_request<T, F>(&self, key: ServiceKey<T>, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(key, ServiceLifetime::PerRequest, factory);
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a service instance
    ///
    /// # Errors
    /// - `NotRegistered` if nothing is registered under the key
    /// - `NoActiveScope` for a scoped service when no scope is open on this thread
    /// - `TypeMismatch` if the key's type differs from the registration's
    /// - `Construction` if the factory fails; nothing is cached in that case
    pub fn resolve<T>(&self, key: ServiceKey<T>) -> DIResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        loop {
            let registration = self.registry.read().lookup(key.name())?;

            if !registration.produces::<T>() {
                return Err(DIError::TypeMismatch {
                    service: key.name().to_string(),
                    expected: std::any::type_name::<T>(),
                });
            }

            let instance = match registration.lifetime() {
                ServiceLifetime::Singleton => match self.resolve_singleton(&registration)? {
                    Some(instance) => instance,
                    // Re-registered while we were resolving; look it up again.
                    None => continue,
                },
                ServiceLifetime::Scoped => self.resolve_scoped(&registration)?,
                ServiceLifetime::PerRequest => registration.construct()?,
            };

            return downcast(key, &instance);
        }
    }

    fn resolve_singleton(&self, registration: &Registration) -> DIResult<Option<Instance>> {
        let slot = self.singleton_slot(registration);
        if slot.generation != registration.generation() {
            return Ok(None);
        }

        if let Some(instance) = slot.cell.get() {
            trace!(service = registration.key(), "Singleton cache hit");
            return Ok(Some(instance.clone()));
        }

        slot.cell
            .get_or_try_init(|| registration.construct())
            .map(|instance| Some(instance.clone()))
    }

    fn singleton_slot(&self, registration: &Registration) -> Arc<SingletonSlot> {
        let key = registration.key();
        let generation = registration.generation();

        if let Some(slot) = self.singletons.read().get(key) {
            if slot.generation >= generation {
                return Arc::clone(slot);
            }
        }

        let mut singletons = self.singletons.write();
        let slot = singletons
            .entry(key)
            .or_insert_with(|| SingletonSlot::new(generation));
        if slot.generation < generation {
            *slot = SingletonSlot::new(generation);
        }
        Arc::clone(slot)
    }

    fn resolve_scoped(&self, registration: &Registration) -> DIResult<Instance> {
        let key = registration.key();
        let generation = registration.generation();
        let thread = thread::current().id();

        let scope_id = {
            let stack = self.scopes.get(&thread);
            let frame = stack
                .as_deref()
                .and_then(ScopeStack::current_frame)
                .ok_or_else(|| DIError::no_active_scope(key))?;

            if let Some(instance) = frame.get(key, generation) {
                trace!(service = key, scope = %frame.id(), "Scoped cache hit");
                return Ok(instance);
            }
            frame.id()
        };

        // The factory runs without the scope map locked.
        let instance = registration.construct()?;

        let mut stack = self
            .scopes
            .get_mut(&thread)
            .ok_or_else(|| DIError::no_active_scope(key))?;
        let frame = stack
            .frame_mut(scope_id)
            .ok_or_else(|| DIError::no_active_scope(key))?;
        Ok(frame.get_or_insert(key, generation, instance))
    }

    // ========================================================================
    // Scope Management
    // ========================================================================

    /// Open a scope on the current thread.
    ///
    /// Scoped services resolved on this thread while the returned guard is
    /// alive are cached in the new scope. Dropping the guard closes it.
    pub fn enter_scope(&self) -> ScopeGuard<'_> {
        let id = self
            .scopes
            .entry(thread::current().id())
            .or_default()
            .enter_scope();
        debug!(scope = %id, depth = self.scope_depth(), "Opened scope");
        ScopeGuard::new(self, id)
    }

    /// Close the innermost scope on the current thread.
    ///
    /// Fails with `NoActiveScope` when no scope is open. A guard whose scope
    /// was closed this way does nothing when dropped.
    pub fn exit_scope(&self) -> DIResult<()> {
        let thread = thread::current().id();
        let frame = self
            .scopes
            .get_mut(&thread)
            .ok_or_else(|| DIError::no_active_scope("exit_scope"))?
            .exit_scope()?;
        self.scopes.remove_if(&thread, |_, stack| stack.is_empty());

        debug!(
            scope = %frame.id(),
            released = frame.instance_count(),
            "Closed scope"
        );
        // Scoped instances are dropped here, outside any lock.
        drop(frame);
        Ok(())
    }

    /// Run `f` inside a fresh scope that is closed on every exit path
    pub fn with_scope<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _scope = self.enter_scope();
        f(self)
    }

    pub(crate) fn release_scope(&self, id: ScopeId) {
        let thread = thread::current().id();
        let released = match self.scopes.get_mut(&thread) {
            Some(mut stack) => stack.exit_to(id),
            None => Vec::new(),
        };
        self.scopes.remove_if(&thread, |_, stack| stack.is_empty());

        if released.is_empty() {
            trace!(scope = %id, "Scope already closed");
        } else {
            debug!(
                scope = %id,
                released = released.iter().map(|f| f.instance_count()).sum::<usize>(),
                "Closed scope"
            );
        }
    }

    /// Number of scopes currently open on this thread
    pub fn scope_depth(&self) -> usize {
        self.scopes
            .get(&thread::current().id())
            .map_or(0, |stack| stack.depth())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Check if a service is registered
    pub fn is_registered<T: ?Sized>(&self, key: ServiceKey<T>) -> bool {
        self.registry.read().contains(key.name())
    }

    /// Lifetime of the current registration for `key`
    pub fn lifetime_of<T: ?Sized>(&self, key: ServiceKey<T>) -> Option<ServiceLifetime> {
        self.registry
            .read()
            .lookup(key.name())
            .ok()
            .map(|registration| registration.lifetime())
    }

    /// Get the number of registered services
    pub fn service_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Registered key names in sorted order
    pub fn registered_keys(&self) -> Vec<&'static str> {
        self.registry.read().keys()
    }

    /// Number of singletons constructed so far
    pub fn singleton_count(&self) -> usize {
        self.singletons
            .read()
            .values()
            .filter(|slot| slot.cell.get().is_some())
            .count()
    }
}

impl Default for DIContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DIContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DIContainer")
            .field("services", &self.registered_keys())
            .field("singletons", &self.singleton_count())
            .field("scope_depth", &self.scope_depth())
            .finish()
    }
}

fn downcast<T>(key: ServiceKey<T>, instance: &Instance) -> DIResult<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| DIError::TypeMismatch {
            service: key.name().to_string(),
            expected: std::any::type_name::<T>(),
        })
}
