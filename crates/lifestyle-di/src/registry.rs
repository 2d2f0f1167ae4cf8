//! Service registry
//!
//! Maps service key names to their registration: the implementation factory,
//! the lifetime policy and the fixed construction parameters. The registry is
//! a plain map; [`DIContainer`](crate::DIContainer) wraps it in a lock.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DIError, DIResult};
use crate::key::ServiceKey;
use crate::params::ConstructionParams;
use crate::ServiceLifetime;

/// Type-erased instance. Holds an `Arc<T>` so that unsized `T` (trait
/// objects) survive the trip through `dyn Any`.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn(&ConstructionParams) -> anyhow::Result<Instance> + Send + Sync>;

/// Registration record for one service key
pub struct Registration {
    key: &'static str,
    lifetime: ServiceLifetime,
    params: ConstructionParams,
    factory: Factory,
    type_id: TypeId,
    type_name: &'static str,
    generation: u64,
}

impl Registration {
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub fn params(&self) -> &ConstructionParams {
        &self.params
    }

    /// Name of the type resolutions of this key hand back
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Registry-wide counter value at registration time. A later
    /// registration of the same key always carries a larger generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn produces<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<Arc<T>>()
    }

    /// Run the factory with the stored parameters
    pub(crate) fn construct(&self) -> DIResult<Instance> {
        debug!(
            service = self.key,
            lifetime = %self.lifetime,
            "Constructing service instance"
        );
        (self.factory)(&self.params).map_err(|source| DIError::Construction {
            service: self.key.to_string(),
            source,
        })
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("params", &self.params)
            .field("type_name", &self.type_name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Map from service key to registration. At most one registration per key;
/// registering again overwrites.
#[derive(Default)]
pub struct ServiceRegistry {
    registrations: HashMap<&'static str, Arc<Registration>>,
    next_generation: u64,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the registration for `key`, returning the one it replaced
    pub fn register<T, F>(
        &mut self,
        key: ServiceKey<T>,
        lifetime: ServiceLifetime,
        params: ConstructionParams,
        factory: F,
    ) -> Option<Arc<Registration>>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.next_generation += 1;

        let factory: Factory = Arc::new(move |params: &ConstructionParams| {
            let instance = factory(params)?;
            Ok(Arc::new(instance) as Instance)
        });

        let registration = Registration {
            key: key.name(),
            lifetime,
            params,
            factory,
            type_id: TypeId::of::<Arc<T>>(),
            type_name: std::any::type_name::<T>(),
            generation: self.next_generation,
        };

        let previous = self
            .registrations
            .insert(key.name(), Arc::new(registration));

        match &previous {
            Some(old) => debug!(
                service = key.name(),
                %lifetime,
                previous_lifetime = %old.lifetime,
                "Overwrote service registration"
            ),
            None => debug!(service = key.name(), %lifetime, "Registered service"),
        }

        previous
    }

    /// Find the registration for a key name
    pub fn lookup(&self, key: &str) -> DIResult<Arc<Registration>> {
        self.registrations
            .get(key)
            .cloned()
            .ok_or_else(|| DIError::not_registered(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.registrations.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registered key names in sorted order
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.registrations.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
