//! Service Provider trait for grouped registration
//!
//! A `ServiceProvider` bundles the registrations for one environment or one
//! area of an application, e.g. a debug wiring that uses mocks and a release
//! wiring that uses real backends for the same keys.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use lifestyle_di::{DIContainer, DIResult, ServiceKey, ServiceProvider, ServiceProviderRegistry};
//!
//! pub trait Database: Send + Sync {}
//! struct MockDatabase;
//! impl Database for MockDatabase {}
//!
//! const DATABASE: ServiceKey<dyn Database> = ServiceKey::new("database");
//!
//! struct DebugWiring;
//!
//! impl ServiceProvider for DebugWiring {
//!     fn name(&self) -> &'static str {
//!         "debug"
//!     }
//!
//!     fn register(&self, container: &DIContainer) -> DIResult<()> {
//!         container.register_per_request(DATABASE, |_| Ok(Arc::new(MockDatabase) as Arc<dyn Database>));
//!         Ok(())
//!     }
//! }
//!
//! let container = DIContainer::new();
//! let mut registry = ServiceProviderRegistry::new();
//! registry.add(DebugWiring);
//! registry.register_all(&container).unwrap();
//! assert!(container.is_registered(DATABASE));
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::{DIContainer, DIResult};

// ============================================================================
// ServiceProvider Trait
// ============================================================================

/// Trait for types that can provide services to the DI container.
pub trait ServiceProvider: Send + Sync {
    /// Returns the name of this service provider.
    ///
    /// Used for logging and in validation errors.
    fn name(&self) -> &'static str;

    /// Returns the priority of this service provider.
    ///
    /// Lower values are registered first, so a provider with a higher value
    /// overwrites keys registered by one with a lower value. Default is 100.
    fn priority(&self) -> u32 {
        100
    }

    /// Register services with the container.
    fn register(&self, container: &DIContainer) -> DIResult<()>;

    /// Optional: Validate that required services are registered.
    ///
    /// Called after all providers have registered their services.
    #[allow(unused_variables)]
    fn validate(&self, container: &DIContainer) -> DIResult<()> {
        Ok(())
    }
}

impl<P: ServiceProvider + ?Sized> ServiceProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn priority(&self) -> u32 {
        (**self).priority()
    }

    fn register(&self, container: &DIContainer) -> DIResult<()> {
        (**self).register(container)
    }

    fn validate(&self, container: &DIContainer) -> DIResult<()> {
        (**self).validate(container)
    }
}

// ============================================================================
// ServiceProviderRegistry
// ============================================================================

/// Registry for managing service providers.
///
/// Collects providers and executes them in priority order.
#[derive(Default)]
pub struct ServiceProviderRegistry {
    providers: Vec<Arc<dyn ServiceProvider>>,
}

impl ServiceProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service provider to the registry.
    pub fn add<P: ServiceProvider + 'static>(&mut self, provider: P) -> &mut Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add a shared service provider to the registry.
    pub fn add_shared(&mut self, provider: Arc<dyn ServiceProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in the order they will be registered.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.sorted().iter().map(|p| p.name()).collect()
    }

    fn sorted(&self) -> Vec<&Arc<dyn ServiceProvider>> {
        // Stable sort keeps insertion order for equal priorities
        let mut sorted: Vec<_> = self.providers.iter().collect();
        sorted.sort_by_key(|p| p.priority());
        sorted
    }

    /// Register all providers with the container, then validate each one.
    pub fn register_all(&self, container: &DIContainer) -> DIResult<()> {
        let sorted = self.sorted();

        info!("Registering {} service providers", sorted.len());

        for provider in &sorted {
            debug!(
                "Registering provider '{}' (priority: {})",
                provider.name(),
                provider.priority()
            );
            provider.register(container)?;
        }

        for provider in &sorted {
            provider.validate(container)?;
        }

        info!(
            services = container.service_count(),
            "All service providers registered successfully"
        );
        Ok(())
    }
}
