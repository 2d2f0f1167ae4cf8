//! Builder pattern for configuring the DI container

use std::sync::Arc;

use crate::{
    ConstructionParams, DIContainer, DIResult, ImplementationCatalog, ServiceKey,
    ServiceLifetime, ServiceProvider, ServiceProviderRegistry, WiringProfile,
};

/// Fluent configuration-time wiring.
///
/// Plain registrations are applied immediately; providers are collected and
/// run in priority order by [`build`](Self::build).
pub struct DIContainerBuilder {
    container: DIContainer,
    providers: ServiceProviderRegistry,
}

impl DIContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            container: DIContainer::new(),
            providers: ServiceProviderRegistry::new(),
        }
    }

    pub fn register<T, F>(self, key: ServiceKey<T>, lifetime: ServiceLifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.container.register(key, lifetime, factory);
        self
    }

    pub fn register_with_params<T, F>(
        self,
        key: ServiceKey<T>,
        lifetime: ServiceLifetime,
        params: ConstructionParams,
        factory: F,
    ) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.container
            .register_with_params(key, lifetime, params, factory);
        self
    }

    pub fn singleton<T, F>(self, key: ServiceKey<T>, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(key, ServiceLifetime::Singleton, factory)
    }

    pub fn scoped<T, F>(self, key: ServiceKey<T>, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(key, ServiceLifetime::Scoped, factory)
    }

    pub fn per_request<T, F>(self, key: ServiceKey<T>, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        self.register(key, ServiceLifetime::PerRequest, factory)
    }

    /// Add a provider to run when the container is built
    pub fn provider<P: ServiceProvider + 'static>(mut self, provider: P) -> Self {
        self.providers.add(provider);
        self
    }

    /// Apply a wiring profile immediately
    pub fn profile(self, profile: &WiringProfile, catalog: &ImplementationCatalog) -> DIResult<Self> {
        profile.apply(&self.container, catalog)?;
        Ok(self)
    }

    /// Run the collected providers and return the container
    pub fn build(self) -> DIResult<DIContainer> {
        if !self.providers.is_empty() {
            self.providers.register_all(&self.container)?;
        }
        Ok(self.container)
    }
}

impl Default for DIContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
