//! Wiring profiles
//!
//! A profile selects, per service key, which implementation to register,
//! with which lifetime and which construction parameters. Profiles are
//! configuration documents, so switching an application between a debug
//! wiring (mocks) and a release wiring (real backends) needs no code change:
//!
//! ```toml
//! name = "release"
//!
//! [services.logging]
//! implementation = "file"
//! lifetime = "singleton"
//! params = { filename = "app.log" }
//!
//! [services.database]
//! implementation = "sql"
//! lifetime = "scoped"
//! params = { connection_string = "server=prod;db=app" }
//! ```
//!
//! Implementation names are mapped to typed factories by an
//! [`ImplementationCatalog`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DIError, DIResult};
use crate::key::ServiceKey;
use crate::params::ConstructionParams;
use crate::provider::ServiceProvider;
use crate::{DIContainer, ServiceLifetime};

/// Environment variable prefix for profile overrides, e.g.
/// `LIFESTYLE__SERVICES__DATABASE__LIFETIME=per_request`
pub const ENV_PREFIX: &str = "LIFESTYLE";

/// How one service key is wired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceWiring {
    /// Implementation name, looked up in the catalog
    pub implementation: String,
    #[serde(default)]
    pub lifetime: ServiceLifetime,
    #[serde(default)]
    pub params: ConstructionParams,
}

impl ServiceWiring {
    pub fn new(implementation: impl Into<String>, lifetime: ServiceLifetime) -> Self {
        Self {
            implementation: implementation.into(),
            lifetime,
            params: ConstructionParams::new(),
        }
    }

    pub fn with_params(mut self, params: ConstructionParams) -> Self {
        self.params = params;
        self
    }
}

/// A named set of service wirings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WiringProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceWiring>,
}

impl WiringProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            services: BTreeMap::new(),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>, wiring: ServiceWiring) -> Self {
        self.services.insert(service.into(), wiring);
        self
    }

    /// Load a profile file, with `LIFESTYLE__…` environment variables
    /// layered on top.
    ///
    /// Service and parameter names keep their case from the file. Override
    /// variables match them case-insensitively and their values are parsed,
    /// so `LIFESTYLE__SERVICES__SMTP__PARAMS__PORT=2525` yields a number.
    pub fn load(path: impl AsRef<Path>) -> DIResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            profile_error(format!("failed to read profile {}: {}", path.display(), e))
        })?;

        let mut document: serde_json::Value = toml::from_str(&content)
            .map_err(|e| profile_error(format!("invalid profile {}: {}", path.display(), e)))?;
        merge_overrides(&mut document, environment_overrides()?);

        let profile: WiringProfile = serde_json::from_value(document)
            .map_err(|e| profile_error(format!("invalid profile {}: {}", path.display(), e)))?;
        debug!(
            path = %path.display(),
            services = profile.services.len(),
            "Loaded wiring profile"
        );
        Ok(profile)
    }

    /// Parse a profile from TOML text
    pub fn from_toml_str(content: &str) -> DIResult<Self> {
        toml::from_str(content).map_err(|e| profile_error(format!("invalid profile: {}", e)))
    }

    /// Render the profile as TOML
    pub fn to_toml_string(&self) -> DIResult<String> {
        toml::to_string_pretty(self).map_err(profile_error)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    /// Register every wiring of this profile with `container`.
    ///
    /// All implementation names are checked against the catalog first; if
    /// any is unknown nothing is registered. Returns the number of services
    /// registered.
    pub fn apply(&self, container: &DIContainer, catalog: &ImplementationCatalog) -> DIResult<usize> {
        let bindings = self
            .services
            .iter()
            .map(|(service, wiring)| {
                catalog
                    .binder(service, &wiring.implementation)
                    .map(|binder| (service, wiring, binder))
                    .ok_or_else(|| DIError::UnknownImplementation {
                        service: service.clone(),
                        implementation: wiring.implementation.clone(),
                    })
            })
            .collect::<DIResult<Vec<_>>>()?;

        for (service, wiring, binder) in &bindings {
            debug!(
                profile = self.display_name(),
                service = service.as_str(),
                implementation = wiring.implementation.as_str(),
                lifetime = %wiring.lifetime,
                "Wiring service"
            );
            binder(container, wiring.lifetime, wiring.params.clone());
        }

        info!(
            profile = self.display_name(),
            services = bindings.len(),
            "Applied wiring profile"
        );
        Ok(bindings.len())
    }

    /// Turn the profile into a [`ServiceProvider`]
    pub fn into_provider(
        self,
        name: &'static str,
        catalog: Arc<ImplementationCatalog>,
    ) -> ProfileProvider {
        ProfileProvider {
            name,
            priority: 100,
            profile: self,
            catalog,
        }
    }
}

fn profile_error(message: impl fmt::Display) -> DIError {
    DIError::Profile(ConfigError::Message(message.to_string()))
}

/// `LIFESTYLE__…` variables as a nested document. The `config` environment
/// source lowercases keys, so they are merged case-insensitively.
fn environment_overrides() -> DIResult<serde_json::Value> {
    let config = Config::builder()
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(config.try_deserialize()?)
}

fn merge_overrides(target: &mut serde_json::Value, overrides: serde_json::Value) {
    match (target, overrides) {
        (serde_json::Value::Object(target), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                let existing = target
                    .keys()
                    .find(|name| name.eq_ignore_ascii_case(&key))
                    .cloned();
                match existing {
                    Some(name) => {
                        if let Some(slot) = target.get_mut(&name) {
                            merge_overrides(slot, value);
                        }
                    }
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, overrides) => *target = overrides,
    }
}

type Binder = Arc<dyn Fn(&DIContainer, ServiceLifetime, ConstructionParams) + Send + Sync>;

/// Maps `(service key, implementation name)` pairs to typed factories
#[derive(Clone, Default)]
pub struct ImplementationCatalog {
    binders: HashMap<&'static str, HashMap<String, Binder>>,
}

impl ImplementationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `implementation` available for `key`
    pub fn add<T, F>(
        &mut self,
        key: ServiceKey<T>,
        implementation: impl Into<String>,
        factory: F,
    ) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ConstructionParams) -> anyhow::Result<Arc<T>> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        let binder: Binder = Arc::new(
            move |container: &DIContainer, lifetime: ServiceLifetime, params: ConstructionParams| {
                let factory = Arc::clone(&factory);
                container.register_with_params(key, lifetime, params, move |p| (*factory)(p));
            },
        );

        self.binders
            .entry(key.name())
            .or_default()
            .insert(implementation.into(), binder);
        self
    }

    pub fn contains(&self, service: &str, implementation: &str) -> bool {
        self.binder(service, implementation).is_some()
    }

    /// Implementation names known for `service`, sorted
    pub fn implementations(&self, service: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .binders
            .get(service)
            .map(|impls| impls.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    fn binder(&self, service: &str, implementation: &str) -> Option<&Binder> {
        self.binders.get(service)?.get(implementation)
    }
}

impl fmt::Debug for ImplementationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<_> = self.binders.keys().collect();
        services.sort_unstable();
        f.debug_struct("ImplementationCatalog")
            .field("services", &services)
            .finish()
    }
}

/// A wiring profile run as a service provider
#[derive(Debug, Clone)]
pub struct ProfileProvider {
    name: &'static str,
    priority: u32,
    profile: WiringProfile,
    catalog: Arc<ImplementationCatalog>,
}

impl ProfileProvider {
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn profile(&self) -> &WiringProfile {
        &self.profile
    }
}

impl ServiceProvider for ProfileProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn register(&self, container: &DIContainer) -> DIResult<()> {
        self.profile.apply(container, &self.catalog).map(|_| ())
    }

    fn validate(&self, container: &DIContainer) -> DIResult<()> {
        let registered = container.registered_keys();
        match self
            .profile
            .services
            .keys()
            .find(|service| !registered.contains(&service.as_str()))
        {
            Some(missing) => Err(DIError::validation(
                self.name,
                format!("service '{}' is not registered", missing),
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    trait Logger: Send + Sync {
        fn log(&self, message: &str) -> String;
    }

    struct ConsoleLogger;

    impl Logger for ConsoleLogger {
        fn log(&self, message: &str) -> String {
            format!("[CONSOLE] {}", message)
        }
    }

    struct FileLogger {
        filename: String,
    }

    impl Logger for FileLogger {
        fn log(&self, message: &str) -> String {
            format!("[FILE {}] {}", self.filename, message)
        }
    }

    const LOGGING: ServiceKey<dyn Logger> = ServiceKey::new("logging");

    fn catalog() -> ImplementationCatalog {
        let mut catalog = ImplementationCatalog::new();
        catalog
            .add(LOGGING, "console", |_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>))
            .add(LOGGING, "file", |params| {
                let filename = params.require_str("filename")?.to_string();
                Ok(Arc::new(FileLogger { filename }) as Arc<dyn Logger>)
            });
        catalog
    }

    const RELEASE: &str = r#"
name = "release"

[services.logging]
implementation = "file"
lifetime = "scoped"
params = { filename = "app.log" }
"#;

    #[test]
    fn test_parse_profile() {
        let profile = WiringProfile::from_toml_str(RELEASE).unwrap();

        assert_eq!(profile.display_name(), "release");
        let logging = &profile.services["logging"];
        assert_eq!(logging.implementation, "file");
        assert_eq!(logging.lifetime, ServiceLifetime::Scoped);
        assert_eq!(logging.params.get_str("filename"), Some("app.log"));
    }

    #[test]
    fn test_lifetime_and_params_default() {
        let profile = WiringProfile::from_toml_str(
            r#"
[services.logging]
implementation = "console"
"#,
        )
        .unwrap();

        let logging = &profile.services["logging"];
        assert_eq!(logging.lifetime, ServiceLifetime::Singleton);
        assert!(logging.params.is_empty());
        assert_eq!(profile.display_name(), "unnamed");
    }

    #[test]
    fn test_apply_registers_services() {
        let profile = WiringProfile::from_toml_str(RELEASE).unwrap();
        let container = DIContainer::new();

        assert_eq!(profile.apply(&container, &catalog()).unwrap(), 1);
        assert_eq!(container.lifetime_of(LOGGING), Some(ServiceLifetime::Scoped));

        let logger = container.with_scope(|c| c.resolve(LOGGING)).unwrap();
        assert_eq!(logger.log("hi"), "[FILE app.log] hi");
    }

    #[test]
    fn test_unknown_implementation_registers_nothing() {
        let profile = WiringProfile::new("broken")
            .with_service("logging", ServiceWiring::new("console", ServiceLifetime::Singleton))
            .with_service("metrics", ServiceWiring::new("statsd", ServiceLifetime::Singleton));
        let container = DIContainer::new();

        let err = profile.apply(&container, &catalog()).unwrap_err();
        assert!(matches!(
            err,
            DIError::UnknownImplementation { ref service, ref implementation }
                if service == "metrics" && implementation == "statsd"
        ));
        assert_eq!(container.service_count(), 0);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(RELEASE.as_bytes()).unwrap();

        let profile = WiringProfile::load(file.path()).unwrap();
        assert_eq!(profile.services.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = WiringProfile::load("/nonexistent/lifestyle/profile.toml");
        assert!(matches!(result, Err(DIError::Profile(_))));
    }

    #[test]
    fn test_to_toml_string() {
        let profile = WiringProfile::new("debug").with_service(
            "logging",
            ServiceWiring::new("console", ServiceLifetime::PerRequest),
        );

        let rendered = profile.to_toml_string().unwrap();
        assert!(rendered.contains("implementation = \"console\""));
        assert!(rendered.contains("lifetime = \"per_request\""));
        assert_eq!(WiringProfile::from_toml_str(&rendered).unwrap(), profile);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = catalog();
        assert!(catalog.contains("logging", "file"));
        assert!(!catalog.contains("logging", "syslog"));
        assert_eq!(catalog.implementations("logging"), vec!["console", "file"]);
        assert!(catalog.implementations("database").is_empty());
    }

    #[test]
    fn test_profile_provider_validates() {
        let provider = WiringProfile::from_toml_str(RELEASE)
            .unwrap()
            .into_provider("release", Arc::new(catalog()));
        let container = DIContainer::new();

        assert!(provider.validate(&container).is_err());
        provider.register(&container).unwrap();
        assert!(provider.validate(&container).is_ok());
    }

    trait EmailService: Send + Sync {
        fn server(&self) -> String;
    }

    struct SmtpEmailService {
        server: String,
    }

    impl EmailService for SmtpEmailService {
        fn server(&self) -> String {
            self.server.clone()
        }
    }

    const EMAIL_SERVICE: ServiceKey<dyn EmailService> = ServiceKey::new("EmailService");

    const MIXED_CASE: &str = r#"
[services.EmailService]
implementation = "smtp"
params = { smtpServer = "smtp.example.com", port = 25 }
"#;

    fn email_catalog() -> ImplementationCatalog {
        let mut catalog = ImplementationCatalog::new();
        catalog.add(EMAIL_SERVICE, "smtp", |params| {
            let server = params.require_str("smtpServer")?.to_string();
            Ok(Arc::new(SmtpEmailService { server }) as Arc<dyn EmailService>)
        });
        catalog
    }

    #[test]
    fn test_mixed_case_names_are_preserved() {
        let profile = WiringProfile::from_toml_str(MIXED_CASE).unwrap();

        assert_eq!(profile.services.keys().collect::<Vec<_>>(), vec!["EmailService"]);
        let params = &profile.services["EmailService"].params;
        assert_eq!(params.get_str("smtpServer"), Some("smtp.example.com"));

        let container = DIContainer::new();
        profile.apply(&container, &email_catalog()).unwrap();
        assert_eq!(container.resolve(EMAIL_SERVICE).unwrap().server(), "smtp.example.com");
    }

    #[test]
    fn test_mixed_case_names_survive_load() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MIXED_CASE.as_bytes()).unwrap();

        let profile = WiringProfile::load(file.path()).unwrap();
        let container = DIContainer::new();
        profile.apply(&container, &email_catalog()).unwrap();
        assert!(container.is_registered(EMAIL_SERVICE));
    }

    #[test]
    fn test_overrides_merge_case_insensitively() {
        let mut document: serde_json::Value = toml::from_str(MIXED_CASE).unwrap();
        // Shape of LIFESTYLE__SERVICES__EMAILSERVICE__PARAMS__PORT=2525 after parsing
        let overrides = serde_json::json!({
            "services": {
                "emailservice": {
                    "lifetime": "per_request",
                    "params": { "port": 2525, "smtpserver": "smtp.internal" }
                }
            }
        });

        merge_overrides(&mut document, overrides);
        let profile: WiringProfile = serde_json::from_value(document).unwrap();

        assert_eq!(profile.services.len(), 1);
        let wiring = &profile.services["EmailService"];
        assert_eq!(wiring.lifetime, ServiceLifetime::PerRequest);
        assert_eq!(wiring.params.get_as::<u16>("port").unwrap(), Some(2525));
        assert_eq!(wiring.params.get_str("smtpServer"), Some("smtp.internal"));
    }
}
