//! Dependency Injection Container with lifetime scoping
//!
//! A registry maps service keys to implementation factories, each with one of
//! three lifetime policies, and a container resolves keys according to that
//! policy:
//!
//! - [`ServiceLifetime::Singleton`]: one instance per container
//! - [`ServiceLifetime::Scoped`]: one instance per open scope
//! - [`ServiceLifetime::PerRequest`]: a new instance on every resolution
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use lifestyle_di::{ConstructionParams, DIContainer, ServiceKey, ServiceLifetime};
//!
//! pub trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct FileLogger {
//!     filename: String,
//! }
//!
//! impl Logger for FileLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[{}] {}", self.filename, message)
//!     }
//! }
//!
//! const LOGGING: ServiceKey<dyn Logger> = ServiceKey::new("logging");
//!
//! let container = DIContainer::new();
//! container.register_with_params(
//!     LOGGING,
//!     ServiceLifetime::Singleton,
//!     ConstructionParams::new().with("filename", "app.log"),
//!     |params| {
//!         let filename = params.require_str("filename")?.to_string();
//!         Ok(Arc::new(FileLogger { filename }) as Arc<dyn Logger>)
//!     },
//! );
//!
//! let logger = container.resolve(LOGGING).unwrap();
//! assert_eq!(logger.log("started"), "[app.log] started");
//! ```
//!
//! Wiring can also be grouped into [`ServiceProvider`]s or loaded from a
//! [`WiringProfile`] configuration file.

pub mod builder;
pub mod container;
pub mod error;
pub mod key;
pub mod params;
pub mod profile;
pub mod provider;
pub mod registry;
pub mod scope;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use builder::DIContainerBuilder;
pub use container::DIContainer;
pub use error::{DIError, DIResult};
pub use key::ServiceKey;
pub use params::ConstructionParams;
pub use profile::{ImplementationCatalog, ProfileProvider, ServiceWiring, WiringProfile};
pub use provider::{ServiceProvider, ServiceProviderRegistry};
pub use registry::{Registration, ServiceRegistry};
pub use scope::{ScopeFrame, ScopeGuard, ScopeId, ScopeStack};

/// Service lifetime management
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLifetime {
    /// Created once and reused for the whole lifetime of the container
    #[default]
    Singleton,
    /// Created once per open scope
    Scoped,
    /// Created each time it's requested
    #[serde(alias = "transient")]
    PerRequest,
}

impl ServiceLifetime {
    /// Whether resolutions of this lifetime are cached anywhere
    pub fn is_cached(self) -> bool {
        !matches!(self, ServiceLifetime::PerRequest)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceLifetime::Singleton => "singleton",
            ServiceLifetime::Scoped => "scoped",
            ServiceLifetime::PerRequest => "per_request",
        }
    }
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceLifetime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "singleton" => Ok(ServiceLifetime::Singleton),
            "scoped" => Ok(ServiceLifetime::Scoped),
            "per_request" | "transient" => Ok(ServiceLifetime::PerRequest),
            other => Err(format!("unknown service lifetime: {}", other)),
        }
    }
}
