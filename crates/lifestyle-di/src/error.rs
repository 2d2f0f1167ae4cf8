//! Container error types
//!
//! Every failure the container can report is a [`DIError`] variant. Factory
//! failures are carried as the `source` of [`DIError::Construction`] without
//! being rewritten.

use thiserror::Error;

/// Errors that can occur during registration, resolution and scope handling
#[derive(Debug, Error)]
pub enum DIError {
    /// Resolution requested for a key that was never registered
    #[error("Service not registered: {service}")]
    NotRegistered { service: String },

    /// A scoped service was requested (or a scope exited) with no open scope
    #[error("No active scope for '{service}': scoped services must be resolved inside a scope")]
    NoActiveScope { service: String },

    /// The typed key disagrees with the type the registration produces
    #[error("Type mismatch for service {service}: requested {expected}")]
    TypeMismatch {
        service: String,
        expected: &'static str,
    },

    /// The implementation factory failed
    #[error("Failed to construct service '{service}': {source}")]
    Construction {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    /// A construction parameter is missing or has the wrong shape
    #[error("Invalid construction parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// A wiring profile names an implementation the catalog does not know
    #[error("Unknown implementation '{implementation}' for service '{service}'")]
    UnknownImplementation {
        service: String,
        implementation: String,
    },

    /// A wiring profile could not be loaded or deserialized
    #[error("Profile error: {0}")]
    Profile(#[from] config::ConfigError),

    /// A service provider rejected the container state after registration
    #[error("Validation failed for provider '{provider}': {message}")]
    Validation {
        provider: &'static str,
        message: String,
    },
}

pub type DIResult<T> = Result<T, DIError>;

impl DIError {
    pub(crate) fn not_registered(service: &str) -> Self {
        Self::NotRegistered {
            service: service.to_string(),
        }
    }

    pub(crate) fn no_active_scope(service: &str) -> Self {
        Self::NoActiveScope {
            service: service.to_string(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(name: &str, message: S) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create a validation error for a provider
    pub fn validation<S: Into<String>>(provider: &'static str, message: S) -> Self {
        Self::Validation {
            provider,
            message: message.into(),
        }
    }

    /// Name of the service the error concerns, when there is one
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::NotRegistered { service }
            | Self::NoActiveScope { service }
            | Self::TypeMismatch { service, .. }
            | Self::Construction { service, .. }
            | Self::UnknownImplementation { service, .. } => Some(service),
            _ => None,
        }
    }
}
