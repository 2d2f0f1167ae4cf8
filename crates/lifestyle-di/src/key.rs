//! Typed service keys

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Stable identifier for an abstract capability.
///
/// The name is what the registry is keyed by; `T` is the type handed back by
/// [`DIContainer::resolve`](crate::DIContainer::resolve) as `Arc<T>`. `T` is
/// usually a trait object so that the implementation behind a key can be
/// swapped at configuration time.
///
/// ```rust
/// use lifestyle_di::ServiceKey;
///
/// pub trait Notifier: Send + Sync {
///     fn notify(&self, to: &str) -> String;
/// }
///
/// pub const NOTIFIER: ServiceKey<dyn Notifier> = ServiceKey::new("notifier");
/// assert_eq!(NOTIFIER.name(), "notifier");
/// ```
pub struct ServiceKey<T: ?Sized> {
    name: &'static str,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized> ServiceKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

// Manual impls: derives would require `T: Clone` etc.
impl<T: ?Sized> Clone for ServiceKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ServiceKey<T> {}

impl<T: ?Sized> PartialEq for ServiceKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T: ?Sized> Eq for ServiceKey<T> {}

impl<T: ?Sized> fmt::Debug for ServiceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: ?Sized> fmt::Display for ServiceKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
