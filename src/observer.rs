//! Diagnostic observers for resolution events.
//!
//! Observers see every resolution that reaches a binding: the start, the
//! successful end with its duration, and failures. They run synchronously on
//! the resolving thread, so implementations should stay cheap.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::Key;

/// Observer trait for resolution events.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, DiObserver, Key, Lifetime, Resolver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl DiObserver for Counter {
///     fn resolving(&self, _key: &Key) {}
///
///     fn resolved(&self, _key: &Key, _duration: Duration) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let counter = Arc::new(Counter::default());
/// let mut bindings = BindingCollection::new();
/// bindings.bind_supplier::<u8, _>(Lifetime::Transient, |_| Ok(1));
/// bindings.add_observer(counter.clone());
/// let injector = bindings.build().unwrap();
///
/// injector.get::<u8>().unwrap();
/// assert_eq!(counter.0.load(Ordering::Relaxed), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a binding provides an instance.
    fn resolving(&self, key: &Key);

    /// Called after a binding provided an instance (or a placeholder).
    ///
    /// * `duration` - Time elapsed from `resolving` to `resolved`
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called when providing an instance failed.
    ///
    /// Errors propagate through every enclosing resolution, so one failure is
    /// reported once per key on the failing chain.
    fn construction_failed(&self, key: &Key, error: &DiError) {
        let _ = (key, error);
    }
}

/// Collection of observers for efficient notification.
///
/// Has minimal overhead when no observers are registered.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn extend(&mut self, other: &Observers) {
        self.observers.extend(other.observers.iter().cloned());
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    #[inline]
    pub(crate) fn construction_failed(&self, key: &Key, error: &DiError) {
        for observer in &self.observers {
            observer.construction_failed(key, error);
        }
    }
}

/// Built-in observer that forwards events to `tracing`.
///
/// Resolutions are logged at `TRACE`, failures at `WARN`.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, TracingObserver};
/// use std::sync::Arc;
///
/// let mut bindings = BindingCollection::new();
/// bindings.add_observer(Arc::new(TracingObserver::new()));
/// let injector = bindings.build().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    target: Option<&'static str>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every event with `label`, e.g. the name of the application part.
    pub fn with_label(label: &'static str) -> Self {
        Self {
            target: Some(label),
        }
    }
}

impl DiObserver for TracingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(label = self.target, key = %key, "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::trace!(label = self.target, key = %key, ?duration, "resolved");
    }

    fn construction_failed(&self, key: &Key, error: &DiError) {
        tracing::warn!(label = self.target, key = %key, %error, "resolution failed");
    }
}
