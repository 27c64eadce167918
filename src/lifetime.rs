//! Binding lifetimes.

use std::fmt;
use std::sync::Arc;

use crate::binding::Provider;
use crate::key::Key;
use crate::scope::{ScopePolicy, SingletonScope};

/// Binding lifetimes controlling instance reuse
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct RequestModel { id: u32 }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_supplier::<Database, _>(Lifetime::Singleton, |_| {
///     Ok(Database { url: "postgres://localhost".to_string() })
/// });
/// bindings.bind_supplier::<RequestModel, _>(Lifetime::Transient, |_| Ok(RequestModel { id: 1 }));
/// let injector = bindings.build().unwrap();
///
/// // Singleton: same instance every time
/// let db1 = injector.get::<Database>().unwrap();
/// let db2 = injector.get::<Database>().unwrap();
/// assert!(Arc::ptr_eq(&db1, &db2));
///
/// // Transient: always a new instance
/// let m1 = injector.get::<RequestModel>().unwrap();
/// let m2 = injector.get::<RequestModel>().unwrap();
/// assert!(!Arc::ptr_eq(&m1, &m2));
/// ```
#[derive(Clone, Default)]
pub enum Lifetime {
    /// New instance per resolution, never cached
    #[default]
    Transient,
    /// Single instance per binding, cached for the injector's lifetime
    ///
    /// Concurrent first requests block until the single computation
    /// completes.
    Singleton,
    /// Externally managed policy, e.g. a [`ContextScope`](crate::ContextScope)
    Custom(Arc<dyn ScopePolicy>),
}

impl Lifetime {
    /// Wraps a custom scope policy.
    pub fn custom(policy: Arc<dyn ScopePolicy>) -> Self {
        Lifetime::Custom(policy)
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Singleton => "singleton",
            Lifetime::Custom(policy) => policy.name(),
        }
    }

    /// Decorates an unscoped provider according to this lifetime.
    pub(crate) fn scope(&self, key: &Key, unscoped: Provider) -> Provider {
        match self {
            Lifetime::Transient => unscoped,
            Lifetime::Singleton => SingletonScope.scope(key, unscoped),
            Lifetime::Custom(policy) => policy.scope(key, unscoped),
        }
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Transient => f.write_str("Transient"),
            Lifetime::Singleton => f.write_str("Singleton"),
            Lifetime::Custom(policy) => write!(f, "Custom({})", policy.name()),
        }
    }
}

impl PartialEq for Lifetime {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Lifetime::Transient, Lifetime::Transient) => true,
            (Lifetime::Singleton, Lifetime::Singleton) => true,
            (Lifetime::Custom(a), Lifetime::Custom(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl Eq for Lifetime {}
