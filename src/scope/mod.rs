//! Scope policies.
//!
//! A scope policy decorates a binding's unscoped [`Provider`] with a caching
//! rule. It is applied once, when the binding is created, and never sees the
//! strategy behind the provider.

mod context;
mod slot;

use std::sync::Arc;

use crate::binding::{Provider, Request};
use crate::key::Key;

pub use context::{ContextScope, ScopeGuard, ScopeInstance};
pub(crate) use slot::SingletonSlot;

/// Decorator turning an unscoped provider into a scoped one.
///
/// # Examples
///
/// A policy that caches nothing but logs every creation:
///
/// ```rust
/// use ferrous_inject::{
///     BindingCollection, Key, Lifetime, Provider, Request, Resolver, ScopePolicy,
/// };
/// use std::sync::Arc;
///
/// struct Logged;
///
/// impl ScopePolicy for Logged {
///     fn scope(&self, key: &Key, unscoped: Provider) -> Provider {
///         let key = *key;
///         Arc::new(move |request: &Request<'_>| {
///             println!("creating {}", key);
///             unscoped(request)
///         })
///     }
///
///     fn name(&self) -> &'static str {
///         "logged"
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_supplier::<u32, _>(Lifetime::custom(Arc::new(Logged)), |_| Ok(7));
/// let injector = bindings.build().unwrap();
/// assert_eq!(*injector.get::<u32>().unwrap(), 7);
/// ```
pub trait ScopePolicy: Send + Sync + 'static {
    /// Returns the scoped provider for `key`.
    fn scope(&self, key: &Key, unscoped: Provider) -> Provider;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// One instance per binding for the injector's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingletonScope;

impl ScopePolicy for SingletonScope {
    fn scope(&self, key: &Key, unscoped: Provider) -> Provider {
        let slot = Arc::new(SingletonSlot::new(*key));
        Arc::new(move |request: &Request<'_>| slot.get_or_compute(|| unscoped(request)))
    }

    fn name(&self) -> &'static str {
        "singleton"
    }
}
