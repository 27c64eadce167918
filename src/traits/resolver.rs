//! Resolver traits for instance resolution.

use std::sync::Arc;

use crate::binding::downcast;
use crate::deferred::{Deferred, Provision};
use crate::dependency::Dependency;
use crate::error::{DiError, DiResult};
use crate::internal::construction::current_chain;
use crate::key::Key;

/// Core resolver trait for object-safe resolution.
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// typed methods built on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves one dependency edge.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(_))` - An instance, or a placeholder if the edge is deferred
    ///   and closes a cycle
    /// * `Ok(None)` - The edge is optional and nothing is bound
    /// * `Err(DiError)` - Resolution error (missing, circular, construction, ...)
    fn resolve_dependency(&self, dependency: &Dependency) -> DiResult<Option<Provision>>;
}

/// High-level resolver interface with typed methods.
///
/// Implemented by [`Injector`](crate::Injector) and by the
/// [`ResolverContext`](crate::ResolverContext) handed to suppliers.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String {
///         format!("LOG: {}", msg)
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_instance(42usize);
/// bindings.bind_named_instance("greeting", "hello".to_string());
/// bindings.bind_instance_arc::<dyn Logger>(Arc::new(ConsoleLogger));
///
/// let injector = bindings.build().unwrap();
///
/// assert_eq!(*injector.get::<usize>().unwrap(), 42);
/// assert_eq!(*injector.get_named::<String>("greeting").unwrap(), "hello");
/// assert_eq!(injector.get::<dyn Logger>().unwrap().log("hi"), "LOG: hi");
/// assert!(injector.get_optional::<u8>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T` (a concrete type or a trait object).
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get_key(&Key::of::<T>())
    }

    /// Resolves `T` bound under `name`.
    fn get_named<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> DiResult<Arc<T>> {
        self.get_key(&Key::named::<T>(name))
    }

    /// Resolves an arbitrary key of type `T`.
    fn get_key<T: ?Sized + Send + Sync + 'static>(&self, key: &Key) -> DiResult<Arc<T>> {
        match self.resolve_dependency(&Dependency::new(*key))? {
            Some(Provision::Ready(instance)) => downcast::<T>(&instance, key),
            Some(Provision::Pending(_)) => Err(DiError::unexpected_placeholder(*key)),
            None => Err(DiError::MissingBinding {
                key: *key,
                chain: current_chain(),
            }),
        }
    }

    /// Resolves `T`, or `None` if nothing is bound for it.
    fn get_optional<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        let key = Key::of::<T>();
        match self.resolve_dependency(&Dependency::new(key).optional())? {
            Some(Provision::Ready(instance)) => downcast::<T>(&instance, &key).map(Some),
            Some(Provision::Pending(_)) => Err(DiError::unexpected_placeholder(key)),
            None => Ok(None),
        }
    }

    /// Resolves `T`, accepting a placeholder if `T` is already being
    /// constructed on this call stack.
    ///
    /// Meant for suppliers taking part in a cycle; from the outside the
    /// result is always ready.
    fn get_deferred<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Deferred<T>> {
        let key = Key::of::<T>();
        match self.resolve_dependency(&Dependency::new(key).deferred())? {
            Some(provision) => Deferred::from_provision(provision, &key),
            None => Err(DiError::MissingBinding {
                key,
                chain: current_chain(),
            }),
        }
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if `T` cannot be resolved.
    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), e))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
