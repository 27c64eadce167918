//! Binding collection module for dependency injection.
//!
//! This module contains the [`BindingCollection`] type, which gathers the
//! declarations of one environment, and the assembly step that turns a
//! collection into a running [`Injector`].

use std::sync::Arc;

use crate::binding::{adapter, downcast, erase, Strategy, SupplierFn};
use crate::config::InjectorOptions;
use crate::constructor::{ConstructionInterceptor, Constructor, Injectable};
use crate::dependency::Dependency;
use crate::environment::catalog::CatalogEntry;
use crate::environment::{EnvironmentTree, Injector, NodeKind, ResolverContext};
use crate::error::{BoxError, DiError, DiResult};
use crate::factory::{FactoryDecl, FactorySpec};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::Provision;

mod assembly;
pub mod module_system;

pub(crate) use assembly::assemble;
pub use module_system::*;

/// One declared binding, not yet attached to an environment.
pub(crate) struct Declaration {
    pub(crate) key: Key,
    pub(crate) strategy: Strategy,
    pub(crate) lifetime: Lifetime,
}

pub(crate) type StaticApply = Arc<dyn Fn(Provision) -> Result<(), BoxError> + Send + Sync>;

/// A static injection target, run once when assembly completes.
pub(crate) struct StaticInjection {
    pub(crate) name: &'static str,
    pub(crate) dependency: Dependency,
    pub(crate) apply: StaticApply,
}

/// Declarations for one environment.
///
/// Fill a collection, then either [`build`](Self::build) it into a root
/// injector or hand it to [`Injector::create_child`]. Problems found while
/// declaring (a failing module, a duplicate key) are kept and reported
/// together with everything assembly finds.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, Constructor, Injectable, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// impl Injectable for UserService {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|args| Ok(UserService { db: args.next()? })).param::<Database>()
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_instance(Database { url: "postgres://localhost".to_string() });
/// bindings.describe::<UserService>();
///
/// let injector = bindings.build().unwrap();
/// let users = injector.get::<UserService>().unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Default)]
pub struct BindingCollection {
    pub(crate) declarations: Vec<Declaration>,
    pub(crate) factories: Vec<FactoryDecl>,
    pub(crate) exposed: Vec<Key>,
    pub(crate) private_children: Vec<BindingCollection>,
    pub(crate) catalog: Vec<CatalogEntry>,
    pub(crate) interceptors: Vec<Arc<dyn ConstructionInterceptor>>,
    pub(crate) static_injections: Vec<StaticInjection>,
    pub(crate) prewarm: Vec<Key>,
    pub(crate) observers: Observers,
    pub(crate) options: Option<InjectorOptions>,
    pub(crate) errors: Vec<DiError>,
}

impl BindingCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the injector this collection builds.
    ///
    /// Only honored by [`build`](Self::build); child injectors share their
    /// root's options.
    pub fn with_options(mut self, options: InjectorOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub(crate) fn push_binding(
        &mut self,
        key: Key,
        strategy: Strategy,
        lifetime: Lifetime,
    ) -> &mut Self {
        tracing::trace!(key = %key, lifetime = lifetime.name(), "binding declared");
        self.declarations.push(Declaration {
            key,
            strategy,
            lifetime,
        });
        self
    }

    // ----- Instances -----

    /// Binds `T` to a fixed instance.
    pub fn bind_instance<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.bind_instance_arc(Arc::new(value))
    }

    /// Binds `T` (typically a trait object) to a fixed shared instance.
    pub fn bind_instance_arc<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        value: Arc<T>,
    ) -> &mut Self {
        self.push_binding(Key::of::<T>(), Strategy::Instance(erase(value)), Lifetime::Transient)
    }

    /// Binds `T` under `name` to a fixed instance.
    pub fn bind_named_instance<T: Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        value: T,
    ) -> &mut Self {
        self.push_binding(
            Key::named::<T>(name),
            Strategy::Instance(erase(Arc::new(value))),
            Lifetime::Transient,
        )
    }

    // ----- Constructors -----

    /// Binds `T` to a constructor.
    ///
    /// Interceptors registered with
    /// [`intercept_construction`](Self::intercept_construction) in this
    /// collection or an enclosing environment wrap it.
    pub fn bind_constructor<T: Send + Sync + 'static>(
        &mut self,
        lifetime: Lifetime,
        constructor: Constructor<T>,
    ) -> &mut Self {
        self.bind_constructor_key(Key::of::<T>(), lifetime, constructor)
    }

    /// Binds `T` under `name` to a constructor.
    pub fn bind_named_constructor<T: Send + Sync + 'static>(
        &mut self,
        name: &'static str,
        lifetime: Lifetime,
        constructor: Constructor<T>,
    ) -> &mut Self {
        self.bind_constructor_key(Key::named::<T>(name), lifetime, constructor)
    }

    fn bind_constructor_key<T: Send + Sync + 'static>(
        &mut self,
        key: Key,
        lifetime: Lifetime,
        constructor: Constructor<T>,
    ) -> &mut Self {
        let plan = Arc::new(constructor.into_plan());
        self.push_binding(key, Strategy::Constructor(plan), lifetime)
    }

    /// Registers `T` for just-in-time bindings, with its own constructor and
    /// lifetime.
    ///
    /// Nothing is bound: the first environment that needs `T` without an
    /// explicit binding creates one. Use [`declare`](Self::declare) to bind
    /// it here explicitly.
    pub fn describe<T: Injectable>(&mut self) -> &mut Self {
        self.catalog.push(CatalogEntry::of::<T>());
        self
    }

    /// Binds `T` explicitly here, with its own constructor and lifetime.
    pub fn declare<T: Injectable>(&mut self) -> &mut Self {
        self.describe::<T>();
        self.bind_constructor(T::lifetime(), T::constructor())
    }

    // ----- Suppliers -----

    /// Binds `T` to a supplier callback.
    ///
    /// The supplier resolves its dependencies through the
    /// [`ResolverContext`] it is given, from the environment that owns the
    /// binding.
    pub fn bind_supplier<T, F>(&mut self, lifetime: Lifetime, supplier: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let erased: SupplierFn = Arc::new(move |context: &ResolverContext<'_>| {
            supplier(context).map(|value| erase(Arc::new(value)))
        });
        self.push_binding(Key::of::<T>(), Strategy::Supplier(erased), lifetime)
    }

    /// Binds `T` under `name` to a supplier callback.
    pub fn bind_named_supplier<T, F>(
        &mut self,
        name: &'static str,
        lifetime: Lifetime,
        supplier: F,
    ) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let erased: SupplierFn = Arc::new(move |context: &ResolverContext<'_>| {
            supplier(context).map(|value| erase(Arc::new(value)))
        });
        self.push_binding(Key::named::<T>(name), Strategy::Supplier(erased), lifetime)
    }

    /// Binds `T` (typically a trait object) to a supplier returning shared
    /// instances.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_inject::{BindingCollection, Lifetime, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct Fixed(u64);
    /// impl Clock for Fixed { fn now(&self) -> u64 { self.0 } }
    ///
    /// let mut bindings = BindingCollection::new();
    /// bindings.bind_supplier_arc::<dyn Clock, _>(Lifetime::Singleton, |_| {
    ///     Ok(Arc::new(Fixed(12)) as Arc<dyn Clock>)
    /// });
    /// let injector = bindings.build().unwrap();
    /// assert_eq!(injector.get::<dyn Clock>().unwrap().now(), 12);
    /// ```
    pub fn bind_supplier_arc<T, F>(&mut self, lifetime: Lifetime, supplier: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolverContext<'_>) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let erased: SupplierFn =
            Arc::new(move |context: &ResolverContext<'_>| supplier(context).map(erase));
        self.push_binding(Key::of::<T>(), Strategy::Supplier(erased), lifetime)
    }

    // ----- Linked bindings -----

    /// Binds `S` to whatever `T` resolves to, converted by `upcast`.
    ///
    /// The link itself is unscoped: each request delegates to `T`'s binding,
    /// so `S` shares `T`'s lifetime.
    pub fn bind_linked<S, T>(&mut self, upcast: fn(Arc<T>) -> Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        self.bind_linked_in(Lifetime::Transient, upcast)
    }

    /// Like [`bind_linked`](Self::bind_linked), with the link itself scoped.
    pub fn bind_linked_in<S, T>(
        &mut self,
        lifetime: Lifetime,
        upcast: fn(Arc<T>) -> Arc<S>,
    ) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        let target = Key::of::<T>();
        let strategy = Strategy::Linked {
            target,
            adapter: adapter(target, upcast),
        };
        self.push_binding(Key::of::<S>(), strategy, lifetime)
    }

    /// Binds `S` under `name` to whatever `T` resolves to.
    pub fn bind_named_linked<S, T>(
        &mut self,
        name: &'static str,
        upcast: fn(Arc<T>) -> Arc<S>,
    ) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        let target = Key::of::<T>();
        let strategy = Strategy::Linked {
            target,
            adapter: adapter(target, upcast),
        };
        self.push_binding(Key::named::<S>(name), strategy, Lifetime::Transient)
    }

    // ----- Factories -----

    /// Binds `Factory<F>`, a factory with the methods of `spec`.
    ///
    /// Every method is checked during assembly.
    pub fn bind_factory<F: ?Sized + 'static>(&mut self, spec: FactorySpec<F>) -> &mut Self {
        self.factories.push(spec.into_decl());
        self
    }

    // ----- Environments -----

    /// Makes `T`, bound in this private collection, visible to the parent.
    pub fn expose<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.expose_key(Key::of::<T>())
    }

    pub fn expose_named<T: ?Sized + 'static>(&mut self, name: &'static str) -> &mut Self {
        self.expose_key(Key::named::<T>(name))
    }

    pub fn expose_key(&mut self, key: Key) -> &mut Self {
        self.exposed.push(key);
        self
    }

    /// Runs `module` against this collection.
    pub fn install<M: Module>(&mut self, module: M) -> &mut Self {
        if let Err(err) = module.configure(self) {
            tracing::debug!(error = %err, "module failed to configure");
            self.errors.push(err);
        }
        self
    }

    /// Runs `module` against a new private environment below this one.
    ///
    /// Only the keys the module exposes are visible here.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_inject::{BindingCollection, DiResult, Lifetime, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Secret(&'static str);
    /// struct Vault { secret: Arc<Secret> }
    ///
    /// let mut bindings = BindingCollection::new();
    /// bindings.install_private(|private: &mut BindingCollection| -> DiResult<()> {
    ///     private.bind_instance(Secret("hunter2"));
    ///     private.bind_supplier::<Vault, _>(Lifetime::Singleton, |r| {
    ///         Ok(Vault { secret: r.get()? })
    ///     });
    ///     private.expose::<Vault>();
    ///     Ok(())
    /// });
    /// let injector = bindings.build().unwrap();
    ///
    /// assert_eq!(injector.get::<Vault>().unwrap().secret.0, "hunter2");
    /// assert!(injector.get::<Secret>().is_err());
    /// ```
    pub fn install_private<M: Module>(&mut self, module: M) -> &mut Self {
        let mut private = BindingCollection::new();
        private.install(module);
        self.private_children.push(private);
        self
    }

    // ----- Interception, static injection, eager creation -----

    /// Wraps the construction proxy of every constructor binding owned by
    /// this environment or its descendants, including just-in-time ones.
    ///
    /// Interceptors of enclosing environments wrap first, so they end up
    /// innermost.
    pub fn intercept_construction<I: ConstructionInterceptor + 'static>(
        &mut self,
        interceptor: I,
    ) -> &mut Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Resolves `D` once assembly completes and hands it to `apply`.
    ///
    /// Targets run in declaration order, before eager singletons are
    /// created.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_inject::BindingCollection;
    /// use once_cell::sync::OnceCell;
    /// use std::sync::Arc;
    ///
    /// struct Clock(u64);
    /// static CLOCK: OnceCell<Arc<Clock>> = OnceCell::new();
    ///
    /// let mut bindings = BindingCollection::new();
    /// bindings.bind_instance(Clock(3));
    /// bindings.request_static_injection::<Clock, _>("CLOCK", |clock| {
    ///     let _ = CLOCK.set(clock);
    ///     Ok(())
    /// });
    /// bindings.build().unwrap();
    /// assert_eq!(CLOCK.get().unwrap().0, 3);
    /// ```
    pub fn request_static_injection<D, F>(&mut self, name: &'static str, apply: F) -> &mut Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let key = Key::of::<D>();
        let apply: StaticApply = Arc::new(move |provision: Provision| {
            let instance = provision
                .into_ready()
                .ok_or_else(|| DiError::unexpected_placeholder(key))?;
            apply(downcast::<D>(&instance, &key)?)
        });
        self.static_injections.push(StaticInjection {
            name,
            dependency: Dependency::new(key),
            apply,
        });
        self
    }

    /// Creates `T` as soon as the injector is assembled, whatever the stage.
    pub fn prewarm<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.prewarm.push(Key::of::<T>());
        self
    }

    /// Adds an observer notified of every resolution in the injector.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Number of bindings declared directly in this collection.
    pub fn len(&self) -> usize {
        self.declarations.len() + self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assembles the collection into a root injector.
    ///
    /// Every problem found (conflicting declarations, bad exposures,
    /// unsatisfiable dependencies or factories, failing static injections
    /// and eager singletons) is reported at once as [`DiError::Assembly`].
    pub fn build(mut self) -> DiResult<Injector> {
        let options = match self.options.take() {
            Some(options) => options,
            None => InjectorOptions::from_env()?,
        };
        tracing::debug!(stage = ?options.stage, bindings = self.len(), "building injector");
        let tree = EnvironmentTree::new(options);
        let node = assemble(&tree, None, NodeKind::Root, self)?;
        Ok(Injector::root(tree, node))
    }
}

impl std::fmt::Debug for BindingCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingCollection")
            .field("bindings", &self.declarations.iter().map(|d| d.key).collect::<Vec<_>>())
            .field("factories", &self.factories.iter().map(|d| d.key).collect::<Vec<_>>())
            .field("exposed", &self.exposed)
            .field("private_children", &self.private_children)
            .finish()
    }
}
