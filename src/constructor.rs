//! Constructor descriptions.
//!
//! A [`Constructor<T>`] tells the injector how to build a `T`: the ordered
//! dependencies of its primary initializer, the initializer itself, and the
//! members injected after the instance exists. Types that describe
//! themselves implement [`Injectable`] and can be created just in time,
//! without an explicit binding.

use std::fmt;
use std::sync::Arc;

use crate::binding::{downcast, erase, AnyInstance};
use crate::deferred::{Deferred, Provision};
use crate::dependency::Dependency;
use crate::error::{BoxError, DiError};
use crate::internal::construction::current_chain;
use crate::key::Key;
use crate::lifetime::Lifetime;

/// A type that knows how to construct itself from injected dependencies.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, Constructor, Injectable, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Engine;
/// struct Car { engine: Arc<Engine> }
///
/// impl Injectable for Engine {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|_| Ok(Engine))
///     }
///
///     fn lifetime() -> Lifetime {
///         Lifetime::Singleton
///     }
/// }
///
/// impl Injectable for Car {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|args| Ok(Car { engine: args.next()? })).param::<Engine>()
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.describe::<Engine>().describe::<Car>();
/// let injector = bindings.build().unwrap();
///
/// let a = injector.get::<Car>().unwrap();
/// let b = injector.get::<Car>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// assert!(Arc::ptr_eq(&a.engine, &b.engine));
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// How to build the type.
    fn constructor() -> Constructor<Self>;

    /// Lifetime used when the type is created just in time.
    ///
    /// A just-in-time singleton is owned by the highest environment able to
    /// build it, so sibling environments share one instance unless the type
    /// needs a binding only one of them has.
    fn lifetime() -> Lifetime {
        Lifetime::Transient
    }
}

/// The step that actually creates an instance from resolved arguments.
///
/// Interceptors may wrap it; the injector never looks past it.
pub trait ConstructionProxy: Send + Sync {
    fn new_instance(&self, args: &mut Arguments) -> Result<AnyInstance, BoxError>;
}

/// Wraps the construction proxy of constructor-built bindings.
///
/// Called once per binding, when the binding is created. Returning the
/// proxy unchanged opts out.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     Arguments, BindingCollection, ConstructionProxy, Constructor, Injectable, Key, Resolver,
/// };
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// static CREATED: AtomicUsize = AtomicUsize::new(0);
///
/// struct Counting(Arc<dyn ConstructionProxy>);
///
/// impl ConstructionProxy for Counting {
///     fn new_instance(
///         &self,
///         args: &mut Arguments,
///     ) -> Result<ferrous_inject::AnyInstance, ferrous_inject::BoxError> {
///         CREATED.fetch_add(1, Ordering::SeqCst);
///         self.0.new_instance(args)
///     }
/// }
///
/// struct Widget;
/// impl Injectable for Widget {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|_| Ok(Widget))
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.describe::<Widget>();
/// bindings.intercept_construction(|_key: &Key, proxy: Arc<dyn ConstructionProxy>| {
///     Arc::new(Counting(proxy)) as Arc<dyn ConstructionProxy>
/// });
/// let injector = bindings.build().unwrap();
///
/// injector.get::<Widget>().unwrap();
/// injector.get::<Widget>().unwrap();
/// assert_eq!(CREATED.load(Ordering::SeqCst), 2);
/// ```
pub trait ConstructionInterceptor: Send + Sync {
    fn intercept(&self, key: &Key, proxy: Arc<dyn ConstructionProxy>) -> Arc<dyn ConstructionProxy>;
}

impl<F> ConstructionInterceptor for F
where
    F: Fn(&Key, Arc<dyn ConstructionProxy>) -> Arc<dyn ConstructionProxy> + Send + Sync,
{
    fn intercept(
        &self,
        key: &Key,
        proxy: Arc<dyn ConstructionProxy>,
    ) -> Arc<dyn ConstructionProxy> {
        self(key, proxy)
    }
}

/// Resolved initializer arguments, consumed in declaration order.
pub struct Arguments {
    values: std::vec::IntoIter<(Dependency, Option<Provision>)>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<(Dependency, Option<Provision>)>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    fn take(&mut self) -> Result<(Dependency, Option<Provision>), BoxError> {
        self.values.next().ok_or_else(|| {
            DiError::Configuration("initializer read more arguments than it declares".into())
                .into()
        })
    }

    /// Next argument, which must be available now.
    pub fn next<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>, BoxError> {
        let (dependency, value) = self.take()?;
        let key = dependency.key();
        match value {
            Some(Provision::Ready(instance)) => Ok(downcast::<T>(&instance, &key)?),
            Some(Provision::Pending(_)) => Err(DiError::unexpected_placeholder(key).into()),
            None => Err(missing(key)),
        }
    }

    /// Next argument declared with [`Constructor::deferred_param`].
    pub fn next_deferred<T: ?Sized + Send + Sync + 'static>(
        &mut self,
    ) -> Result<Deferred<T>, BoxError> {
        let (dependency, value) = self.take()?;
        let key = dependency.key();
        match value {
            Some(provision) => Ok(Deferred::from_provision(provision, &key)?),
            None => Err(missing(key)),
        }
    }

    /// Next argument declared with [`Constructor::optional_param`].
    pub fn next_optional<T: ?Sized + Send + Sync + 'static>(
        &mut self,
    ) -> Result<Option<Arc<T>>, BoxError> {
        let (dependency, value) = self.take()?;
        let key = dependency.key();
        match value {
            Some(Provision::Ready(instance)) => Ok(Some(downcast::<T>(&instance, &key)?)),
            Some(Provision::Pending(_)) => Err(DiError::unexpected_placeholder(key).into()),
            None => Ok(None),
        }
    }

    /// Arguments not consumed yet.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

fn missing(key: Key) -> BoxError {
    DiError::MissingBinding {
        key,
        chain: current_chain(),
    }
    .into()
}

type Init<T> = Arc<dyn Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync>;
type Inject = Arc<dyn Fn(&AnyInstance, Provision) -> Result<(), BoxError> + Send + Sync>;

/// One post-construction injection point.
#[derive(Clone)]
pub(crate) struct MemberInjector {
    pub(crate) name: &'static str,
    pub(crate) dependency: Dependency,
    pub(crate) inject: Inject,
}

/// Describes how to construct a `T`.
///
/// Parameters are resolved in the order they are declared and handed to the
/// initializer through [`Arguments`]. Members run after the instance exists
/// (and after every placeholder pointing at it has been filled), in
/// declaration order; their setters receive `&T`, so injected fields use
/// interior mutability.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, Constructor, Lifetime, Resolver};
/// use once_cell::sync::OnceCell;
/// use std::sync::Arc;
///
/// struct Clock;
/// struct Service {
///     port: u16,
///     clock: OnceCell<Arc<Clock>>,
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_instance(Clock);
/// bindings.bind_named_instance("port", 8080u16);
/// bindings.bind_constructor(
///     Lifetime::Singleton,
///     Constructor::new(|args| {
///         Ok(Service { port: *args.next::<u16>()?, clock: OnceCell::new() })
///     })
///     .named_param::<u16>("port")
///     .member::<Clock, _>("clock", |service, clock| {
///         let _ = service.clock.set(clock);
///         Ok(())
///     }),
/// );
/// let injector = bindings.build().unwrap();
///
/// let service = injector.get::<Service>().unwrap();
/// assert_eq!(service.port, 8080);
/// assert!(service.clock.get().is_some());
/// ```
pub struct Constructor<T> {
    params: Vec<Dependency>,
    init: Init<T>,
    members: Vec<MemberInjector>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            init: Arc::new(init),
            members: Vec::new(),
        }
    }

    /// Appends an initializer parameter.
    pub fn param<D: ?Sized + 'static>(self) -> Self {
        self.dependency(Dependency::of::<D>())
    }

    pub fn named_param<D: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.dependency(Dependency::new(Key::named::<D>(name)))
    }

    /// Appends a parameter bound by a factory call.
    pub fn assisted_param<D: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.dependency(Dependency::new(Key::assisted::<D>(name)))
    }

    /// Appends a parameter that accepts a placeholder when it closes a cycle.
    pub fn deferred_param<D: ?Sized + 'static>(self) -> Self {
        self.dependency(Dependency::of::<D>().deferred())
    }

    /// Appends a parameter that may be unbound.
    pub fn optional_param<D: ?Sized + 'static>(self) -> Self {
        self.dependency(Dependency::of::<D>().optional())
    }

    /// Appends an arbitrary parameter edge.
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.params.push(dependency);
        self
    }

    /// Appends a member setter.
    pub fn member<D, F>(self, name: &'static str, setter: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.member_with(name, Dependency::of::<D>(), setter)
    }

    pub fn named_member<D, F>(self, name: &'static str, qualifier: &'static str, setter: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.member_with(name, Dependency::new(Key::named::<D>(qualifier)), setter)
    }

    /// Appends a member setter skipped when `D` is unbound.
    pub fn optional_member<D, F>(self, name: &'static str, setter: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.member_with(name, Dependency::of::<D>().optional(), setter)
    }

    /// Appends a member setter that accepts a placeholder.
    pub fn deferred_member<D, F>(mut self, name: &'static str, setter: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Deferred<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let dependency = Dependency::of::<D>().deferred();
        let target = Key::of::<T>();
        let inject: Inject = Arc::new(move |instance, value| {
            let this = downcast::<T>(instance, &target)?;
            let value = Deferred::<D>::from_provision(value, &dependency.key())?;
            setter(&this, value)
        });
        self.members.push(MemberInjector {
            name,
            dependency,
            inject,
        });
        self
    }

    fn member_with<D, F>(mut self, name: &'static str, dependency: Dependency, setter: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&T, Arc<D>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let target = Key::of::<T>();
        let inject: Inject = Arc::new(move |instance, value| {
            let this = downcast::<T>(instance, &target)?;
            let key = dependency.key();
            let value = match value {
                Provision::Ready(value) => downcast::<D>(&value, &key)?,
                Provision::Pending(_) => return Err(DiError::unexpected_placeholder(key).into()),
            };
            setter(&this, value)
        });
        self.members.push(MemberInjector {
            name,
            dependency,
            inject,
        });
        self
    }

    pub(crate) fn into_plan(self) -> ConstructorPlan {
        ConstructorPlan {
            params: self.params,
            proxy: Arc::new(InitProxy { init: self.init }),
            members: self.members,
        }
    }
}

struct InitProxy<T> {
    init: Init<T>,
}

impl<T: Send + Sync + 'static> ConstructionProxy for InitProxy<T> {
    fn new_instance(&self, args: &mut Arguments) -> Result<AnyInstance, BoxError> {
        (self.init)(args).map(|value| erase(Arc::new(value)))
    }
}

/// Type-erased constructor, ready to run.
#[derive(Clone)]
pub(crate) struct ConstructorPlan {
    pub(crate) params: Vec<Dependency>,
    pub(crate) proxy: Arc<dyn ConstructionProxy>,
    pub(crate) members: Vec<MemberInjector>,
}

impl ConstructorPlan {
    /// Initializer parameters, then members.
    pub(crate) fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.params
            .iter()
            .chain(self.members.iter().map(|member| &member.dependency))
    }

    /// Same plan with `interceptors` wrapped around the proxy, first one
    /// innermost.
    pub(crate) fn intercepted(
        &self,
        key: &Key,
        interceptors: &[Arc<dyn ConstructionInterceptor>],
    ) -> Self {
        let proxy = interceptors
            .iter()
            .fold(self.proxy.clone(), |proxy, interceptor| {
                interceptor.intercept(key, proxy)
            });
        Self {
            proxy,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ConstructorPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorPlan")
            .field("params", &self.params)
            .field(
                "members",
                &self.members.iter().map(|m| m.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Plan of an [`Injectable`] type, as a plain function pointer for the
/// type catalog.
pub(crate) fn plan_of<T: Injectable>() -> ConstructorPlan {
    T::constructor().into_plan()
}
