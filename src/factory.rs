//! Assisted construction through factories.
//!
//! A factory produces instances from a mix of runtime arguments and injected
//! dependencies. Each call spawns a single-use environment below the one the
//! factory was bound in, binds the call's arguments there as
//! `Assisted`-qualified instances, binds the produced key to its
//! implementation and resolves it. The environment is discarded when the call
//! returns, so arguments never leak into later calls, while singletons from
//! enclosing environments are shared by every product.
//!
//! Every method of a factory is checked while the injector is assembled:
//! with stand-in arguments bound, the produced key must be resolvable end to
//! end.

use std::any::TypeId;
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use crate::binding::{
    adapter, downcast, erase, Adapter, AnyInstance, Binding, BindingOrigin, Strategy,
};
use crate::constructor::{plan_of, ConstructorPlan, Injectable};
use crate::deferred::Provision;
use crate::dependency::Dependency;
use crate::environment::tree::{interceptors_of, NodeLease};
use crate::environment::{EnvironmentTree, NodeId, NodeKind};
use crate::error::{DiError, SharedError};
use crate::internal::construction::current_chain;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::validation;

type RethrowCheck = fn(&(dyn StdError + Send + Sync + 'static)) -> bool;

fn is_error<E: StdError + 'static>(error: &(dyn StdError + Send + Sync + 'static)) -> bool {
    error.is::<E>()
}

/// How a factory method binds its product in the call environment.
#[derive(Clone)]
enum Product {
    /// The produced key is built by its own constructor.
    Direct(fn() -> ConstructorPlan),
    /// The produced key delegates to a concrete implementation.
    Implemented {
        concrete: Key,
        plan: fn() -> ConstructorPlan,
        adapter: Adapter,
    },
}

/// One method of a factory.
///
/// # Examples
///
/// ```
/// use ferrous_inject::FactoryMethod;
///
/// struct Payment;
/// # impl ferrous_inject::Injectable for Payment {
/// #     fn constructor() -> ferrous_inject::Constructor<Self> {
/// #         ferrous_inject::Constructor::new(|_| Ok(Payment))
/// #     }
/// # }
///
/// let method = FactoryMethod::new::<Payment>("create")
///     .param::<u64>()
///     .assisted_param::<String>("memo");
/// assert_eq!(method.name(), "create");
/// assert_eq!(method.arity(), 2);
/// ```
#[derive(Clone)]
pub struct FactoryMethod {
    name: &'static str,
    produced: Key,
    params: Vec<Key>,
    product: Product,
    rethrows: Vec<(&'static str, RethrowCheck)>,
}

impl FactoryMethod {
    /// A method producing `R` with `R`'s own constructor.
    pub fn new<R: Injectable>(name: &'static str) -> Self {
        Self {
            name,
            produced: Key::of::<R>(),
            params: Vec::new(),
            product: Product::Direct(plan_of::<R>),
            rethrows: Vec::new(),
        }
    }

    /// A method producing `R` (typically a trait object) implemented by `I`.
    pub fn returning<R, I>(name: &'static str, upcast: fn(Arc<I>) -> Arc<R>) -> Self
    where
        R: ?Sized + Send + Sync + 'static,
        I: Injectable,
    {
        let concrete = Key::of::<I>();
        Self {
            name,
            produced: Key::of::<R>(),
            params: Vec::new(),
            product: Product::Implemented {
                concrete,
                plan: plan_of::<I>,
                adapter: adapter(concrete, upcast),
            },
            rethrows: Vec::new(),
        }
    }

    /// Appends a parameter bound as `Assisted("")`.
    pub fn param<P: ?Sized + 'static>(self) -> Self {
        self.assisted_param::<P>("")
    }

    /// Appends a parameter bound as `Assisted(name)`, for methods taking
    /// several arguments of one type.
    pub fn assisted_param<P: ?Sized + 'static>(mut self, name: &'static str) -> Self {
        self.params.push(Key::assisted::<P>(name));
        self
    }

    /// Declares that a failure caused by an `E` reaches the caller as is.
    pub fn rethrows<E: StdError + 'static>(mut self) -> Self {
        self.rethrows.push((std::any::type_name::<E>(), is_error::<E>));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn produced(&self) -> Key {
        self.produced
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Keys bound in the call environment besides the arguments.
    fn product_keys(&self) -> Vec<Key> {
        match &self.product {
            Product::Direct(_) => vec![self.produced],
            Product::Implemented { concrete, .. } => vec![self.produced, *concrete],
        }
    }

    fn duplicate_param(&self) -> Option<Key> {
        let mut seen = HashSet::new();
        self.params.iter().copied().find(|key| !seen.insert(*key))
    }

    /// Binds the produced key (and the concrete implementation, if any) in
    /// the call environment `node`.
    fn bind_product(&self, tree: &EnvironmentTree, node: NodeId) -> Result<(), DiError> {
        let chain = tree.chain(node)?;
        let interceptors = interceptors_of(&chain);
        let constructor = |key: Key, plan: fn() -> ConstructorPlan| {
            let plan = plan();
            let plan = if interceptors.is_empty() {
                plan
            } else {
                plan.intercepted(&key, &interceptors)
            };
            Binding::new(
                key,
                node,
                Strategy::Constructor(Arc::new(plan)),
                Lifetime::Transient,
                BindingOrigin::FactoryProduct,
            )
        };

        let mut explicit = chain[0].explicit.write();
        match &self.product {
            Product::Direct(plan) => {
                explicit.insert(self.produced, constructor(self.produced, *plan));
            }
            Product::Implemented {
                concrete,
                plan,
                adapter,
            } => {
                explicit.insert(*concrete, constructor(*concrete, *plan));
                let linked = Strategy::Linked {
                    target: *concrete,
                    adapter: adapter.clone(),
                };
                explicit.insert(
                    self.produced,
                    Binding::new(
                        self.produced,
                        node,
                        linked,
                        Lifetime::Transient,
                        BindingOrigin::FactoryProduct,
                    ),
                );
            }
        }
        Ok(())
    }

    /// Unwraps a declared failure, or wraps everything else.
    fn classify(&self, error: DiError) -> FactoryError {
        if let DiError::Construction { cause, .. } = &error {
            if let Some((name, _)) = self.rethrows.iter().find(|(_, check)| check(cause.as_ref())) {
                tracing::debug!(
                    method = self.name,
                    error = name,
                    "rethrowing declared factory failure"
                );
                return FactoryError::Declared(cause.clone());
            }
        }
        FactoryError::Provision(error)
    }
}

impl fmt::Debug for FactoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryMethod")
            .field("name", &self.name)
            .field("produced", &self.produced)
            .field("params", &self.params)
            .field("rethrows", &self.rethrows.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish()
    }
}

/// The methods of a factory, identified by the marker type `F`.
///
/// `F` is usually the trait the application implements on [`Factory<F>`]
/// to get a typed facade.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{
///     BindingCollection, Constructor, Factory, FactoryArgs, FactoryError, FactoryMethod,
///     FactorySpec, Injectable, Lifetime, Resolver,
/// };
/// use std::sync::Arc;
///
/// struct Gateway;
/// struct Payment { amount: u64, gateway: Arc<Gateway> }
///
/// impl Injectable for Payment {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|args| {
///             Ok(Payment { amount: *args.next::<u64>()?, gateway: args.next()? })
///         })
///         .assisted_param::<u64>("")
///         .param::<Gateway>()
///     }
/// }
///
/// trait PaymentFactory: Send + Sync {
///     fn create(&self, amount: u64) -> Result<Arc<Payment>, FactoryError>;
/// }
///
/// impl PaymentFactory for Factory<dyn PaymentFactory> {
///     fn create(&self, amount: u64) -> Result<Arc<Payment>, FactoryError> {
///         self.invoke("create", FactoryArgs::new().arg(amount))
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_supplier::<Gateway, _>(Lifetime::Singleton, |_| Ok(Gateway));
/// bindings.bind_factory(
///     FactorySpec::<dyn PaymentFactory>::new()
///         .method(FactoryMethod::new::<Payment>("create").param::<u64>()),
/// );
/// let injector = bindings.build().unwrap();
///
/// let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();
/// let a = factory.create(10).unwrap();
/// let b = factory.create(20).unwrap();
/// assert_eq!((a.amount, b.amount), (10, 20));
/// assert!(Arc::ptr_eq(&a.gateway, &b.gateway));
/// ```
pub struct FactorySpec<F: ?Sized> {
    methods: Vec<FactoryMethod>,
    _marker: PhantomData<fn() -> Box<F>>,
}

impl<F: ?Sized + 'static> FactorySpec<F> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn method(mut self, method: FactoryMethod) -> Self {
        self.methods.push(method);
        self
    }

    pub(crate) fn into_decl(self) -> FactoryDecl {
        FactoryDecl {
            key: Key::of::<Factory<F>>(),
            methods: self.methods.into(),
            make: make_factory::<F>,
        }
    }
}

impl<F: ?Sized + 'static> Default for FactorySpec<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// A factory waiting for its environment to exist.
pub(crate) struct FactoryDecl {
    pub(crate) key: Key,
    pub(crate) methods: Arc<[FactoryMethod]>,
    make: fn(Weak<EnvironmentTree>, NodeId, Arc<[FactoryMethod]>) -> AnyInstance,
}

impl FactoryDecl {
    pub(crate) fn instance(&self, tree: &Arc<EnvironmentTree>, node: NodeId) -> AnyInstance {
        (self.make)(Arc::downgrade(tree), node, self.methods.clone())
    }
}

fn make_factory<F: ?Sized + 'static>(
    tree: Weak<EnvironmentTree>,
    node: NodeId,
    methods: Arc<[FactoryMethod]>,
) -> AnyInstance {
    erase(Arc::new(Factory::<F> {
        tree,
        node,
        methods,
        _marker: PhantomData,
    }))
}

/// Checks every method of a factory bound at `node`.
pub(crate) fn validate_factory(
    tree: &EnvironmentTree,
    node: NodeId,
    decl: &FactoryDecl,
) -> Vec<DiError> {
    let mut errors = Vec::new();
    for method in decl.methods.iter() {
        if let Some(key) = method.duplicate_param() {
            errors.push(DiError::Configuration(format!(
                "factory method `{}` of {} has more than one parameter bound to {}; \
                 give them distinct assisted names",
                method.name,
                decl.key,
                key
            )));
            continue;
        }
        let scratch =
            tree.add_node(Some(node), NodeKind::FactoryCall, Vec::new(), Observers::new());
        {
            let mut explicit = scratch.explicit.write();
            for key in &method.params {
                let stand_in = Binding::new(
                    *key,
                    scratch.id,
                    Strategy::Instance(erase(Arc::new(()))),
                    Lifetime::Transient,
                    BindingOrigin::FactoryArgument,
                );
                explicit.insert(*key, stand_in);
            }
        }
        let checked = method.bind_product(tree, scratch.id).and_then(|()| {
            method
                .product_keys()
                .into_iter()
                .try_for_each(|key| validation::check_key(tree, scratch.id, key))
        });
        if let Err(err) = checked {
            tracing::debug!(
                method = method.name,
                error = %err,
                "factory method cannot be satisfied"
            );
            errors.push(err);
        }
        tree.remove_subtree(scratch.id);
    }
    errors
}

/// Arguments of one factory call, in parameter order.
#[derive(Default)]
pub struct FactoryArgs {
    values: Vec<(TypeId, &'static str, AnyInstance)>,
}

impl FactoryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.arg_arc(Arc::new(value))
    }

    pub fn arg_arc<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.values
            .push((TypeId::of::<T>(), std::any::type_name::<T>(), erase(value)));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Failure of a factory call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FactoryError {
    /// A failure of a type the method declared with
    /// [`FactoryMethod::rethrows`], unwrapped.
    #[error("{0}")]
    Declared(SharedError),
    /// Any other failure.
    #[error(transparent)]
    Provision(#[from] DiError),
}

impl FactoryError {
    /// The declared failure, if it is an `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            FactoryError::Declared(cause) => cause.downcast_ref::<E>(),
            FactoryError::Provision(_) => None,
        }
    }
}

/// A bound factory; resolve it as `Factory<F>`.
pub struct Factory<F: ?Sized> {
    tree: Weak<EnvironmentTree>,
    node: NodeId,
    methods: Arc<[FactoryMethod]>,
    _marker: PhantomData<fn() -> Box<F>>,
}

impl<F: ?Sized> Factory<F> {
    pub fn methods(&self) -> impl Iterator<Item = &FactoryMethod> {
        self.methods.iter()
    }

    /// Calls `method` with `args` and returns its product.
    pub fn invoke<R>(&self, method: &str, args: FactoryArgs) -> Result<Arc<R>, FactoryError>
    where
        R: ?Sized + Send + Sync + 'static,
    {
        let tree = self.tree.upgrade().ok_or_else(|| {
            DiError::Configuration("factory used after its injector was dropped".into())
        })?;
        let method = self
            .methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| DiError::Configuration(format!("factory has no method `{}`", method)))?;
        check_args(method, &args)?;

        let scratch = tree.add_node(
            Some(self.node),
            NodeKind::FactoryCall,
            Vec::new(),
            Observers::new(),
        );
        let _discard = NodeLease::new(tree.clone(), scratch.id, None);
        tracing::trace!(method = method.name, node = %scratch.id, "factory call");
        {
            let mut explicit = scratch.explicit.write();
            for (key, (_, _, value)) in method.params.iter().zip(args.values) {
                let binding = Binding::new(
                    *key,
                    scratch.id,
                    Strategy::Instance(value),
                    Lifetime::Transient,
                    BindingOrigin::FactoryArgument,
                );
                explicit.insert(*key, binding);
            }
        }
        method.bind_product(&tree, scratch.id)?;

        let produced = method.produced;
        match tree.resolve_in(scratch.id, &Dependency::new(produced)) {
            Ok(Some(Provision::Ready(instance))) => Ok(downcast::<R>(&instance, &produced)?),
            Ok(Some(Provision::Pending(_))) => {
                Err(DiError::unexpected_placeholder(produced).into())
            }
            Ok(None) => Err(DiError::MissingBinding {
                key: produced,
                chain: current_chain(),
            }
            .into()),
            Err(err) => Err(method.classify(err)),
        }
    }
}

fn check_args(method: &FactoryMethod, args: &FactoryArgs) -> Result<(), DiError> {
    if args.len() != method.params.len() {
        return Err(DiError::Configuration(format!(
            "factory method `{}` takes {} argument(s), got {}",
            method.name,
            method.params.len(),
            args.len()
        )));
    }
    let pairs = method.params.iter().zip(&args.values);
    for (index, (key, (type_id, type_name, _))) in pairs.enumerate() {
        if key.type_id() != *type_id {
            return Err(DiError::Configuration(format!(
                "argument {} of factory method `{}` is a {}, expected {}",
                index,
                method.name,
                type_name,
                key.type_name()
            )));
        }
    }
    Ok(())
}

impl<F: ?Sized> fmt::Debug for Factory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("type", &std::any::type_name::<F>())
            .field("node", &self.node)
            .field("methods", &self.methods.iter().map(|m| m.name).collect::<Vec<_>>())
            .finish()
    }
}
