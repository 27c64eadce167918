//! Bindings and the object builder.
//!
//! A [`Binding`] pairs a key with one construction [`Strategy`] and a
//! [`Lifetime`]. At creation time the strategy is turned into an unscoped
//! [`Provider`] and then decorated by the lifetime's scope policy; resolving
//! the binding is a single call to that provider.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::constructor::{Arguments, ConstructorPlan};
use crate::dependency::Dependency;
use crate::environment::{EnvironmentTree, NodeId, ResolverContext};
use crate::error::{BoxError, DiError, DiResult, InjectionSite};
use crate::internal::{enter, Entry};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::Provision;

/// Type-erased instance. Always holds an `Arc<T>` for the binding's key type,
/// so concrete types and trait objects share one representation.
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Converts an instance of one key's type into another's (e.g. an upcast).
pub(crate) type Adapter = Arc<dyn Fn(AnyInstance) -> DiResult<AnyInstance> + Send + Sync>;

pub(crate) type SupplierFn =
    Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> Result<AnyInstance, BoxError> + Send + Sync>;

/// A (possibly scoped) source of instances for one binding.
pub type Provider = Arc<dyn for<'a> Fn(&Request<'a>) -> DiResult<Provision> + Send + Sync>;

#[inline]
pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyInstance {
    Arc::new(value)
}

#[inline]
pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    instance: &AnyInstance,
    key: &Key,
) -> DiResult<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(*key))
}

/// Builds an adapter from a typed conversion.
pub(crate) fn adapter<S, T>(source: Key, convert: fn(Arc<S>) -> Arc<T>) -> Adapter
where
    S: ?Sized + Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(move |instance| Ok(erase(convert(downcast::<S>(&instance, &source)?))))
}

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique binding identity; construction contexts are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BindingId(u64);

impl BindingId {
    pub(crate) fn next() -> Self {
        BindingId(NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One request flowing through a binding's provider.
///
/// Scope policies receive it and pass it on, untouched, to the unscoped
/// provider they decorate.
pub struct Request<'a> {
    pub(crate) tree: &'a Arc<EnvironmentTree>,
    pub(crate) dependency: Dependency,
}

impl<'a> Request<'a> {
    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn key(&self) -> Key {
        self.dependency.key()
    }

    fn allows_placeholder(&self) -> bool {
        self.dependency.is_deferred() && self.tree.options().circular_placeholders
    }
}

/// How a binding produces its instances.
#[derive(Clone)]
pub(crate) enum Strategy {
    /// Primary initializer plus member injection.
    Constructor(Arc<ConstructorPlan>),
    /// Delegation to another key.
    Linked { target: Key, adapter: Adapter },
    /// User callback.
    Supplier(SupplierFn),
    /// Fixed instance.
    Instance(AnyInstance),
}

impl Strategy {
    /// Statically known dependencies, in resolution order.
    pub(crate) fn dependencies(&self) -> Vec<Dependency> {
        match self {
            Strategy::Constructor(plan) => plan.dependencies().copied().collect(),
            Strategy::Linked { target, .. } => vec![Dependency::new(*target)],
            Strategy::Supplier(_) | Strategy::Instance(_) => Vec::new(),
        }
    }
}

/// How a binding came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOrigin {
    /// Declared in a binding collection.
    Declared,
    /// Synthesized on first request from the type's own description.
    JustInTime,
    /// Argument of a factory call.
    FactoryArgument,
    /// Product of a factory call.
    FactoryProduct,
}

pub(crate) struct Binding {
    pub(crate) id: BindingId,
    pub(crate) key: Key,
    pub(crate) owner: NodeId,
    pub(crate) strategy: Strategy,
    pub(crate) lifetime: Lifetime,
    pub(crate) origin: BindingOrigin,
    provider: Provider,
}

impl Binding {
    pub(crate) fn new(
        key: Key,
        owner: NodeId,
        strategy: Strategy,
        lifetime: Lifetime,
        origin: BindingOrigin,
    ) -> Arc<Self> {
        let id = BindingId::next();
        let unscoped = unscoped_provider(id, key, owner, &strategy);
        let provider = lifetime.scope(&key, unscoped);
        Arc::new(Self {
            id,
            key,
            owner,
            strategy,
            lifetime,
            origin,
            provider,
        })
    }

    #[inline]
    pub(crate) fn provide(&self, request: &Request<'_>) -> DiResult<Provision> {
        (self.provider)(request)
    }
}

fn unscoped_provider(id: BindingId, key: Key, owner: NodeId, strategy: &Strategy) -> Provider {
    match strategy.clone() {
        Strategy::Instance(instance) => {
            Arc::new(move |_: &Request<'_>| Ok(Provision::Ready(instance.clone())))
        }
        Strategy::Linked { target, adapter } => Arc::new(move |request: &Request<'_>| {
            let dependency = request.dependency.retarget(target);
            request
                .tree
                .resolve_delegate(owner, &dependency)?
                .map(&adapter, key)
        }),
        Strategy::Supplier(supplier) => {
            Arc::new(move |request: &Request<'_>| supply(request, id, key, owner, &supplier))
        }
        Strategy::Constructor(plan) => {
            Arc::new(move |request: &Request<'_>| construct(request, id, key, owner, &plan))
        }
    }
}

/// Runs a constructor strategy under the binding's construction context.
fn construct(
    request: &Request<'_>,
    id: BindingId,
    key: Key,
    owner: NodeId,
    plan: &ConstructorPlan,
) -> DiResult<Provision> {
    let guard = match enter(id, key, request.allows_placeholder())? {
        Entry::Fresh(guard) => guard,
        Entry::Reentrant(instance) => return Ok(Provision::Ready(instance)),
        Entry::Deferred(placeholder) => return Ok(Provision::Pending(placeholder)),
    };

    let mut values = Vec::with_capacity(plan.params.len());
    for dependency in &plan.params {
        values.push((*dependency, request.tree.resolve_in(owner, dependency)?));
    }
    let mut args = Arguments::new(values);
    let instance = plan
        .proxy
        .new_instance(&mut args)
        .map_err(|cause| wrap_failure(key, InjectionSite::Constructor, cause))?;

    guard.constructed(&instance);

    for member in &plan.members {
        // A missing optional member is left untouched.
        if let Some(value) = request.tree.resolve_in(owner, &member.dependency)? {
            (member.inject)(&instance, value)
                .map_err(|cause| wrap_failure(key, InjectionSite::Member(member.name), cause))?;
        }
    }

    Ok(Provision::Ready(instance))
}

/// Runs a supplier under the binding's construction context.
fn supply(
    request: &Request<'_>,
    id: BindingId,
    key: Key,
    owner: NodeId,
    supplier: &SupplierFn,
) -> DiResult<Provision> {
    let guard = match enter(id, key, request.allows_placeholder())? {
        Entry::Fresh(guard) => guard,
        Entry::Reentrant(instance) => return Ok(Provision::Ready(instance)),
        Entry::Deferred(placeholder) => return Ok(Provision::Pending(placeholder)),
    };

    let context = ResolverContext::new(request.tree, owner);
    let instance =
        supplier(&context).map_err(|cause| wrap_failure(key, InjectionSite::Supplier, cause))?;
    guard.constructed(&instance);
    Ok(Provision::Ready(instance))
}

/// Wraps a user failure, passing resolution errors through unchanged.
pub(crate) fn wrap_failure(key: Key, site: InjectionSite, cause: BoxError) -> DiError {
    match cause.downcast::<DiError>() {
        Ok(err) => *err,
        Err(cause) => DiError::construction(key, site, cause),
    }
}
