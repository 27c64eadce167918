//! Placeholder references used to break construction cycles.
//!
//! When a binding is requested while it is still being constructed further
//! up the same call stack, and the requesting edge allows it, the engine
//! hands out a [`Placeholder`] instead of failing. A placeholder is a shared
//! write-once cell: it is filled exactly once, the moment the real instance
//! is created, and every holder observes that same instance from then on.
//!
//! Typed code sees placeholders through [`Deferred<T>`].

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::binding::{downcast, Adapter, AnyInstance};
use crate::error::DiResult;
use crate::key::Key;

/// Type-erased forwarding cell handed out for a cyclic edge.
#[derive(Clone)]
pub struct Placeholder {
    key: Key,
    cell: Arc<OnceCell<AnyInstance>>,
    adapters: Vec<Adapter>,
}

impl Placeholder {
    pub(crate) fn new(key: Key) -> Self {
        Self {
            key,
            cell: Arc::new(OnceCell::new()),
            adapters: Vec::new(),
        }
    }

    /// The cell the construction context fills once the instance exists.
    pub(crate) fn cell(&self) -> Arc<OnceCell<AnyInstance>> {
        self.cell.clone()
    }

    /// Applies `adapter` to the value once it arrives; the placeholder now
    /// stands for `key`.
    pub(crate) fn map(mut self, adapter: Adapter, key: Key) -> Self {
        self.adapters.push(adapter);
        self.key = key;
        self
    }

    /// Key of the value this placeholder stands for.
    pub fn key(&self) -> Key {
        self.key
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The real instance, or `None` while construction is still running.
    pub fn instance(&self) -> Option<DiResult<AnyInstance>> {
        let raw = self.cell.get()?.clone();
        Some(
            self.adapters
                .iter()
                .try_fold(raw, |value, adapter| adapter(value)),
        )
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// What a construction strategy yields: a real instance, or a placeholder
/// for an instance still under construction on this call stack.
#[derive(Clone, Debug)]
pub enum Provision {
    Ready(AnyInstance),
    Pending(Placeholder),
}

impl Provision {
    pub fn is_ready(&self) -> bool {
        matches!(self, Provision::Ready(_))
    }

    pub fn into_ready(self) -> Option<AnyInstance> {
        match self {
            Provision::Ready(instance) => Some(instance),
            Provision::Pending(_) => None,
        }
    }

    pub(crate) fn map(self, adapter: &Adapter, key: Key) -> DiResult<Provision> {
        match self {
            Provision::Ready(instance) => adapter(instance).map(Provision::Ready),
            Provision::Pending(placeholder) => {
                Ok(Provision::Pending(placeholder.map(adapter.clone(), key)))
            }
        }
    }
}

/// A dependency that may still be under construction.
///
/// Obtained from [`Resolver::get_deferred`](crate::Resolver::get_deferred),
/// [`Arguments::next_deferred`](crate::Arguments::next_deferred) or a
/// deferred member. If the requested binding was idle the value is available
/// immediately; if it was mid-construction on the current call stack, the
/// value becomes available as soon as the real instance is created, which is
/// always before the outermost resolution returns.
///
/// # Panics
///
/// Dereferencing a `Deferred` whose instance does not exist yet (i.e. from
/// inside the constructor that is part of the cycle) panics. Store it and
/// use it later instead.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, Constructor, Deferred, Injectable, Resolver};
/// use std::sync::Arc;
///
/// struct Parent { child: Arc<Child> }
/// struct Child { parent: Deferred<Parent> }
///
/// impl Injectable for Parent {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|args| Ok(Parent { child: args.next()? })).param::<Child>()
///     }
/// }
/// impl Injectable for Child {
///     fn constructor() -> Constructor<Self> {
///         Constructor::new(|args| Ok(Child { parent: args.next_deferred()? }))
///             .deferred_param::<Parent>()
///     }
/// }
///
/// let mut bindings = BindingCollection::new();
/// bindings.describe::<Parent>().describe::<Child>();
/// let injector = bindings.build().unwrap();
///
/// let parent = injector.get::<Parent>().unwrap();
/// let back = parent.child.parent.get().unwrap();
/// assert!(Arc::ptr_eq(&parent, &back));
/// ```
pub struct Deferred<T: ?Sized> {
    source: Source<T>,
}

enum Source<T: ?Sized> {
    Ready(Arc<T>),
    Pending {
        placeholder: Placeholder,
        typed: OnceCell<Arc<T>>,
    },
}

impl<T: ?Sized + Send + Sync + 'static> Deferred<T> {
    pub(crate) fn from_provision(provision: Provision, key: &Key) -> DiResult<Self> {
        let source = match provision {
            Provision::Ready(instance) => Source::Ready(downcast::<T>(&instance, key)?),
            Provision::Pending(placeholder) => Source::Pending {
                placeholder,
                typed: OnceCell::new(),
            },
        };
        Ok(Self { source })
    }

    /// Wraps an already available value.
    pub fn ready(value: Arc<T>) -> Self {
        Self {
            source: Source::Ready(value),
        }
    }

    /// The real instance, or `None` if it is not constructed yet.
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.source {
            Source::Ready(value) => Some(value.clone()),
            Source::Pending { placeholder, typed } => {
                if let Some(value) = typed.get() {
                    return Some(value.clone());
                }
                let value = match placeholder.instance()? {
                    Ok(instance) => downcast::<T>(&instance, &placeholder.key()),
                    Err(err) => Err(err),
                };
                match value {
                    Ok(value) => Some(typed.get_or_init(|| value).clone()),
                    Err(err) => {
                        tracing::error!(
                            key = %placeholder.key(),
                            error = %err,
                            "deferred reference holds an incompatible instance"
                        );
                        None
                    }
                }
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        match &self.source {
            Source::Ready(_) => true,
            Source::Pending { placeholder, .. } => placeholder.is_resolved(),
        }
    }

    /// Returns true if this reference was handed out to break a cycle.
    pub fn was_deferred(&self) -> bool {
        matches!(self.source, Source::Pending { .. })
    }

    fn try_borrow(&self) -> Option<&T> {
        match &self.source {
            Source::Ready(value) => Some(&**value),
            Source::Pending { typed, .. } => {
                if typed.get().is_none() {
                    self.get()?;
                }
                typed.get().map(|value| &**value)
            }
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Deref for Deferred<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.try_borrow() {
            Some(value) => value,
            None => panic!(
                "deferred reference to {} used before its construction finished",
                std::any::type_name::<T>()
            ),
        }
    }
}

impl<T: ?Sized> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            Source::Ready(value) => Source::Ready(value.clone()),
            Source::Pending { placeholder, typed } => Source::Pending {
                placeholder: placeholder.clone(),
                typed: typed.clone(),
            },
        };
        Self { source }
    }
}

impl<T: ?Sized> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.source {
            Source::Ready(_) => "ready",
            Source::Pending { placeholder, .. } if placeholder.is_resolved() => "resolved",
            Source::Pending { .. } => "pending",
        };
        f.debug_struct("Deferred")
            .field("type", &std::any::type_name::<T>())
            .field("state", &state)
            .finish()
    }
}
