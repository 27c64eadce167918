//! Externally managed scopes (request, session, unit of work).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ScopePolicy, SingletonSlot};
use crate::binding::{Provider, Request};
use crate::error::DiError;
use crate::key::Key;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_WRAP_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_SCOPES: RefCell<Vec<Arc<ScopeInstance>>> = const { RefCell::new(Vec::new()) };
}

/// A scope whose instances are entered and left by the application.
///
/// Each call to [`enter`](Self::enter) opens a fresh [`ScopeInstance`] on the
/// current thread; bindings using this scope are created at most once per
/// scope instance. Another thread can join the same instance with
/// [`reenter`](Self::reenter).
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, ContextScope, DiError, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct RequestId(u64);
///
/// let request = ContextScope::new("request");
/// let mut bindings = BindingCollection::new();
/// bindings.bind_supplier::<RequestId, _>(Lifetime::custom(request.clone()), |_| Ok(RequestId(1)));
/// let injector = bindings.build().unwrap();
///
/// assert!(matches!(injector.get::<RequestId>(), Err(DiError::OutOfScope(_))));
///
/// let first = {
///     let _scope = request.enter();
///     let a = injector.get::<RequestId>().unwrap();
///     let b = injector.get::<RequestId>().unwrap();
///     assert!(Arc::ptr_eq(&a, &b));
///     a
/// };
///
/// let _scope = request.enter();
/// assert!(!Arc::ptr_eq(&first, &injector.get::<RequestId>().unwrap()));
/// ```
pub struct ContextScope {
    id: u64,
    name: &'static str,
}

impl ContextScope {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            name,
        })
    }

    /// Opens a new scope instance on this thread until the guard drops.
    pub fn enter(&self) -> ScopeGuard {
        let instance = Arc::new(ScopeInstance {
            scope: self.id,
            slots: Mutex::new(HashMap::new()),
        });
        tracing::trace!(scope = self.name, "entering scope");
        ScopeGuard::activate(instance)
    }

    /// Joins an existing scope instance on this thread until the guard drops.
    pub fn reenter(&self, instance: &Arc<ScopeInstance>) -> ScopeGuard {
        debug_assert_eq!(instance.scope, self.id);
        ScopeGuard::activate(instance.clone())
    }
}

/// Innermost active instance of scope `id` on this thread.
fn active_instance(id: u64) -> Option<Arc<ScopeInstance>> {
    ACTIVE_SCOPES.with(|active| {
        active
            .borrow()
            .iter()
            .rev()
            .find(|instance| instance.scope == id)
            .cloned()
    })
}

impl ScopePolicy for ContextScope {
    fn scope(&self, key: &Key, unscoped: Provider) -> Provider {
        let id = self.id;
        let key = *key;
        let token = NEXT_WRAP_TOKEN.fetch_add(1, Ordering::Relaxed);
        Arc::new(move |request: &Request<'_>| {
            let instance = active_instance(id).ok_or(DiError::OutOfScope(key))?;
            let slot = instance.slot(token, key);
            slot.get_or_compute(|| unscoped(request))
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("name", &self.name)
            .finish()
    }
}

/// The cache of one entered scope.
pub struct ScopeInstance {
    scope: u64,
    slots: Mutex<HashMap<u64, Arc<SingletonSlot>>>,
}

impl ScopeInstance {
    fn slot(&self, token: u64, key: Key) -> Arc<SingletonSlot> {
        self.slots
            .lock()
            .entry(token)
            .or_insert_with(|| Arc::new(SingletonSlot::new(key)))
            .clone()
    }

    /// Number of bindings that have been created in this instance.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps a scope instance active on the current thread.
///
/// Not `Send`: a guard must be dropped on the thread that entered.
pub struct ScopeGuard {
    instance: Arc<ScopeInstance>,
    _not_send: PhantomData<*const ()>,
}

impl ScopeGuard {
    fn activate(instance: Arc<ScopeInstance>) -> Self {
        ACTIVE_SCOPES.with(|active| active.borrow_mut().push(instance.clone()));
        Self {
            instance,
            _not_send: PhantomData,
        }
    }

    /// The entered instance, for handing to [`ContextScope::reenter`] on
    /// another thread.
    pub fn instance(&self) -> &Arc<ScopeInstance> {
        &self.instance
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let _ = ACTIVE_SCOPES.try_with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active
                .iter()
                .rposition(|instance| Arc::ptr_eq(instance, &self.instance))
            {
                active.remove(pos);
            }
        });
    }
}
