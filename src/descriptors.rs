//! Binding descriptors for introspection and diagnostics.

use std::fmt;

use crate::binding::{Binding, BindingOrigin, Strategy};
use crate::environment::NodeId;
use crate::key::Key;
use crate::lifetime::Lifetime;

/// The kind of construction strategy behind a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Primary initializer plus member injection.
    Constructor,
    /// Delegation to another key.
    Linked(Key),
    /// Supplier callback.
    Supplier,
    /// Fixed instance.
    Instance,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Constructor => f.write_str("constructor"),
            StrategyKind::Linked(target) => write!(f, "linked to {}", target),
            StrategyKind::Supplier => f.write_str("supplier"),
            StrategyKind::Instance => f.write_str("instance"),
        }
    }
}

/// Binding descriptor for introspection and diagnostics
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, BindingOrigin, Key, Lifetime, StrategyKind};
///
/// trait Store: Send + Sync {}
/// struct MemoryStore;
/// impl Store for MemoryStore {}
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_instance(MemoryStore);
/// bindings.bind_linked::<dyn Store, MemoryStore>(|s| s);
/// bindings.bind_named_instance("database_port", 5432u32);
/// let injector = bindings.build().unwrap();
///
/// let store = injector.binding(&Key::of::<dyn Store>()).unwrap();
/// assert_eq!(store.kind, StrategyKind::Linked(Key::of::<MemoryStore>()));
/// assert_eq!(store.origin, BindingOrigin::Declared);
///
/// let port = injector.binding(&Key::named::<u32>("database_port")).unwrap();
/// assert_eq!(port.name(), Some("database_port"));
/// assert_eq!(port.lifetime, Lifetime::Transient);
/// ```
#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    pub key: Key,
    pub lifetime: Lifetime,
    pub kind: StrategyKind,
    pub origin: BindingOrigin,
    /// Environment that owns the binding.
    pub owner: NodeId,
    /// Set when the binding is visible here because a private child
    /// exposed it.
    pub exposed_by: Option<NodeId>,
}

impl BindingDescriptor {
    pub(crate) fn from_binding(binding: &Binding, found_at: NodeId) -> Self {
        let kind = match &binding.strategy {
            Strategy::Constructor(_) => StrategyKind::Constructor,
            Strategy::Linked { target, .. } => StrategyKind::Linked(*target),
            Strategy::Supplier(_) => StrategyKind::Supplier,
            Strategy::Instance(_) => StrategyKind::Instance,
        };
        let exposed_by = if binding.owner != found_at && binding.origin == BindingOrigin::Declared {
            Some(binding.owner)
        } else {
            None
        };
        Self {
            key: binding.key,
            lifetime: binding.lifetime.clone(),
            kind,
            origin: binding.origin,
            owner: binding.owner,
            exposed_by,
        }
    }

    /// The qualifier name, for named or assisted keys.
    pub fn name(&self) -> Option<&'static str> {
        match self.key.qualifier()? {
            crate::key::Qualifier::Named(name) | crate::key::Qualifier::Assisted(name) => {
                Some(name)
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.key.type_name()
    }

    pub fn is_just_in_time(&self) -> bool {
        self.origin == BindingOrigin::JustInTime
    }
}

impl fmt::Display for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} ({:?}, {})",
            self.key,
            self.lifetime.name(),
            self.kind,
            self.origin,
            self.owner
        )?;
        if let Some(child) = self.exposed_by {
            write!(f, " exposed by {}", child)?;
        }
        Ok(())
    }
}
