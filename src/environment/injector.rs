//! The public handle of an environment.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::tree::{EnvironmentTree, NodeId, NodeKind, NodeLease, Via};
use crate::binding::{erase, wrap_failure};
use crate::collection::BindingCollection;
use crate::config::InjectorOptions;
use crate::constructor::Injectable;
use crate::deferred::Provision;
use crate::dependency::Dependency;
use crate::descriptors::BindingDescriptor;
use crate::error::{DiResult, InjectionSite};
use crate::key::Key;
use crate::traits::ResolverCore;

/// Handle to one environment of an injector.
///
/// Cloning is cheap; all clones address the same environment. A child
/// injector created with [`create_child`](Self::create_child) lives as long
/// as some handle to it (or to one of its own children) does.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, Resolver};
///
/// struct Config(&'static str);
/// struct Session(u32);
///
/// let mut root = BindingCollection::new();
/// root.bind_instance(Config("prod"));
/// let injector = root.build().unwrap();
///
/// let mut request = BindingCollection::new();
/// request.bind_instance(Session(7));
/// let child = injector.create_child(request).unwrap();
///
/// // The child sees its own bindings and its parent's; the parent only its own.
/// assert_eq!(child.get::<Config>().unwrap().0, "prod");
/// assert_eq!(child.get::<Session>().unwrap().0, 7);
/// assert!(injector.get::<Session>().is_err());
/// ```
#[derive(Clone)]
pub struct Injector {
    pub(crate) tree: Arc<EnvironmentTree>,
    pub(crate) node: NodeId,
    lease: Option<Arc<NodeLease>>,
}

impl Injector {
    pub(crate) fn root(tree: Arc<EnvironmentTree>, node: NodeId) -> Self {
        Self {
            tree,
            node,
            lease: None,
        }
    }

    pub(crate) fn leased(tree: Arc<EnvironmentTree>, node: NodeId, lease: Arc<NodeLease>) -> Self {
        Self {
            tree,
            node,
            lease: Some(lease),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn options(&self) -> &InjectorOptions {
        self.tree.options()
    }

    /// The parent environment, if any.
    pub fn parent(&self) -> Option<Injector> {
        let parent = self.tree.node(self.node).ok()?.parent?;
        Some(Self {
            tree: self.tree.clone(),
            node: parent,
            lease: self.lease.as_ref().and_then(|lease| lease.parent.clone()),
        })
    }

    /// Assembles `bindings` into a new environment below this one.
    ///
    /// The child may not re-declare a key already bound explicitly in this
    /// environment or its ancestors.
    pub fn create_child(&self, bindings: BindingCollection) -> DiResult<Injector> {
        let node =
            crate::collection::assemble(&self.tree, Some(self.node), NodeKind::Child, bindings)?;
        let lease = Arc::new(NodeLease::new(self.tree.clone(), node, self.lease.clone()));
        Ok(Self::leased(self.tree.clone(), node, lease))
    }

    /// The binding `key` resolves to from here, creating a just-in-time
    /// binding if needed.
    pub fn binding(&self, key: &Key) -> Option<BindingDescriptor> {
        let chain = self.tree.chain(self.node).ok()?;
        if let Some((node, binding)) = chain
            .iter()
            .find_map(|node| node.explicit_binding(key).map(|b| (node.id, b)))
        {
            return Some(BindingDescriptor::from_binding(&binding, node));
        }
        let binding = self
            .tree
            .find_binding(self.node, key, Via::Direct)
            .ok()??;
        Some(BindingDescriptor::from_binding(&binding, binding.owner))
    }

    /// Every binding visible from here, explicit and just-in-time, sorted by
    /// key. Bindings shadowed by a nearer environment are left out.
    pub fn bindings(&self) -> Vec<BindingDescriptor> {
        let chain = match self.tree.chain(self.node) {
            Ok(chain) => chain,
            Err(_) => return Vec::new(),
        };
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();
        for node in &chain {
            let explicit: Vec<_> = node.explicit.read().values().cloned().collect();
            for binding in explicit {
                if seen.insert(binding.key) {
                    descriptors.push(BindingDescriptor::from_binding(&binding, node.id));
                }
            }
        }
        for node in &chain {
            for binding in node.jit_bindings() {
                if seen.insert(binding.key) {
                    descriptors.push(BindingDescriptor::from_binding(&binding, node.id));
                }
            }
        }
        descriptors.sort_by_key(|descriptor| descriptor.key);
        descriptors
    }

    /// Runs the member injection points of `T` on an existing instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_inject::{BindingCollection, Constructor, Injectable};
    /// use once_cell::sync::OnceCell;
    /// use std::sync::Arc;
    ///
    /// struct Greeter { name: OnceCell<Arc<String>> }
    ///
    /// impl Injectable for Greeter {
    ///     fn constructor() -> Constructor<Self> {
    ///         Constructor::new(|_| Ok(Greeter { name: OnceCell::new() }))
    ///             .member::<String, _>("name", |g, name| {
    ///                 let _ = g.name.set(name);
    ///                 Ok(())
    ///             })
    ///     }
    /// }
    ///
    /// let mut bindings = BindingCollection::new();
    /// bindings.bind_instance("world".to_string());
    /// let injector = bindings.build().unwrap();
    ///
    /// let greeter = Arc::new(Greeter { name: OnceCell::new() });
    /// injector.inject_members(&greeter).unwrap();
    /// assert_eq!(greeter.name.get().unwrap().as_str(), "world");
    /// ```
    pub fn inject_members<T: Injectable>(&self, instance: &Arc<T>) -> DiResult<()> {
        let key = Key::of::<T>();
        let plan = T::constructor().into_plan();
        let erased = erase(instance.clone());
        for member in &plan.members {
            if let Some(value) = self.tree.resolve_in(self.node, &member.dependency)? {
                (member.inject)(&erased, value)
                    .map_err(|cause| wrap_failure(key, InjectionSite::Member(member.name), cause))?;
            }
        }
        Ok(())
    }

    /// Human-readable dump of every environment from here to the root.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let chain = match self.tree.chain(self.node) {
            Ok(chain) => chain,
            Err(err) => return err.to_string(),
        };
        for node in &chain {
            let _ = writeln!(out, "{} ({:?})", node.id, node.kind);
            let mut explicit: Vec<_> = node.explicit.read().values().cloned().collect();
            explicit.sort_by_key(|binding| binding.key);
            for binding in explicit {
                let _ = writeln!(out, "  {}", BindingDescriptor::from_binding(&binding, node.id));
            }
            let mut jit = node.jit_bindings();
            jit.sort_by_key(|binding| binding.key);
            for binding in jit {
                let _ = writeln!(out, "  {}", BindingDescriptor::from_binding(&binding, node.id));
            }
        }
        out
    }
}

impl ResolverCore for Injector {
    fn resolve_dependency(&self, dependency: &Dependency) -> DiResult<Option<Provision>> {
        self.tree.resolve_in(self.node, dependency)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("node", &self.node)
            .field("catalog", &self.tree.catalog.len())
            .finish()
    }
}
