//! The environment tree.
//!
//! Every environment (the root injector, private children, runtime child
//! injectors and single-use factory-call environments) is a node in one
//! arena owned by the [`EnvironmentTree`]. Nodes only know their parent;
//! ancestors never hold references to descendants, so discarding a child
//! is just removing its entry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use super::catalog::{CatalogEntry, TypeCatalog};
use crate::binding::{Binding, BindingOrigin, Request, Strategy};
use crate::config::InjectorOptions;
use crate::constructor::ConstructionInterceptor;
use crate::dependency::Dependency;
use crate::error::{DiError, DiResult};
use crate::internal::construction::current_chain;
use crate::internal::ChainGuard;
use crate::key::Key;
use crate::observer::Observers;
use crate::validation;
use crate::Provision;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

/// What created an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    /// Installed with `BindingCollection::install_private`.
    Private,
    /// Created with `Injector::create_child`.
    Child,
    /// Single-use environment of one factory call (or its validation).
    FactoryCall,
}

pub(crate) struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    /// Declared bindings plus bindings exposed by private children.
    pub(crate) explicit: RwLock<HashMap<Key, Arc<Binding>>>,
    /// Keys this node promotes to its parent.
    pub(crate) exposed: RwLock<HashSet<Key>>,
    jit: Mutex<HashMap<Key, Arc<Binding>>>,
    pub(crate) interceptors: Vec<Arc<dyn ConstructionInterceptor>>,
    /// Notified of resolutions requested from this node or below it.
    observers: Observers,
}

impl Node {
    pub(crate) fn explicit_binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.explicit.read().get(key).cloned()
    }

    pub(crate) fn jit_binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.jit.lock().get(key).cloned()
    }

    pub(crate) fn jit_bindings(&self) -> Vec<Arc<Binding>> {
        self.jit.lock().values().cloned().collect()
    }
}

/// How a key reached the lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Via {
    /// Requested by a caller or a constructor parameter.
    Direct,
    /// Target of a linked binding.
    Delegation,
}

pub(crate) struct EnvironmentTree {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
    pub(crate) catalog: TypeCatalog,
    options: InjectorOptions,
}

impl EnvironmentTree {
    pub(crate) fn new(options: InjectorOptions) -> Arc<Self> {
        Arc::new(Self {
            nodes: RwLock::new(HashMap::new()),
            catalog: TypeCatalog::default(),
            options,
        })
    }

    pub(crate) fn options(&self) -> &InjectorOptions {
        &self.options
    }

    /// Creates an empty node under `parent`.
    pub(crate) fn add_node(
        &self,
        parent: Option<NodeId>,
        kind: NodeKind,
        interceptors: Vec<Arc<dyn ConstructionInterceptor>>,
        observers: Observers,
    ) -> Arc<Node> {
        let node = Arc::new(Node {
            id: NodeId::next(),
            parent,
            kind,
            explicit: RwLock::new(HashMap::new()),
            exposed: RwLock::new(HashSet::new()),
            jit: Mutex::new(HashMap::new()),
            interceptors,
            observers,
        });
        self.nodes.write().insert(node.id, node.clone());
        tracing::trace!(node = %node.id, ?kind, "environment created");
        node
    }

    pub(crate) fn node(&self, id: NodeId) -> DiResult<Arc<Node>> {
        self.nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| DiError::Configuration(format!("{} has been discarded", id)))
    }

    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Removes `id` and every node below it.
    pub(crate) fn remove_subtree(&self, id: NodeId) {
        let mut nodes = self.nodes.write();
        let mut removed = HashSet::from([id]);
        nodes.remove(&id);
        loop {
            let orphans: Vec<NodeId> = nodes
                .values()
                .filter(|node| node.parent.map_or(false, |p| removed.contains(&p)))
                .map(|node| node.id)
                .collect();
            if orphans.is_empty() {
                break;
            }
            for orphan in orphans {
                nodes.remove(&orphan);
                removed.insert(orphan);
            }
        }
        tracing::trace!(node = %id, count = removed.len(), "environments discarded");
    }

    /// `id` followed by its ancestors, root last.
    pub(crate) fn chain(&self, id: NodeId) -> DiResult<Vec<Arc<Node>>> {
        let nodes = self.nodes.read();
        let mut chain = Vec::new();
        let mut next = Some(id);
        while let Some(current) = next {
            let node = nodes
                .get(&current)
                .cloned()
                .ok_or_else(|| DiError::Configuration(format!("{} has been discarded", current)))?;
            next = node.parent;
            chain.push(node);
        }
        Ok(chain)
    }

    /// Resolves `dependency` from node `id`. `None` only for an optional
    /// dependency with nothing bound.
    pub(crate) fn resolve_in(
        self: &Arc<Self>,
        id: NodeId,
        dependency: &Dependency,
    ) -> DiResult<Option<Provision>> {
        let key = dependency.key();
        let chain = self.chain(id)?;
        match self.find_in(&chain, &key, Via::Direct)? {
            Some(binding) => self.provide(&chain, &binding, *dependency).map(Some),
            None if dependency.is_optional() => Ok(None),
            None => Err(DiError::MissingBinding {
                key,
                chain: current_chain(),
            }),
        }
    }

    /// Resolves the target of a linked binding declared at node `id`.
    pub(crate) fn resolve_delegate(
        self: &Arc<Self>,
        id: NodeId,
        dependency: &Dependency,
    ) -> DiResult<Provision> {
        let key = dependency.key();
        let chain = self.chain(id)?;
        match self.find_in(&chain, &key, Via::Delegation)? {
            Some(binding) => self.provide(&chain, &binding, *dependency),
            None => Err(DiError::MissingBinding {
                key,
                chain: current_chain(),
            }),
        }
    }

    fn provide(
        self: &Arc<Self>,
        chain: &[Arc<Node>],
        binding: &Binding,
        dependency: Dependency,
    ) -> DiResult<Provision> {
        let key = dependency.key();
        let _frame = ChainGuard::push(key, self.options.max_depth)?;
        let request = Request {
            tree: self,
            dependency,
        };

        if !chain.iter().any(|node| node.observers.has_observers()) {
            return binding.provide(&request);
        }
        let observers = observers_of(chain);
        observers.resolving(&key);
        let started = Instant::now();
        let result = binding.provide(&request);
        match &result {
            Ok(_) => observers.resolved(&key, started.elapsed()),
            Err(err) => observers.construction_failed(&key, err),
        }
        result
    }

    /// Explicit bindings up the chain, then just-in-time caches up the chain,
    /// then synthesis.
    pub(crate) fn find_binding(
        &self,
        id: NodeId,
        key: &Key,
        via: Via,
    ) -> DiResult<Option<Arc<Binding>>> {
        let chain = self.chain(id)?;
        self.find_in(&chain, key, via)
    }

    fn find_in(&self, chain: &[Arc<Node>], key: &Key, via: Via) -> DiResult<Option<Arc<Binding>>> {
        if let Some(binding) = visible_binding(chain, key) {
            return Ok(Some(binding));
        }
        self.synthesize(chain, key, via)
    }

    /// Catalog entry usable for a just-in-time binding of `key`.
    pub(crate) fn jit_candidate(&self, key: &Key) -> Option<CatalogEntry> {
        if key.is_qualified() || self.options.require_explicit_bindings {
            return None;
        }
        self.catalog.get(key)
    }

    fn synthesize(
        &self,
        chain: &[Arc<Node>],
        key: &Key,
        via: Via,
    ) -> DiResult<Option<Arc<Binding>>> {
        let entry = match self.jit_candidate(key) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let index = self.synthesis_index(chain, &entry, via);
        let node = &chain[index];

        let mut cache = node.jit.lock();
        if let Some(binding) = cache.get(key) {
            return Ok(Some(binding.clone()));
        }
        let plan = (entry.plan)();
        let interceptors = interceptors_of(&chain[index..]);
        let plan = if interceptors.is_empty() {
            plan
        } else {
            plan.intercepted(key, &interceptors)
        };
        let binding = Binding::new(
            *key,
            node.id,
            Strategy::Constructor(Arc::new(plan)),
            (entry.lifetime)(),
            BindingOrigin::JustInTime,
        );
        tracing::debug!(key = %key, node = %node.id, "just-in-time binding created");
        cache.insert(*key, binding.clone());
        Ok(Some(binding))
    }

    /// Index in `chain` of the node that will own a just-in-time binding.
    ///
    /// Ordinarily the requesting node. Singletons, targets of linked
    /// bindings and requests made from factory-call environments go to the
    /// highest ancestor able to satisfy the type, so one instance serves
    /// every environment that can see it.
    fn synthesis_index(&self, chain: &[Arc<Node>], entry: &CatalogEntry, via: Via) -> usize {
        let lift = via == Via::Delegation
            || chain[0].kind == NodeKind::FactoryCall
            || (entry.lifetime)().is_singleton();
        if !lift {
            return 0;
        }
        let plan = (entry.plan)();
        (1..chain.len())
            .rev()
            .find(|&index| validation::plan_resolvable(self, &chain[index..], &plan))
            .unwrap_or(0)
    }
}

/// Observers of every node in `chain`, root first.
fn observers_of(chain: &[Arc<Node>]) -> Observers {
    let mut observers = Observers::new();
    for node in chain.iter().rev() {
        observers.extend(&node.observers);
    }
    observers
}

/// Explicit bindings first, then just-in-time ones, nearest node first.
pub(crate) fn visible_binding(chain: &[Arc<Node>], key: &Key) -> Option<Arc<Binding>> {
    chain
        .iter()
        .find_map(|node| node.explicit_binding(key))
        .or_else(|| chain.iter().find_map(|node| node.jit_binding(key)))
}

/// Interceptors applying to bindings owned by `chain[0]`, root first.
pub(crate) fn interceptors_of(chain: &[Arc<Node>]) -> Vec<Arc<dyn ConstructionInterceptor>> {
    chain
        .iter()
        .rev()
        .flat_map(|node| node.interceptors.iter().cloned())
        .collect()
}

/// Keeps a runtime environment alive; dropping the last lease discards it.
pub(crate) struct NodeLease {
    tree: Arc<EnvironmentTree>,
    node: NodeId,
    /// Lease of the parent, when the parent is itself leased.
    pub(crate) parent: Option<Arc<NodeLease>>,
}

impl NodeLease {
    pub(crate) fn new(
        tree: Arc<EnvironmentTree>,
        node: NodeId,
        parent: Option<Arc<NodeLease>>,
    ) -> Self {
        Self { tree, node, parent }
    }
}

impl Drop for NodeLease {
    fn drop(&mut self) {
        self.tree.remove_subtree(self.node);
    }
}
