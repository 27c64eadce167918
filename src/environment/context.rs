//! Resolver context handed to suppliers.

use std::sync::Arc;

use super::tree::{EnvironmentTree, NodeId};
use crate::deferred::Provision;
use crate::dependency::Dependency;
use crate::error::DiResult;
use crate::traits::ResolverCore;

/// Context passed to supplier callbacks for resolving their dependencies.
///
/// Resolution happens from the environment that owns the supplier's
/// binding, so a supplier declared in a private environment sees that
/// environment's bindings.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{BindingCollection, Lifetime, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut bindings = BindingCollection::new();
/// bindings.bind_instance(Database { url: "postgres://localhost".to_string() });
/// bindings.bind_supplier::<UserService, _>(Lifetime::Transient, |resolver| {
///     // resolver is a ResolverContext that provides access to other bindings
///     Ok(UserService { db: resolver.get::<Database>()? })
/// });
///
/// let injector = bindings.build().unwrap();
/// assert_eq!(injector.get::<UserService>().unwrap().db.url, "postgres://localhost");
/// ```
pub struct ResolverContext<'a> {
    tree: &'a Arc<EnvironmentTree>,
    node: NodeId,
}

impl<'a> ResolverContext<'a> {
    pub(crate) fn new(tree: &'a Arc<EnvironmentTree>, node: NodeId) -> Self {
        Self { tree, node }
    }

    /// Environment the resolution happens from.
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl<'a> ResolverCore for ResolverContext<'a> {
    fn resolve_dependency(&self, dependency: &Dependency) -> DiResult<Option<Provision>> {
        self.tree.resolve_in(self.node, dependency)
    }
}
