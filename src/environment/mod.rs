//! Environments: the tree of nested binding scopes and its handles.

pub(crate) mod catalog;
mod context;
mod injector;
pub(crate) mod tree;

pub use context::ResolverContext;
pub use injector::Injector;
pub(crate) use tree::EnvironmentTree;
pub use tree::{NodeId, NodeKind};
