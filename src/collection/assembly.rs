//! Turning binding collections into environments.
//!
//! Assembly runs in phases, each one collecting every problem it finds:
//!
//! 1. structure: nodes, declared bindings, private children and exposures
//! 2. validation: declared dependencies and factory methods
//! 3. static injection, in declaration order
//! 4. eager creation of singletons (production stage) and prewarmed keys
//!
//! A phase only runs if the previous ones found nothing. On failure every
//! node created by this assembly is discarded and the problems are returned
//! as one [`DiError::Assembly`].

use std::sync::Arc;

use super::{BindingCollection, Declaration, StaticInjection};
use crate::binding::{wrap_failure, Binding, BindingOrigin, Strategy};
use crate::config::Stage;
use crate::constructor::ConstructionInterceptor;
use crate::dependency::Dependency;
use crate::environment::tree::{interceptors_of, Node};
use crate::environment::{EnvironmentTree, NodeId, NodeKind};
use crate::error::{DiError, DiResult, InjectionSite};
use crate::factory::{validate_factory, FactoryDecl};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::validation;

/// Work left over once the structure of every node exists.
#[derive(Default)]
struct Pending {
    created: Vec<NodeId>,
    factories: Vec<(NodeId, FactoryDecl)>,
    static_injections: Vec<(NodeId, StaticInjection)>,
    prewarm: Vec<(NodeId, Key)>,
    errors: Vec<DiError>,
}

/// Assembles `collection` into a new node below `parent`.
pub(crate) fn assemble(
    tree: &Arc<EnvironmentTree>,
    parent: Option<NodeId>,
    kind: NodeKind,
    collection: BindingCollection,
) -> DiResult<NodeId> {
    if kind != NodeKind::Root && collection.options.is_some() {
        tracing::warn!(
            "options of a child collection are ignored; children share the root's options"
        );
    }
    let mut pending = Pending::default();
    let node = match assemble_node(tree, parent, kind, collection, &mut pending) {
        Ok(node) => node,
        Err(err) => {
            if let Some(first) = pending.created.first() {
                tree.remove_subtree(*first);
            }
            return Err(err);
        }
    };

    let result = validate(tree, &mut pending)
        .and_then(|()| run_static_injections(tree, &mut pending))
        .and_then(|()| create_eagerly(tree, &pending));
    match result {
        Ok(()) => {
            tracing::debug!(
                node = %node,
                environments = pending.created.len(),
                "environment assembled"
            );
            Ok(node)
        }
        Err(errors) => {
            tree.remove_subtree(node);
            tracing::debug!(node = %node, errors = errors.len(), "assembly failed");
            Err(DiError::Assembly(errors))
        }
    }
}

fn assemble_node(
    tree: &Arc<EnvironmentTree>,
    parent: Option<NodeId>,
    kind: NodeKind,
    collection: BindingCollection,
    pending: &mut Pending,
) -> DiResult<NodeId> {
    let BindingCollection {
        declarations,
        factories,
        exposed,
        private_children,
        catalog,
        interceptors,
        static_injections,
        prewarm,
        observers,
        options: _,
        errors,
    } = collection;

    pending.errors.extend(errors);
    for entry in catalog {
        tree.catalog.register(entry);
    }

    let ancestors = match parent {
        Some(parent) => tree.chain(parent)?,
        None => Vec::new(),
    };
    let node = tree.add_node(parent, kind, interceptors, observers);
    pending.created.push(node.id);
    let mut chain = vec![node.clone()];
    chain.extend(ancestors.iter().cloned());
    let interceptors = interceptors_of(&chain);

    for declaration in declarations {
        let binding = attach(declaration, node.id, &interceptors);
        if let Err(err) = insert_declared(&node, &ancestors, binding) {
            pending.errors.push(err);
        }
    }
    for factory in factories {
        let binding = Binding::new(
            factory.key,
            node.id,
            Strategy::Instance(factory.instance(tree, node.id)),
            Lifetime::Transient,
            BindingOrigin::Declared,
        );
        match insert_declared(&node, &ancestors, binding) {
            Ok(()) => pending.factories.push((node.id, factory)),
            Err(err) => pending.errors.push(err),
        }
    }

    for child in private_children {
        let child_id = assemble_node(tree, Some(node.id), NodeKind::Private, child, pending)?;
        expose_from(tree, &node, child_id, &mut pending.errors)?;
    }

    if !exposed.is_empty() {
        if kind == NodeKind::Private {
            node.exposed.write().extend(exposed);
        } else {
            for key in exposed {
                pending.errors.push(DiError::ConflictingBinding {
                    key,
                    reason: "only private environments can expose bindings".into(),
                });
            }
        }
    }

    pending
        .static_injections
        .extend(static_injections.into_iter().map(|target| (node.id, target)));
    pending.prewarm.extend(prewarm.into_iter().map(|key| (node.id, key)));
    Ok(node.id)
}

fn attach(
    declaration: Declaration,
    owner: NodeId,
    interceptors: &[Arc<dyn ConstructionInterceptor>],
) -> Arc<Binding> {
    let Declaration {
        key,
        strategy,
        lifetime,
    } = declaration;
    let strategy = match strategy {
        Strategy::Constructor(plan) if !interceptors.is_empty() => {
            Strategy::Constructor(Arc::new(plan.intercepted(&key, interceptors)))
        }
        other => other,
    };
    Binding::new(key, owner, strategy, lifetime, BindingOrigin::Declared)
}

/// Adds a declared binding to `node`, refusing keys already bound there or
/// in an enclosing environment.
fn insert_declared(
    node: &Node,
    ancestors: &[Arc<Node>],
    binding: Arc<Binding>,
) -> Result<(), DiError> {
    let key = binding.key;
    if let Some(existing) = ancestors.iter().find_map(|ancestor| ancestor.explicit_binding(&key)) {
        return Err(DiError::ConflictingBinding {
            key,
            reason: format!("already bound in enclosing environment {}", existing.owner),
        });
    }
    let mut explicit = node.explicit.write();
    if let Some(existing) = explicit.get(&key) {
        let reason = if existing.owner == node.id {
            "bound more than once".to_string()
        } else {
            format!("already exposed by private environment {}", existing.owner)
        };
        return Err(DiError::ConflictingBinding { key, reason });
    }
    explicit.insert(key, binding);
    Ok(())
}

/// Promotes the exposed bindings of private child `child_id` into `parent`.
fn expose_from(
    tree: &EnvironmentTree,
    parent: &Node,
    child_id: NodeId,
    errors: &mut Vec<DiError>,
) -> DiResult<()> {
    let child = tree.node(child_id)?;
    let mut exposed: Vec<Key> = child.exposed.read().iter().copied().collect();
    exposed.sort();
    for key in exposed {
        let binding = match child.explicit_binding(&key) {
            Some(binding) => binding,
            // A key the parent already binds was refused in the child.
            None if parent.explicit_binding(&key).is_some() => continue,
            None => {
                errors.push(DiError::ConflictingBinding {
                    key,
                    reason: format!("exposed by {} but not bound there", child_id),
                });
                continue;
            }
        };
        let mut explicit = parent.explicit.write();
        if let Some(existing) = explicit.get(&key) {
            let reason = if existing.owner == parent.id {
                format!("exposed by {} but also bound by its parent", child_id)
            } else {
                format!("exposed by both {} and {}", existing.owner, child_id)
            };
            errors.push(DiError::ConflictingBinding { key, reason });
            continue;
        }
        tracing::trace!(key = %key, from = %child_id, to = %parent.id, "binding exposed");
        explicit.insert(key, binding);
    }
    Ok(())
}

fn validate(tree: &EnvironmentTree, pending: &mut Pending) -> Result<(), Vec<DiError>> {
    let mut errors = std::mem::take(&mut pending.errors);
    for id in &pending.created {
        errors.extend(validation::validate_node(tree, *id));
    }
    for (id, factory) in &pending.factories {
        errors.extend(validate_factory(tree, *id, factory));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn run_static_injections(
    tree: &Arc<EnvironmentTree>,
    pending: &mut Pending,
) -> Result<(), Vec<DiError>> {
    let mut errors = Vec::new();
    for (id, target) in std::mem::take(&mut pending.static_injections) {
        let key = target.dependency.key();
        let injected = tree
            .resolve_in(id, &target.dependency)
            .and_then(|value| {
                value.ok_or_else(|| DiError::MissingBinding {
                    key,
                    chain: Vec::new(),
                })
            })
            .and_then(|value| {
                (target.apply)(value)
                    .map_err(|cause| wrap_failure(key, InjectionSite::Static(target.name), cause))
            });
        if let Err(err) = injected {
            errors.push(err);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn create_eagerly(tree: &Arc<EnvironmentTree>, pending: &Pending) -> Result<(), Vec<DiError>> {
    let mut targets: Vec<(NodeId, Key)> = Vec::new();
    if tree.options().stage == Stage::Production {
        for id in &pending.created {
            let node = match tree.node(*id) {
                Ok(node) => node,
                Err(err) => return Err(vec![err]),
            };
            let mut singletons: Vec<Key> = node
                .explicit
                .read()
                .values()
                .filter(|binding| binding.owner == *id && binding.lifetime.is_singleton())
                .map(|binding| binding.key)
                .collect();
            singletons.sort();
            targets.extend(singletons.into_iter().map(|key| (*id, key)));
        }
    }
    targets.extend(pending.prewarm.iter().copied());

    let mut errors = Vec::new();
    for (id, key) in targets {
        tracing::trace!(key = %key, node = %id, "creating eagerly");
        if let Err(err) = tree.resolve_in(id, &Dependency::new(key)) {
            errors.push(err);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
