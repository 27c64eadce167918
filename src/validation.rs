//! Assembly-time validation of binding graphs.
//!
//! Validation is static: it walks declared dependencies and the constructor
//! descriptions of just-in-time candidates without running any user code.
//! Every problem found is returned, so that `build` can report them all at
//! once.

use std::collections::HashSet;
use std::sync::Arc;

use crate::binding::{Binding, Strategy};
use crate::constructor::ConstructorPlan;
use crate::environment::tree::{visible_binding, EnvironmentTree, Node, NodeId};
use crate::error::DiError;
use crate::key::Key;

/// Returns true if every required dependency of `plan` can be satisfied
/// from `chain[0]`.
pub(crate) fn plan_resolvable(
    tree: &EnvironmentTree,
    chain: &[Arc<Node>],
    plan: &ConstructorPlan,
) -> bool {
    let mut visiting = HashSet::new();
    plan.dependencies()
        .filter(|dependency| !dependency.is_optional())
        .all(|dependency| {
            find_missing(tree, chain, dependency.key(), &mut visiting, &mut Vec::new()).is_none()
        })
}

/// First unresolvable key reachable from `key`, as a `MissingBinding` whose
/// chain is the path leading to it.
///
/// Keys already being visited count as resolvable: cycles are a runtime
/// matter.
fn find_missing(
    tree: &EnvironmentTree,
    chain: &[Arc<Node>],
    key: Key,
    visiting: &mut HashSet<Key>,
    path: &mut Vec<Key>,
) -> Option<DiError> {
    if visible_binding(chain, &key).is_some() || visiting.contains(&key) {
        return None;
    }
    let entry = match tree.jit_candidate(&key) {
        Some(entry) => entry,
        None => {
            return Some(DiError::MissingBinding {
                key,
                chain: path.clone(),
            })
        }
    };

    visiting.insert(key);
    path.push(key);
    let plan = (entry.plan)();
    let missing = plan
        .dependencies()
        .filter(|dependency| !dependency.is_optional())
        .find_map(|dependency| find_missing(tree, chain, dependency.key(), visiting, path));
    path.pop();
    missing
}

/// Checks that `key` can be resolved end to end from node `id`.
pub(crate) fn check_key(tree: &EnvironmentTree, id: NodeId, key: Key) -> Result<(), DiError> {
    let chain = tree.chain(id)?;
    let mut visiting = HashSet::new();
    if let Some(binding) = visible_binding(&chain, &key) {
        return check_binding(tree, &binding, &mut visiting);
    }
    match find_missing(tree, &chain, key, &mut visiting, &mut Vec::new()) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Checks an explicit binding's own dependencies from its owner node.
fn check_binding(
    tree: &EnvironmentTree,
    binding: &Binding,
    visiting: &mut HashSet<Key>,
) -> Result<(), DiError> {
    let chain = tree.chain(binding.owner)?;
    for dependency in binding.strategy.dependencies() {
        if dependency.is_optional() {
            continue;
        }
        let mut path = vec![binding.key];
        if let Some(err) = find_missing(tree, &chain, dependency.key(), visiting, &mut path) {
            return Err(err);
        }
    }
    Ok(())
}

/// Validates the bindings declared at node `id`.
pub(crate) fn validate_node(tree: &EnvironmentTree, id: NodeId) -> Vec<DiError> {
    let node = match tree.node(id) {
        Ok(node) => node,
        Err(err) => return vec![err],
    };
    let mut declared: Vec<Arc<Binding>> = node
        .explicit
        .read()
        .values()
        .filter(|binding| binding.owner == id)
        .cloned()
        .collect();
    declared.sort_by_key(|binding| binding.key);

    let mut errors = Vec::new();
    for binding in &declared {
        if let Err(err) = check_binding(tree, binding, &mut HashSet::new()) {
            errors.push(err);
        }
        if let Some(err) = linked_cycle(tree, binding) {
            errors.push(err);
        }
    }
    errors
}

/// A chain of linked bindings leading back to `start`, reported once per
/// cycle (by its smallest key).
fn linked_cycle(tree: &EnvironmentTree, start: &Arc<Binding>) -> Option<DiError> {
    let mut path = vec![start.key];
    let mut seen = HashSet::from([start.id]);
    let mut current = start.clone();
    while let Strategy::Linked { target, .. } = &current.strategy {
        let chain = tree.chain(current.owner).ok()?;
        let next = visible_binding(&chain, target)?;
        path.push(next.key);
        if Arc::ptr_eq(&next, start) {
            let smallest = path.iter().min()?;
            if *smallest != start.key {
                return None;
            }
            let reason = format!(
                "linked bindings form a cycle: {}",
                path.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(" -> ")
            );
            return Some(DiError::ConflictingBinding {
                key: start.key,
                reason,
            });
        }
        if !seen.insert(next.id) {
            // A cycle that does not pass through `start`.
            return None;
        }
        current = next;
    }
    None
}
