//! Construction contexts and the resolution chain.
//!
//! Both live in thread-local state: a resolution call stack never leaves
//! its thread, so cycle detection only ever sees the current stack's own
//! in-flight bindings.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::binding::{AnyInstance, BindingId};
use crate::deferred::Placeholder;
use crate::error::{DiError, DiResult};
use crate::key::Key;

thread_local! {
    static RESOLUTION_TLS: RefCell<ResolutionTls> = RefCell::new(ResolutionTls::default());
}

#[derive(Default)]
struct ResolutionTls {
    chain: Vec<Key>,
    contexts: HashMap<BindingId, ContextState>,
}

/// Per-binding state. Absence from the map is the idle state.
enum ContextState {
    Constructing {
        placeholders: Vec<Arc<OnceCell<AnyInstance>>>,
    },
    Constructed(AnyInstance),
}

/// Guard for one frame of the resolution chain.
pub(crate) struct ChainGuard {
    key: Key,
}

impl ChainGuard {
    /// Pushes `key`, failing once the chain is `max_depth` deep.
    pub(crate) fn push(key: Key, max_depth: usize) -> DiResult<Self> {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if tls.chain.len() >= max_depth {
                return Err(DiError::DepthExceeded(tls.chain.len()));
            }
            tls.chain.push(key);
            Ok(Self { key })
        })
    }
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        RESOLUTION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            let last = tls.chain.pop();
            debug_assert_eq!(last, Some(self.key));
        });
    }
}

/// Keys currently being resolved on this thread, outermost first.
pub(crate) fn current_chain() -> Vec<Key> {
    RESOLUTION_TLS.with(|tls| tls.borrow().chain.clone())
}

/// Outcome of entering a binding's construction context.
pub(crate) enum Entry {
    /// Idle context, now `constructing`; the caller must build the instance.
    Fresh(ConstructionGuard),
    /// The instance already exists further up the stack.
    Reentrant(AnyInstance),
    /// Cycle broken with a placeholder.
    Deferred(Placeholder),
}

/// Enters the construction context of `binding` for `key`.
///
/// A `constructing` context means the stack has looped back onto this
/// binding: a placeholder is handed out when `allow_placeholder` is set,
/// otherwise the cycle is reported.
pub(crate) fn enter(binding: BindingId, key: Key, allow_placeholder: bool) -> DiResult<Entry> {
    RESOLUTION_TLS.with(|tls| {
        let mut tls = tls.borrow_mut();
        let ResolutionTls { chain, contexts } = &mut *tls;
        match contexts.get_mut(&binding) {
            Some(ContextState::Constructing { placeholders }) => {
                if allow_placeholder {
                    let placeholder = Placeholder::new(key);
                    placeholders.push(placeholder.cell());
                    tracing::debug!(key = %key, "circular reference broken with a placeholder");
                    Ok(Entry::Deferred(placeholder))
                } else {
                    Err(DiError::CircularDependency {
                        path: cycle_path(chain, key),
                    })
                }
            }
            Some(ContextState::Constructed(instance)) => Ok(Entry::Reentrant(instance.clone())),
            None => {
                contexts.insert(
                    binding,
                    ContextState::Constructing {
                        placeholders: Vec::new(),
                    },
                );
                Ok(Entry::Fresh(ConstructionGuard { binding }))
            }
        }
    })
}

// The chain already ends with the re-entered key.
fn cycle_path(chain: &[Key], key: Key) -> Vec<Key> {
    let start = chain.iter().position(|k| *k == key).unwrap_or(0);
    let mut path = chain[start..].to_vec();
    if path.last() != Some(&key) || path.len() == 1 {
        path.push(key);
    }
    path
}

/// Owns a binding's context while it is `constructing` or `constructed`.
/// Dropping it returns the context to idle, on every exit path.
pub(crate) struct ConstructionGuard {
    binding: BindingId,
}

impl ConstructionGuard {
    /// Records `instance` as the current reference and points every
    /// placeholder handed out so far at it.
    pub(crate) fn constructed(&self, instance: &AnyInstance) {
        let previous = RESOLUTION_TLS.with(|tls| {
            tls.borrow_mut()
                .contexts
                .insert(self.binding, ContextState::Constructed(instance.clone()))
        });
        if let Some(ContextState::Constructing { placeholders }) = previous {
            for cell in placeholders {
                let _ = cell.set(instance.clone());
            }
        }
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown.
        let _ = RESOLUTION_TLS.try_with(|tls| {
            if let Ok(mut tls) = tls.try_borrow_mut() {
                tls.contexts.remove(&self.binding);
            }
        });
    }
}
