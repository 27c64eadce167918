//! Compute-once cache cell shared by the caching scope policies.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};

use crate::binding::AnyInstance;
use crate::error::{DiError, DiResult, InjectionSite};
use crate::key::Key;
use crate::Provision;

enum SlotState {
    Empty,
    InFlight { owner: ThreadId, attempt: u64 },
    Ready(AnyInstance),
}

struct SlotInner {
    state: SlotState,
    attempts: u64,
    /// Most recent failed attempt and its error, handed to that attempt's waiters.
    failure: Option<(u64, DiError)>,
}

/// A cache cell computed at most once at a time.
///
/// - The first caller marks the slot in-flight and computes without holding
///   the lock.
/// - Other threads block until that computation finishes, then share its
///   value or its error.
/// - The computing thread itself re-entering the slot (a construction cycle)
///   bypasses the cache so its construction context can handle the cycle.
/// - A placeholder result is never cached.
pub(crate) struct SingletonSlot {
    key: Key,
    inner: Mutex<SlotInner>,
    changed: Condvar,
}

impl SingletonSlot {
    pub(crate) fn new(key: Key) -> Self {
        Self {
            key,
            inner: Mutex::new(SlotInner {
                state: SlotState::Empty,
                attempts: 0,
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn get_or_compute<F>(&self, compute: F) -> DiResult<Provision>
    where
        F: FnOnce() -> DiResult<Provision>,
    {
        let me = thread::current().id();
        let mut inner = self.inner.lock();
        loop {
            match &inner.state {
                SlotState::Ready(instance) => return Ok(Provision::Ready(instance.clone())),
                SlotState::InFlight { owner, .. } if *owner == me => {
                    drop(inner);
                    return compute();
                }
                SlotState::InFlight { attempt, .. } => {
                    let waited_for = *attempt;
                    tracing::trace!(key = %self.key, "waiting for in-flight scoped computation");
                    self.changed.wait(&mut inner);
                    if let Some((failed, err)) = &inner.failure {
                        if *failed >= waited_for && !matches!(inner.state, SlotState::Ready(_)) {
                            return Err(err.clone());
                        }
                    }
                }
                SlotState::Empty => {
                    inner.attempts += 1;
                    let attempt = inner.attempts;
                    inner.state = SlotState::InFlight { owner: me, attempt };
                    drop(inner);

                    let mut flight = InFlight {
                        slot: self,
                        attempt,
                        finished: false,
                    };
                    let result = compute();
                    flight.finish(&result);
                    return result;
                }
            }
        }
    }

    /// Cached value, if computed.
    #[cfg(test)]
    pub(crate) fn peek(&self) -> Option<AnyInstance> {
        match &self.inner.lock().state {
            SlotState::Ready(instance) => Some(instance.clone()),
            _ => None,
        }
    }
}

/// Settles an in-flight attempt, including when the computation unwinds.
struct InFlight<'a> {
    slot: &'a SingletonSlot,
    attempt: u64,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(&mut self, result: &DiResult<Provision>) {
        let mut inner = self.slot.inner.lock();
        match result {
            Ok(Provision::Ready(instance)) => inner.state = SlotState::Ready(instance.clone()),
            Ok(Provision::Pending(_)) => inner.state = SlotState::Empty,
            Err(err) => {
                inner.state = SlotState::Empty;
                inner.failure = Some((self.attempt, err.clone()));
            }
        }
        self.finished = true;
        drop(inner);
        self.slot.changed.notify_all();
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut inner = self.slot.inner.lock();
        inner.state = SlotState::Empty;
        inner.failure = Some((
            self.attempt,
            DiError::Construction {
                key: self.slot.key,
                site: InjectionSite::Scope,
                cause: Arc::new(Abandoned),
            },
        ));
        drop(inner);
        self.slot.changed.notify_all();
    }
}

#[derive(Debug, thiserror::Error)]
#[error("scoped computation panicked")]
struct Abandoned;
