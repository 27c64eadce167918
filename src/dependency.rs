//! Dependency edges of the object graph.

use crate::key::Key;

/// One requested edge: the key plus how the requester tolerates it being
/// unavailable.
///
/// - `deferred`: the requester accepts a [`Deferred`](crate::Deferred)
///   placeholder if the key is already being constructed further up the
///   same call stack.
/// - `optional`: a missing binding yields nothing instead of
///   [`DiError::MissingBinding`](crate::DiError::MissingBinding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    key: Key,
    deferred: bool,
    optional: bool,
}

impl Dependency {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            deferred: false,
            optional: false,
        }
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(Key::of::<T>())
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Same edge flags, pointing at another key (used by linked bindings).
    pub(crate) fn retarget(&self, key: Key) -> Self {
        Self { key, ..*self }
    }
}
