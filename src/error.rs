//! Error types for the injector.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::key::Key;

/// Failure raised by user code (initializers, setters, suppliers).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared form of a user failure; keeps [`DiError`] cheaply cloneable.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Where in a construction strategy a user failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionSite {
    /// The primary initializer (through its construction proxy).
    Constructor,
    /// A post-construction member setter.
    Member(&'static str),
    /// A supplier callback.
    Supplier,
    /// A static injection target run at assembly completion.
    Static(&'static str),
    /// A scope's cached computation that never completed.
    Scope,
}

impl fmt::Display for InjectionSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionSite::Constructor => f.write_str("constructor"),
            InjectionSite::Member(name) => write!(f, "member `{}`", name),
            InjectionSite::Supplier => f.write_str("supplier"),
            InjectionSite::Static(name) => write!(f, "static member `{}`", name),
            InjectionSite::Scope => f.write_str("scope"),
        }
    }
}

/// Dependency injection errors
///
/// Assembly-time problems (`ConflictingBinding`, `Configuration`, missing
/// dependencies found by validation) are collected and returned once as
/// [`DiError::Assembly`] from `BindingCollection::build`. Everything else is
/// raised while resolving.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{BindingCollection, DiError, Key, Resolver};
///
/// let injector = BindingCollection::new().build().unwrap();
/// match injector.get::<String>() {
///     Err(DiError::MissingBinding { key, chain }) => {
///         assert_eq!(key, Key::of::<String>());
///         assert!(chain.is_empty());
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Key unresolvable anywhere in the visible chain.
    #[error("no binding for {key}{}", format_chain(.chain))]
    MissingBinding {
        key: Key,
        /// Keys being resolved when the request was made, outermost first.
        chain: Vec<Key>,
    },

    /// Duplicate or ambiguous declaration or exposure.
    #[error("conflicting binding for {key}: {reason}")]
    ConflictingBinding { key: Key, reason: String },

    /// Cycle found on an edge that does not allow a deferred reference.
    #[error("circular dependency: {}", join_keys(.path))]
    CircularDependency { path: Vec<Key> },

    /// User code failed while building an instance.
    #[error("error constructing {key} in {site}: {cause}")]
    Construction {
        key: Key,
        site: InjectionSite,
        cause: SharedError,
    },

    /// Invalid configuration, e.g. a factory that cannot be satisfied.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A resolved instance did not have the requested type.
    #[error("type mismatch for {0}")]
    TypeMismatch(Key),

    /// Maximum recursion depth exceeded.
    #[error("max resolution depth {0} exceeded")]
    DepthExceeded(usize),

    /// A context-scoped binding was requested outside of an entered scope.
    #[error("cannot resolve {0} outside of its scope")]
    OutOfScope(Key),

    /// Every assembly-time problem, reported at once.
    #[error("unable to assemble injector, {} error(s):\n{}", .0.len(), join_errors(.0))]
    Assembly(Vec<DiError>),
}

impl DiError {
    pub(crate) fn construction(key: Key, site: InjectionSite, cause: BoxError) -> Self {
        DiError::Construction {
            key,
            site,
            cause: Arc::from(cause),
        }
    }

    /// A placeholder reached a caller that cannot hold one.
    pub(crate) fn unexpected_placeholder(key: Key) -> Self {
        let mut path = crate::internal::construction::current_chain();
        path.push(key);
        DiError::CircularDependency { path }
    }

    /// Flattens an aggregate into its individual errors.
    pub fn errors(&self) -> Vec<&DiError> {
        match self {
            DiError::Assembly(errors) => errors.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }

    /// The user failure behind a `Construction` error, if any.
    pub fn cause(&self) -> Option<&SharedError> {
        match self {
            DiError::Construction { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

fn format_chain(chain: &[Key]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (required by {})", join_keys(chain))
    }
}

fn join_keys(keys: &[Key]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn join_errors(errors: &[DiError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("  {}) {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for DI operations
pub type DiResult<T> = Result<T, DiError>;
