//! Binding key types for the injector.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Qualifier distinguishing several bindings of the same type.
///
/// `Named` is the general-purpose qualifier. `Assisted` is reserved for
/// arguments bound by factory calls; the default factory qualifier is
/// `Assisted("")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    /// A user-chosen name, e.g. `"database_port"`.
    Named(&'static str),
    /// A factory-call argument slot.
    Assisted(&'static str),
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Named(name) => write!(f, "@Named(\"{}\")", name),
            Qualifier::Assisted(name) => write!(f, "@Assisted(\"{}\")", name),
        }
    }
}

/// Key for binding storage and lookup.
///
/// A key is the pair of a type identity and an optional [`Qualifier`]. Keys
/// work for concrete types and trait objects alike: `Key::of::<dyn Logger>()`
/// is a perfectly valid key.
///
/// Equality and hashing only consider the `TypeId` and the qualifier; the
/// type name is carried for diagnostics.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{Key, Qualifier};
///
/// let plain = Key::of::<u32>();
/// let port = Key::named::<u32>("port");
///
/// assert_ne!(plain, port);
/// assert_eq!(port.qualifier(), Some(Qualifier::Named("port")));
/// assert_eq!(port.type_name(), "u32");
/// assert_eq!(port.without_qualifier(), plain);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Key {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Qualifier>,
}

impl Key {
    /// Unqualified key for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    /// Key for `T` qualified with `Qualifier::Named(name)`.
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::of::<T>().with_qualifier(Qualifier::Named(name))
    }

    /// Key for `T` qualified as a factory argument.
    pub fn assisted<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::of::<T>().with_qualifier(Qualifier::Assisted(name))
    }

    /// Same type, different qualifier.
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Same type, no qualifier.
    pub fn without_qualifier(mut self) -> Self {
        self.qualifier = None;
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Human-readable type name (`std::any::type_name`).
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<Qualifier> {
        self.qualifier
    }

    /// Returns true if this key carries a qualifier of any kind.
    pub fn is_qualified(&self) -> bool {
        self.qualifier.is_some()
    }
}

impl PartialEq for Key {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for Key {}

impl Hash for Key {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Name-first ordering so descriptor listings read alphabetically.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.type_name
            .cmp(other.type_name)
            .then_with(|| self.type_id.cmp(&other.type_id))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{} {}", q, self.type_name),
            None => f.write_str(self.type_name),
        }
    }
}

// Helper function for creating type keys
#[inline(always)]
pub fn key_of_type<T: ?Sized + 'static>() -> Key {
    Key::of::<T>()
}
