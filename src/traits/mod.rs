//! Core traits for the injector.

mod resolver;

pub use resolver::{Resolver, ResolverCore};
