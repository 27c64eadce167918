//! # ferrous-inject
//!
//! Object-graph construction for Rust: declare how each type is built, then
//! ask an injector for instances and let it wire their dependencies.
//!
//! ## Features
//!
//! - **Bindings**: fixed instances, constructors with member injection,
//!   supplier callbacks and links between keys (e.g. trait to implementation)
//! - **Scopes**: transient, singleton (thread-safe, built once) and
//!   context-bound scopes entered and left by the caller
//! - **Environments**: nested binding scopes, private environments exposing
//!   only selected keys, runtime child injectors
//! - **Just-in-time bindings**: types described once are bound on demand, in
//!   the environment that first needs them
//! - **Cycles**: a deferred edge closing a cycle gets a placeholder that
//!   forwards to the real instance once it exists
//! - **Assisted injection**: factories mixing call arguments with injected
//!   dependencies
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_inject::{BindingCollection, Constructor, Injectable, Lifetime, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn constructor() -> Constructor<Self> {
//!         Constructor::new(|args| Ok(UserService { db: args.next()? })).param::<Database>()
//!     }
//!
//!     fn lifetime() -> Lifetime {
//!         Lifetime::Singleton
//!     }
//! }
//!
//! let mut bindings = BindingCollection::new();
//! bindings.bind_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! bindings.describe::<UserService>();
//!
//! let injector = bindings.build().unwrap();
//! let users = injector.get::<UserService>().unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! assert!(Arc::ptr_eq(&users, &injector.get::<UserService>().unwrap()));
//! ```
//!
//! ## Trait Bindings
//!
//! ```rust
//! use ferrous_inject::{BindingCollection, Lifetime, Resolver};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {}", message)
//!     }
//! }
//!
//! let mut bindings = BindingCollection::new();
//! bindings.bind_supplier::<ConsoleLogger, _>(Lifetime::Singleton, |_| Ok(ConsoleLogger));
//! bindings.bind_linked::<dyn Logger, ConsoleLogger>(|l| l);
//!
//! let injector = bindings.build().unwrap();
//! let logger = injector.get::<dyn Logger>().unwrap();
//! assert_eq!(logger.log("Hello"), "[LOG] Hello");
//! ```
//!
//! ## Cycles
//!
//! ```rust
//! use ferrous_inject::{BindingCollection, Constructor, Deferred, Injectable, Resolver};
//! use std::sync::Arc;
//!
//! struct Parent { child: Arc<Child> }
//! struct Child { parent: Deferred<Parent> }
//!
//! impl Injectable for Parent {
//!     fn constructor() -> Constructor<Self> {
//!         Constructor::new(|args| Ok(Parent { child: args.next()? })).param::<Child>()
//!     }
//! }
//!
//! impl Injectable for Child {
//!     fn constructor() -> Constructor<Self> {
//!         Constructor::new(|args| Ok(Child { parent: args.next_deferred()? }))
//!             .deferred_param::<Parent>()
//!     }
//! }
//!
//! let mut bindings = BindingCollection::new();
//! bindings.describe::<Parent>().describe::<Child>();
//! let injector = bindings.build().unwrap();
//!
//! let parent = injector.get::<Parent>().unwrap();
//! assert!(Arc::ptr_eq(&parent, &parent.child.parent.get().unwrap()));
//! ```

pub mod collection;
pub mod config;
pub mod constructor;
pub mod descriptors;
pub mod environment;
pub mod error;
pub mod factory;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod scope;
pub mod traits;

// Internal modules
mod binding;
mod deferred;
mod dependency;
mod internal;
mod validation;

pub use binding::{AnyInstance, BindingOrigin, Provider, Request};
pub use collection::{BindingCollection, BindingCollectionExt, Module};
pub use config::{
    ConfigSource, ConfigValue, EnvironmentConfigSource, InjectorOptions, MapConfigSource, Stage,
};
pub use constructor::{
    Arguments, ConstructionInterceptor, ConstructionProxy, Constructor, Injectable,
};
pub use deferred::{Deferred, Placeholder, Provision};
pub use dependency::Dependency;
pub use descriptors::{BindingDescriptor, StrategyKind};
pub use environment::{Injector, NodeId, NodeKind, ResolverContext};
pub use error::{BoxError, DiError, DiResult, InjectionSite, SharedError};
pub use factory::{Factory, FactoryArgs, FactoryError, FactoryMethod, FactorySpec};
pub use key::{key_of_type, Key, Qualifier};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, TracingObserver};
pub use scope::{ContextScope, ScopeGuard, ScopeInstance, ScopePolicy, SingletonScope};
pub use traits::{Resolver, ResolverCore};
