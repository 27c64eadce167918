//! Module system for grouping declarations.
//!
//! A module is a reusable unit of declarations. Install it in a collection
//! with [`BindingCollection::install`], or in a private environment with
//! [`BindingCollection::install_private`].

use super::BindingCollection;
use crate::error::DiResult;

/// A unit of declarations.
///
/// Closures taking `&mut BindingCollection` are modules too.
///
/// # Example
///
/// ```rust
/// use ferrous_inject::{BindingCollection, DiResult, Lifetime, Module, Resolver};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct UserConfig;
///
/// struct UserService;
/// impl UserService {
///     fn new(_config: Arc<UserConfig>) -> Self { Self }
/// }
///
/// struct UserModule;
///
/// impl Module for UserModule {
///     fn configure(self, bindings: &mut BindingCollection) -> DiResult<()> {
///         bindings.bind_instance(UserConfig::default());
///         bindings.bind_supplier::<UserService, _>(Lifetime::Singleton, |r| {
///             Ok(UserService::new(r.get::<UserConfig>()?))
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut bindings = BindingCollection::new();
/// bindings.install(UserModule);
/// let injector = bindings.build()?;
/// assert!(injector.get::<UserService>().is_ok());
/// # Ok(())
/// # }
/// ```
pub trait Module {
    /// Adds this module's declarations to `bindings`.
    fn configure(self, bindings: &mut BindingCollection) -> DiResult<()>;
}

impl<F> Module for F
where
    F: FnOnce(&mut BindingCollection) -> DiResult<()>,
{
    fn configure(self, bindings: &mut BindingCollection) -> DiResult<()> {
        self(bindings)
    }
}

/// Extension trait for BindingCollection that chains module installation
/// and fails fast.
pub trait BindingCollectionExt {
    /// Installs a module, returning its error immediately.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ferrous_inject::{BindingCollection, BindingCollectionExt, DiResult, Module};
    ///
    /// struct DatabaseModule;
    /// impl Module for DatabaseModule {
    ///     fn configure(self, _: &mut BindingCollection) -> DiResult<()> { Ok(()) }
    /// }
    ///
    /// struct UserModule;
    /// impl Module for UserModule {
    ///     fn configure(self, _: &mut BindingCollection) -> DiResult<()> { Ok(()) }
    /// }
    ///
    /// # fn main() -> DiResult<()> {
    /// let injector = BindingCollection::new()
    ///     .with_module(DatabaseModule)?
    ///     .with_module(UserModule)?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    fn with_module<M: Module>(self, module: M) -> DiResult<Self>
    where
        Self: Sized;
}

impl BindingCollectionExt for BindingCollection {
    fn with_module<M: Module>(mut self, module: M) -> DiResult<Self> {
        module.configure(&mut self)?;
        Ok(self)
    }
}
