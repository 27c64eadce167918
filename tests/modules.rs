/// Tests for organizing bindings into modules
use ferrous_inject::{
    BindingCollection, BindingCollectionExt, Constructor, DiError, DiResult, Injectable, Lifetime,
    Module, Resolver,
};
use std::sync::Arc;

// ===== Test Types =====

#[derive(Debug)]
struct Config {
    name: String,
    value: u32,
}

struct DatabaseService {
    config: Arc<Config>,
    connection_id: String,
}

impl Injectable for DatabaseService {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| {
            let config: Arc<Config> = args.next()?;
            Ok(DatabaseService {
                connection_id: format!("conn-{}", config.value),
                config,
            })
        })
        .param::<Config>()
    }

    fn lifetime() -> Lifetime {
        Lifetime::Singleton
    }
}

trait Repository: Send + Sync {
    fn describe(&self) -> String;
}

struct UserRepository {
    db: Arc<DatabaseService>,
}

impl Repository for UserRepository {
    fn describe(&self) -> String {
        format!("users via {}", self.db.connection_id)
    }
}

impl Injectable for UserRepository {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| Ok(UserRepository { db: args.next()? })).param::<DatabaseService>()
    }
}

// ===== Modules =====

struct DatabaseModule {
    value: u32,
}

impl Module for DatabaseModule {
    fn configure(self, bindings: &mut BindingCollection) -> DiResult<()> {
        bindings.bind_instance(Config {
            name: "db".to_string(),
            value: self.value,
        });
        bindings.declare::<DatabaseService>();
        Ok(())
    }
}

fn repository_module(bindings: &mut BindingCollection) -> DiResult<()> {
    bindings.describe::<UserRepository>();
    bindings.bind_linked::<dyn Repository, UserRepository>(|repo| repo);
    Ok(())
}

struct BrokenModule;

impl Module for BrokenModule {
    fn configure(self, _bindings: &mut BindingCollection) -> DiResult<()> {
        Err(DiError::Configuration("missing connection string".into()))
    }
}

// ===== Tests =====

#[test]
fn test_struct_and_function_modules() {
    let mut bindings = BindingCollection::new();
    bindings.install(DatabaseModule { value: 7 });
    bindings.install(repository_module);
    let injector = bindings.build().unwrap();

    let repo = injector.get::<dyn Repository>().unwrap();
    assert_eq!(repo.describe(), "users via conn-7");
    let db = injector.get::<DatabaseService>().unwrap();
    assert_eq!(db.config.name, "db");
    assert!(Arc::ptr_eq(&db, &injector.get::<DatabaseService>().unwrap()));
}

#[test]
fn test_with_module_chains() {
    let injector = BindingCollection::new()
        .with_module(DatabaseModule { value: 1 })
        .and_then(|bindings| bindings.with_module(repository_module))
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(injector.get::<dyn Repository>().unwrap().describe(), "users via conn-1");
}

#[test]
fn test_with_module_propagates_failure() {
    let result = BindingCollection::new().with_module(BrokenModule);
    assert!(matches!(result, Err(DiError::Configuration(_))));
}

#[test]
fn test_installed_module_failure_fails_build() {
    let mut bindings = BindingCollection::new();
    bindings.install(BrokenModule);
    bindings.install(DatabaseModule { value: 2 });

    let err = bindings.build().unwrap_err();
    let errors = err.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("missing connection string"));
}

#[test]
fn test_modules_installed_twice_conflict() {
    let mut bindings = BindingCollection::new();
    bindings.install(DatabaseModule { value: 1 });
    bindings.install(DatabaseModule { value: 2 });

    let err = bindings.build().unwrap_err();
    assert!(err
        .errors()
        .iter()
        .all(|e| matches!(e, DiError::ConflictingBinding { .. })));
}

#[test]
fn test_private_module_hides_internals() {
    let mut bindings = BindingCollection::new();
    bindings.install_private(|private: &mut BindingCollection| -> DiResult<()> {
        private.install(DatabaseModule { value: 9 });
        private.install(repository_module);
        private.expose::<dyn Repository>();
        Ok(())
    });
    let injector = bindings.build().unwrap();

    assert_eq!(injector.get::<dyn Repository>().unwrap().describe(), "users via conn-9");
    assert!(injector.get::<Config>().is_err());
}
