use ferrous_inject::{
    Arguments, BindingCollection, ConstructionProxy, Constructor, DiError, DiResult, Injectable,
    InjectorOptions, Key, Lifetime, Resolver, Stage,
};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Config(&'static str);
struct Session(u32);

#[test]
fn test_child_sees_parent_but_not_the_reverse() {
    let mut root = BindingCollection::new();
    root.bind_instance(Config("prod"));
    let injector = root.build().unwrap();

    let mut request = BindingCollection::new();
    request.bind_instance(Session(7));
    let child = injector.create_child(request).unwrap();

    assert_eq!(child.get::<Config>().unwrap().0, "prod");
    assert_eq!(child.get::<Session>().unwrap().0, 7);
    assert!(injector.get::<Session>().is_err());
    assert_eq!(child.parent().unwrap().node_id(), injector.node_id());
}

#[test]
fn test_child_cannot_rebind_parent_key() {
    let mut root = BindingCollection::new();
    root.bind_instance(Config("prod"));
    let injector = root.build().unwrap();

    let mut child = BindingCollection::new();
    child.bind_instance(Config("test"));
    let err = injector.create_child(child).unwrap_err();

    assert!(matches!(
        err.errors()[0],
        DiError::ConflictingBinding { key, .. } if *key == Key::of::<Config>()
    ));
    // The failed child left the parent untouched.
    assert_eq!(injector.get::<Config>().unwrap().0, "prod");
    assert_eq!(injector.bindings().len(), 1);
}

#[test]
fn test_sibling_children_may_bind_the_same_key() {
    let injector = BindingCollection::new().build().unwrap();

    let mut first = BindingCollection::new();
    first.bind_instance(Session(1));
    let mut second = BindingCollection::new();
    second.bind_instance(Session(2));

    let a = injector.create_child(first).unwrap();
    let b = injector.create_child(second).unwrap();
    assert_eq!(a.get::<Session>().unwrap().0, 1);
    assert_eq!(b.get::<Session>().unwrap().0, 2);
}

struct Audit {
    session: Arc<Session>,
}

impl Injectable for Audit {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| Ok(Audit { session: args.next()? })).param::<Session>()
    }
}

struct Clock;

impl Injectable for Clock {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|_| Ok(Clock))
    }

    fn lifetime() -> Lifetime {
        Lifetime::Singleton
    }
}

#[test]
fn test_just_in_time_binding_lives_where_first_requested() {
    let mut root = BindingCollection::new();
    root.describe::<Audit>().describe::<Clock>();
    let injector = root.build().unwrap();

    let mut request = BindingCollection::new();
    request.bind_instance(Session(42));
    let child = injector.create_child(request).unwrap();

    // Audit needs the child's Session, so its binding belongs to the child.
    assert_eq!(child.get::<Audit>().unwrap().session.0, 42);
    let audit = child.binding(&Key::of::<Audit>()).unwrap();
    assert_eq!(audit.owner, child.node_id());
    assert!(matches!(injector.get::<Audit>(), Err(DiError::MissingBinding { .. })));
}

#[test]
fn test_just_in_time_singleton_is_shared_by_siblings() {
    let mut root = BindingCollection::new();
    root.describe::<Clock>();
    let injector = root.build().unwrap();

    let a = injector.create_child(BindingCollection::new()).unwrap();
    let b = injector.create_child(BindingCollection::new()).unwrap();

    // Requested from a child first, the singleton is still owned by the root.
    let from_a = a.get::<Clock>().unwrap();
    assert_eq!(a.binding(&Key::of::<Clock>()).unwrap().owner, injector.node_id());
    assert!(Arc::ptr_eq(&from_a, &b.get::<Clock>().unwrap()));
    assert!(Arc::ptr_eq(&from_a, &injector.get::<Clock>().unwrap()));

    // Dropping the child that triggered it does not lose the instance.
    drop(a);
    assert!(Arc::ptr_eq(&from_a, &injector.get::<Clock>().unwrap()));
}

#[test]
fn test_just_in_time_singleton_needing_child_binding_stays_in_child() {
    struct Tracker {
        session: Arc<Session>,
    }
    impl Injectable for Tracker {
        fn constructor() -> Constructor<Self> {
            Constructor::new(|args| Ok(Tracker { session: args.next()? })).param::<Session>()
        }

        fn lifetime() -> Lifetime {
            Lifetime::Singleton
        }
    }

    let mut root = BindingCollection::new();
    root.describe::<Tracker>();
    let injector = root.build().unwrap();

    let mut request = BindingCollection::new();
    request.bind_instance(Session(3));
    let child = injector.create_child(request).unwrap();

    let tracker = child.get::<Tracker>().unwrap();
    assert_eq!(tracker.session.0, 3);
    assert_eq!(child.binding(&Key::of::<Tracker>()).unwrap().owner, child.node_id());
    assert!(Arc::ptr_eq(&tracker, &child.get::<Tracker>().unwrap()));
}

#[test]
fn test_root_just_in_time_binding_is_shared_with_children() {
    let mut root = BindingCollection::new();
    root.describe::<Clock>();
    let injector = root.build().unwrap();

    let clock = injector.get::<Clock>().unwrap();
    let child = injector.create_child(BindingCollection::new()).unwrap();
    assert!(Arc::ptr_eq(&clock, &child.get::<Clock>().unwrap()));
    assert_eq!(child.binding(&Key::of::<Clock>()).unwrap().owner, injector.node_id());
}

#[test]
fn test_explicit_child_binding_overrides_parent_just_in_time_binding() {
    let mut root = BindingCollection::new();
    root.describe::<Clock>();
    let injector = root.build().unwrap();
    injector.get::<Clock>().unwrap();

    let mut child = BindingCollection::new();
    child.bind_instance(Clock);
    // Explicit in the child, just-in-time in the parent: the child's
    // explicit binding wins from the child.
    let child = injector.create_child(child).unwrap();
    assert_eq!(
        child.binding(&Key::of::<Clock>()).unwrap().owner,
        child.node_id()
    );
}

#[test]
fn test_dropping_child_discards_its_environment() {
    let injector = BindingCollection::new().build().unwrap();

    let mut request = BindingCollection::new();
    request.bind_instance(Session(1));
    let child = injector.create_child(request).unwrap();
    let grandchild = child.create_child(BindingCollection::new()).unwrap();
    let id = grandchild.node_id();

    drop(child);
    // The grandchild keeps its ancestors alive.
    assert_eq!(grandchild.get::<Session>().unwrap().0, 1);
    drop(grandchild);

    let mut again = BindingCollection::new();
    again.bind_instance(Session(2));
    let fresh = injector.create_child(again).unwrap();
    assert_ne!(fresh.node_id(), id);
    assert_eq!(fresh.get::<Session>().unwrap().0, 2);
}

#[test]
fn test_explicit_bindings_only() {
    let options = InjectorOptions {
        require_explicit_bindings: true,
        ..InjectorOptions::default()
    };
    let mut bindings = BindingCollection::new().with_options(options);
    bindings.describe::<Clock>();
    let injector = bindings.build().unwrap();

    assert!(matches!(injector.get::<Clock>(), Err(DiError::MissingBinding { .. })));
}

struct Secret(&'static str);

struct Vault {
    secret: Arc<Secret>,
}

fn vault_module(bindings: &mut BindingCollection) -> DiResult<()> {
    bindings.bind_instance(Secret("hunter2"));
    bindings.bind_supplier::<Vault, _>(Lifetime::Singleton, |r| Ok(Vault { secret: r.get()? }));
    bindings.expose::<Vault>();
    Ok(())
}

#[test]
fn test_private_environment_exposes_only_selected_keys() {
    let mut bindings = BindingCollection::new();
    bindings.install_private(vault_module);
    let injector = bindings.build().unwrap();

    let vault = injector.get::<Vault>().unwrap();
    assert_eq!(vault.secret.0, "hunter2");
    assert!(Arc::ptr_eq(&vault, &injector.get::<Vault>().unwrap()));
    assert!(matches!(injector.get::<Secret>(), Err(DiError::MissingBinding { .. })));

    let descriptor = injector.binding(&Key::of::<Vault>()).unwrap();
    assert_eq!(descriptor.exposed_by, Some(descriptor.owner));
    assert_ne!(descriptor.owner, injector.node_id());
}

#[test]
fn test_sibling_private_environments_may_share_private_keys() {
    struct Reader(&'static str);
    struct Writer(&'static str);

    let mut bindings = BindingCollection::new();
    bindings.install_private(|private: &mut BindingCollection| -> DiResult<()> {
        private.bind_instance(Secret("read"));
        private.bind_supplier::<Reader, _>(Lifetime::Transient, |r| {
            Ok(Reader(r.get::<Secret>()?.0))
        });
        private.expose::<Reader>();
        Ok(())
    });
    bindings.install_private(|private: &mut BindingCollection| -> DiResult<()> {
        private.bind_instance(Secret("write"));
        private.bind_supplier::<Writer, _>(Lifetime::Transient, |r| {
            Ok(Writer(r.get::<Secret>()?.0))
        });
        private.expose::<Writer>();
        Ok(())
    });
    let injector = bindings.build().unwrap();

    assert_eq!(injector.get::<Reader>().unwrap().0, "read");
    assert_eq!(injector.get::<Writer>().unwrap().0, "write");
}

#[test]
fn test_exposure_conflicts() {
    // Exposed but never bound.
    let mut unbound = BindingCollection::new();
    unbound.install_private(|private: &mut BindingCollection| -> DiResult<()> {
        private.expose::<Secret>();
        Ok(())
    });
    assert!(matches!(
        unbound.build().unwrap_err().errors()[0],
        DiError::ConflictingBinding { key, .. } if *key == Key::of::<Secret>()
    ));

    // Two private environments exposing one key.
    let mut twice = BindingCollection::new();
    twice.install_private(vault_module);
    twice.install_private(vault_module);
    let err = twice.build().unwrap_err();
    assert!(err
        .errors()
        .iter()
        .any(|e| matches!(
            e,
            DiError::ConflictingBinding { key, .. } if *key == Key::of::<Vault>()
        )));

    // Exposed by a private environment and bound by its parent.
    let mut shadowed = BindingCollection::new();
    shadowed.bind_supplier::<Vault, _>(Lifetime::Transient, |_| {
        Ok(Vault {
            secret: Arc::new(Secret("parent")),
        })
    });
    shadowed.install_private(vault_module);
    assert!(shadowed.build().is_err());

    // Only private environments expose.
    let mut root = BindingCollection::new();
    root.bind_instance(Session(1));
    root.expose::<Session>();
    assert!(root.build().is_err());
}

#[test]
fn test_private_environment_re_exposes_nested_binding() {
    let mut bindings = BindingCollection::new();
    bindings.install_private(|outer: &mut BindingCollection| -> DiResult<()> {
        outer.install_private(vault_module);
        outer.expose::<Vault>();
        Ok(())
    });
    let injector = bindings.build().unwrap();
    assert_eq!(injector.get::<Vault>().unwrap().secret.0, "hunter2");
}

#[test]
fn test_private_just_in_time_binding_stays_private() {
    let mut bindings = BindingCollection::new();
    bindings.describe::<Audit>();
    bindings.install_private(|private: &mut BindingCollection| -> DiResult<()> {
        private.bind_instance(Session(5));
        private.bind_supplier::<u32, _>(Lifetime::Transient, |r| Ok(r.get::<Audit>()?.session.0));
        private.expose::<u32>();
        Ok(())
    });
    let injector = bindings.build().unwrap();

    assert_eq!(*injector.get::<u32>().unwrap(), 5);
    // Audit was created inside the private environment, where Session lives.
    assert!(injector.get::<Audit>().is_err());
}

struct Tagged(Arc<dyn ConstructionProxy>, Arc<Mutex<Vec<&'static str>>>, &'static str);

impl ConstructionProxy for Tagged {
    fn new_instance(
        &self,
        args: &mut Arguments,
    ) -> Result<ferrous_inject::AnyInstance, ferrous_inject::BoxError> {
        self.1.lock().unwrap().push(self.2);
        self.0.new_instance(args)
    }
}

#[test]
fn test_interceptors_apply_to_owned_bindings_outer_first() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut root = BindingCollection::new();
    let root_log = log.clone();
    root.describe::<Clock>();
    root.intercept_construction(move |_key: &Key, proxy: Arc<dyn ConstructionProxy>| {
        Arc::new(Tagged(proxy, root_log.clone(), "root")) as Arc<dyn ConstructionProxy>
    });
    let injector = root.build().unwrap();

    let mut request = BindingCollection::new();
    let child_log = log.clone();
    request.intercept_construction(move |_key: &Key, proxy: Arc<dyn ConstructionProxy>| {
        Arc::new(Tagged(proxy, child_log.clone(), "child")) as Arc<dyn ConstructionProxy>
    });
    let child = injector.create_child(request).unwrap();

    child.get::<Clock>().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["child", "root"]);

    log.lock().unwrap().clear();
    injector.get::<Clock>().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["root"]);
}

static STATIC_CONFIG: OnceCell<Arc<Config>> = OnceCell::new();

#[test]
fn test_static_injection_runs_at_assembly() {
    let mut bindings = BindingCollection::new();
    bindings.bind_instance(Config("static"));
    bindings.request_static_injection::<Config, _>("STATIC_CONFIG", |config| {
        let _ = STATIC_CONFIG.set(config);
        Ok(())
    });
    bindings.build().unwrap();
    assert_eq!(STATIC_CONFIG.get().unwrap().0, "static");

    let mut missing = BindingCollection::new();
    missing.request_static_injection::<Session, _>("SESSION", |_| Ok(()));
    assert!(missing.build().is_err());
}

#[test]
fn test_production_stage_builds_singletons_eagerly() {
    let built = Arc::new(AtomicUsize::new(0));

    let make = |stage: Stage| {
        let counter = built.clone();
        let mut bindings = BindingCollection::new().with_options(InjectorOptions {
            stage,
            ..InjectorOptions::default()
        });
        bindings.bind_supplier::<Config, _>(Lifetime::Singleton, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Config("eager"))
        });
        bindings.build().unwrap()
    };

    let _dev = make(Stage::Development);
    assert_eq!(built.load(Ordering::SeqCst), 0);
    let prod = make(Stage::Production);
    assert_eq!(built.load(Ordering::SeqCst), 1);
    prod.get::<Config>().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_eager_singleton_fails_build() {
    let mut bindings = BindingCollection::new().with_options(InjectorOptions {
        stage: Stage::Production,
        ..InjectorOptions::default()
    });
    bindings.bind_supplier::<Config, _>(Lifetime::Singleton, |_| Err("no config".into()));
    let err = bindings.build().unwrap_err();
    assert!(matches!(err.errors()[0], DiError::Construction { .. }));
}

#[test]
fn test_prewarm_in_development() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    let mut bindings = BindingCollection::new();
    bindings.bind_supplier::<Config, _>(Lifetime::Singleton, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Config("warm"))
    });
    bindings.prewarm::<Config>();
    let injector = bindings.build().unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    injector.get::<Config>().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}
