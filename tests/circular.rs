use ferrous_inject::{
    BindingCollection, Constructor, Deferred, DiError, Injectable, InjectorOptions, Key, Lifetime,
    Resolver,
};
use once_cell::sync::OnceCell;
use std::sync::Arc;

struct Parent {
    child: Arc<Child>,
}

struct Child {
    parent: Deferred<Parent>,
}

impl Injectable for Parent {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| Ok(Parent { child: args.next()? })).param::<Child>()
    }
}

impl Injectable for Child {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| {
            Ok(Child {
                parent: args.next_deferred()?,
            })
        })
        .deferred_param::<Parent>()
    }
}

fn cyclic_bindings() -> BindingCollection {
    let mut bindings = BindingCollection::new();
    bindings.describe::<Parent>().describe::<Child>();
    bindings
}

#[test]
fn test_deferred_edge_breaks_cycle() {
    let injector = cyclic_bindings().build().unwrap();

    let parent = injector.get::<Parent>().unwrap();
    let back = parent.child.parent.get().unwrap();
    assert!(parent.child.parent.was_deferred());
    assert!(parent.child.parent.is_resolved());
    assert!(Arc::ptr_eq(&parent, &back));
}

#[test]
fn test_cycle_entered_through_plain_edge_fails() {
    let injector = cyclic_bindings().build().unwrap();

    // Entering at Child closes the loop on Parent -> Child, which does not
    // accept a placeholder.
    match injector.get::<Child>() {
        Err(DiError::CircularDependency { path }) => {
            assert_eq!(
                path,
                vec![Key::of::<Child>(), Key::of::<Parent>(), Key::of::<Child>()]
            );
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    assert!(injector.get::<Parent>().is_ok());
}

#[test]
fn test_placeholders_can_be_disabled() {
    let options = InjectorOptions {
        circular_placeholders: false,
        ..InjectorOptions::default()
    };
    let injector = cyclic_bindings().with_options(options).build().unwrap();

    match injector.get::<Parent>() {
        Err(DiError::CircularDependency { path }) => {
            assert_eq!(
                path,
                vec![Key::of::<Parent>(), Key::of::<Child>(), Key::of::<Parent>()]
            );
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

struct Left;
struct Right;

impl Injectable for Left {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|_| Ok(Left)).param::<Right>()
    }
}

impl Injectable for Right {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|_| Ok(Right)).param::<Left>()
    }
}

#[test]
fn test_plain_cycle_is_reported_with_path() {
    let mut bindings = BindingCollection::new();
    bindings.describe::<Left>().describe::<Right>();
    let injector = bindings.build().unwrap();

    match injector.get::<Left>() {
        Err(DiError::CircularDependency { path }) => {
            assert_eq!(path, vec![Key::of::<Left>(), Key::of::<Right>(), Key::of::<Left>()]);
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    // The failed attempt left no construction state behind.
    assert!(matches!(
        injector.get::<Right>(),
        Err(DiError::CircularDependency { .. })
    ));
}

struct Registry {
    handler: Arc<Handler>,
}

struct Handler {
    registry: Deferred<Registry>,
}

#[test]
fn test_singleton_cycle_shares_the_singleton() {
    let mut bindings = BindingCollection::new();
    bindings.bind_constructor(
        Lifetime::Singleton,
        Constructor::new(|args| Ok(Registry { handler: args.next()? })).param::<Handler>(),
    );
    bindings.bind_constructor(
        Lifetime::Transient,
        Constructor::new(|args| {
            Ok(Handler {
                registry: args.next_deferred()?,
            })
        })
        .deferred_param::<Registry>(),
    );
    let injector = bindings.build().unwrap();

    let registry = injector.get::<Registry>().unwrap();
    assert!(Arc::ptr_eq(&registry, &registry.handler.registry.get().unwrap()));
    assert!(Arc::ptr_eq(&registry, &injector.get::<Registry>().unwrap()));
}

struct Owner {
    helper: OnceCell<Arc<Helper>>,
}

struct Helper {
    owner: Arc<Owner>,
}

#[test]
fn test_member_cycle_sees_constructed_instance() {
    let mut bindings = BindingCollection::new();
    bindings.bind_constructor(
        Lifetime::Transient,
        Constructor::new(|_| {
            Ok(Owner {
                helper: OnceCell::new(),
            })
        })
        .member::<Helper, _>("helper", |owner, helper| {
            let _ = owner.helper.set(helper);
            Ok(())
        }),
    );
    bindings.bind_constructor(
        Lifetime::Transient,
        Constructor::new(|args| Ok(Helper { owner: args.next()? })).param::<Owner>(),
    );
    let injector = bindings.build().unwrap();

    let owner = injector.get::<Owner>().unwrap();
    let helper = owner.helper.get().unwrap();
    assert!(Arc::ptr_eq(&owner, &helper.owner));
}

trait Api: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Service {
    client: Arc<Client>,
}

impl Api for Service {
    fn name(&self) -> &'static str {
        "service"
    }
}

struct Client {
    api: Deferred<dyn Api>,
}

#[test]
fn test_placeholder_through_linked_binding() {
    let mut bindings = BindingCollection::new();
    bindings.bind_constructor(
        Lifetime::Transient,
        Constructor::new(|args| Ok(Service { client: args.next()? })).param::<Client>(),
    );
    bindings.bind_constructor(
        Lifetime::Transient,
        Constructor::new(|args| Ok(Client { api: args.next_deferred()? }))
            .deferred_param::<dyn Api>(),
    );
    bindings.bind_linked::<dyn Api, Service>(|service| service);
    let injector = bindings.build().unwrap();

    let service = injector.get::<Service>().unwrap();
    assert_eq!(service.client.api.name(), "service");
    assert_eq!(
        Arc::as_ptr(&service) as *const (),
        Arc::as_ptr(&service.client.api.get().unwrap()) as *const ()
    );
}

#[test]
fn test_linked_cycle_fails_assembly() {
    let mut bindings = BindingCollection::new();
    bindings.bind_linked::<u8, u16>(|_| Arc::new(0u8));
    bindings.bind_linked::<u16, u8>(|_| Arc::new(0u16));

    let err = bindings.build().unwrap_err();
    let errors = err.errors();
    assert_eq!(errors.len(), 1);
    match errors[0] {
        DiError::ConflictingBinding { reason, .. } => {
            assert!(reason.contains("linked bindings form a cycle"));
        }
        other => panic!("unexpected {}", other),
    }
}

struct Level1;
struct Level2;
struct Level3;
struct Level4;

#[test]
fn test_depth_limit() {
    let options = InjectorOptions {
        max_depth: 3,
        ..InjectorOptions::default()
    };
    let mut bindings = BindingCollection::new().with_options(options);
    bindings
        .bind_constructor(Lifetime::Transient, Constructor::new(|_| Ok(Level1)).param::<Level2>())
        .bind_constructor(Lifetime::Transient, Constructor::new(|_| Ok(Level2)).param::<Level3>())
        .bind_constructor(Lifetime::Transient, Constructor::new(|_| Ok(Level3)).param::<Level4>());
    bindings.bind_instance(Level4);
    let injector = bindings.build().unwrap();

    assert!(matches!(injector.get::<Level1>(), Err(DiError::DepthExceeded(3))));
    assert!(injector.get::<Level2>().is_ok());
}
