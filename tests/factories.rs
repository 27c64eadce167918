use ferrous_inject::{
    BindingCollection, BindingOrigin, Constructor, DiError, Factory, FactoryArgs, FactoryError,
    FactoryMethod, FactorySpec, Injectable, Key, Lifetime, Resolver,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Gateway {
    region: &'static str,
}

#[derive(Debug)]
struct Clock;

impl Injectable for Clock {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|_| Ok(Clock))
    }

    fn lifetime() -> Lifetime {
        Lifetime::Singleton
    }
}

#[derive(Debug, thiserror::Error)]
#[error("amount must be positive")]
struct InvalidAmount;

#[derive(Debug, thiserror::Error)]
#[error("amount over limit")]
struct LimitExceeded;

#[derive(Debug)]
struct Payment {
    amount: u64,
    memo: Arc<String>,
    gateway: Arc<Gateway>,
    clock: Arc<Clock>,
}

impl Injectable for Payment {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| {
            let amount = *args.next::<u64>()?;
            if amount == 0 {
                return Err(InvalidAmount.into());
            }
            if amount > 1_000_000 {
                return Err(LimitExceeded.into());
            }
            Ok(Payment {
                amount,
                memo: args.next()?,
                gateway: args.next()?,
                clock: args.next()?,
            })
        })
        .assisted_param::<u64>("")
        .assisted_param::<String>("memo")
        .param::<Gateway>()
        .param::<Clock>()
    }
}

trait PaymentFactory: Send + Sync {
    fn create(&self, amount: u64, memo: &str) -> Result<Arc<Payment>, FactoryError>;
}

impl PaymentFactory for Factory<dyn PaymentFactory> {
    fn create(&self, amount: u64, memo: &str) -> Result<Arc<Payment>, FactoryError> {
        self.invoke(
            "create",
            FactoryArgs::new().arg(amount).arg(memo.to_string()),
        )
    }
}

fn payment_spec() -> FactorySpec<dyn PaymentFactory> {
    FactorySpec::new().method(
        FactoryMethod::new::<Payment>("create")
            .param::<u64>()
            .assisted_param::<String>("memo")
            .rethrows::<InvalidAmount>(),
    )
}

fn payment_bindings() -> BindingCollection {
    let mut bindings = BindingCollection::new();
    bindings.bind_instance(Gateway { region: "eu" });
    bindings.describe::<Clock>();
    bindings.bind_factory(payment_spec());
    bindings
}

#[test]
fn test_factory_mixes_arguments_and_injected_dependencies() {
    let injector = payment_bindings().build().unwrap();
    let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();

    let a = factory.create(10, "rent").unwrap();
    let b = factory.create(20, "food").unwrap();

    assert_eq!((a.amount, a.memo.as_str()), (10, "rent"));
    assert_eq!((b.amount, b.memo.as_str()), (20, "food"));
    assert_eq!(a.gateway.region, "eu");
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.gateway, &b.gateway));
}

#[test]
fn test_factory_products_share_just_in_time_singletons() {
    let injector = payment_bindings().build().unwrap();
    let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();

    let a = factory.create(1, "a").unwrap();
    let b = factory.create(2, "b").unwrap();
    assert!(Arc::ptr_eq(&a.clock, &b.clock));
    assert!(Arc::ptr_eq(&a.clock, &injector.get::<Clock>().unwrap()));

    let clock = injector.binding(&Key::of::<Clock>()).unwrap();
    assert_eq!(clock.owner, injector.node_id());
    assert_eq!(clock.origin, BindingOrigin::JustInTime);
}

#[test]
fn test_factory_arguments_do_not_leak() {
    let injector = payment_bindings().build().unwrap();
    let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();
    factory.create(5, "once").unwrap();

    assert!(injector.binding(&Key::assisted::<u64>("")).is_none());
    assert!(injector.binding(&Key::assisted::<String>("memo")).is_none());
    assert!(injector.binding(&Key::of::<Payment>()).is_none());
}

#[test]
fn test_declared_failure_is_rethrown() {
    let injector = payment_bindings().build().unwrap();
    let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();

    let err = factory.create(0, "nothing").unwrap_err();
    assert!(matches!(err, FactoryError::Declared(_)));
    assert!(err.downcast_ref::<InvalidAmount>().is_some());
    assert_eq!(err.to_string(), "amount must be positive");
}

#[test]
fn test_undeclared_failure_is_wrapped() {
    let injector = payment_bindings().build().unwrap();
    let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();

    let err = factory.create(5_000_000, "too much").unwrap_err();
    match &err {
        FactoryError::Provision(DiError::Construction { key, cause, .. }) => {
            assert_eq!(*key, Key::of::<Payment>());
            assert!(cause.is::<LimitExceeded>());
        }
        other => panic!("unexpected {}", other),
    }
    assert!(err.downcast_ref::<LimitExceeded>().is_none());
}

#[test]
fn test_argument_mismatch_is_reported() {
    let injector = payment_bindings().build().unwrap();
    let factory = injector.get::<Factory<dyn PaymentFactory>>().unwrap();

    let too_few = factory.invoke::<Payment>("create", FactoryArgs::new().arg(5u64));
    assert!(matches!(too_few, Err(FactoryError::Provision(DiError::Configuration(_)))));

    let wrong_type = factory.invoke::<Payment>(
        "create",
        FactoryArgs::new().arg(5u32).arg("memo".to_string()),
    );
    match wrong_type {
        Err(FactoryError::Provision(DiError::Configuration(message))) => {
            assert!(message.contains("argument 0"));
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    let unknown = factory.invoke::<Payment>("refund", FactoryArgs::new());
    assert!(matches!(unknown, Err(FactoryError::Provision(DiError::Configuration(_)))));
}

#[test]
fn test_factory_with_unsatisfiable_product_fails_assembly() {
    let mut bindings = BindingCollection::new();
    bindings.describe::<Clock>();
    bindings.bind_factory(payment_spec());

    let err = bindings.build().unwrap_err();
    assert!(err.errors().iter().any(|e| matches!(
        e,
        DiError::MissingBinding { key, .. } if *key == Key::of::<Gateway>()
    )));
}

#[test]
fn test_factory_missing_an_assisted_parameter_fails_assembly() {
    let mut bindings = BindingCollection::new();
    bindings.bind_instance(Gateway { region: "us" });
    bindings.describe::<Clock>();
    bindings.bind_factory(
        FactorySpec::<dyn PaymentFactory>::new()
            .method(FactoryMethod::new::<Payment>("create").param::<u64>()),
    );

    let err = bindings.build().unwrap_err();
    assert!(err.errors().iter().any(|e| matches!(
        e,
        DiError::MissingBinding { key, .. } if *key == Key::assisted::<String>("memo")
    )));
}

#[test]
fn test_duplicate_parameters_are_rejected() {
    struct Pair;
    impl Injectable for Pair {
        fn constructor() -> Constructor<Self> {
            Constructor::new(|_| Ok(Pair))
        }
    }
    trait PairFactory {}

    let mut bindings = BindingCollection::new();
    bindings.bind_factory(
        FactorySpec::<dyn PairFactory>::new()
            .method(FactoryMethod::new::<Pair>("make").param::<u8>().param::<u8>()),
    );

    let err = bindings.build().unwrap_err();
    assert!(matches!(err.errors()[0], DiError::Configuration(message) if message.contains("make")));
}

trait Notification: Send + Sync {
    fn render(&self) -> String;
}

struct Email {
    to: Arc<String>,
    sent: Arc<AtomicUsize>,
}

impl Notification for Email {
    fn render(&self) -> String {
        self.sent.fetch_add(1, Ordering::SeqCst);
        format!("mail to {}", self.to)
    }
}

impl Injectable for Email {
    fn constructor() -> Constructor<Self> {
        Constructor::new(|args| {
            Ok(Email {
                to: args.next()?,
                sent: args.next()?,
            })
        })
        .assisted_param::<String>("")
        .param::<AtomicUsize>()
    }
}

trait NotificationFactory: Send + Sync {
    fn email(&self, to: &str) -> Result<Arc<dyn Notification>, FactoryError>;
}

impl NotificationFactory for Factory<dyn NotificationFactory> {
    fn email(&self, to: &str) -> Result<Arc<dyn Notification>, FactoryError> {
        self.invoke("email", FactoryArgs::new().arg(to.to_string()))
    }
}

#[test]
fn test_factory_returning_trait_object() {
    let mut bindings = BindingCollection::new();
    bindings.bind_instance(AtomicUsize::new(0));
    bindings.bind_factory(FactorySpec::<dyn NotificationFactory>::new().method(
        FactoryMethod::returning::<dyn Notification, Email>("email", |email| email)
            .param::<String>(),
    ));
    let injector = bindings.build().unwrap();

    let factory = injector.get::<Factory<dyn NotificationFactory>>().unwrap();
    let note = factory.email("ops@example.com").unwrap();
    assert_eq!(note.render(), "mail to ops@example.com");
    assert_eq!(injector.get::<AtomicUsize>().unwrap().load(Ordering::SeqCst), 1);
    assert_eq!(factory.methods().count(), 1);
}

#[test]
fn test_factory_in_child_sees_child_bindings() {
    let mut root = BindingCollection::new();
    root.describe::<Clock>();
    root.bind_factory(payment_spec());
    root.bind_supplier::<Gateway, _>(Lifetime::Transient, |_| Ok(Gateway { region: "root" }));
    let injector = root.build().unwrap();

    let mut request = BindingCollection::new();
    request.bind_factory(FactorySpec::<dyn NotificationFactory>::new().method(
        FactoryMethod::returning::<dyn Notification, Email>("email", |email| email)
            .param::<String>(),
    ));
    request.bind_instance(AtomicUsize::new(0));
    let child = injector.create_child(request).unwrap();

    let notes = child.get::<Factory<dyn NotificationFactory>>().unwrap();
    notes.email("a@b").unwrap().render();
    assert_eq!(child.get::<AtomicUsize>().unwrap().load(Ordering::SeqCst), 1);

    let payments = child.get::<Factory<dyn PaymentFactory>>().unwrap();
    assert_eq!(payments.create(3, "x").unwrap().gateway.region, "root");
}
