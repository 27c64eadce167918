/// Unit tests for error values
use ferrous_inject::{DiError, InjectionSite, Key};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

#[test]
fn test_missing_binding_display() {
    let plain = DiError::MissingBinding {
        key: Key::of::<u32>(),
        chain: Vec::new(),
    };
    assert!(plain.to_string().starts_with("no binding for u32"));

    let nested = DiError::MissingBinding {
        key: Key::of::<u32>(),
        chain: vec![Key::of::<String>()],
    };
    assert!(nested.to_string().contains(std::any::type_name::<String>()));
}

#[test]
fn test_circular_dependency_display_lists_path() {
    let err = DiError::CircularDependency {
        path: vec![Key::of::<u8>(), Key::of::<u16>(), Key::of::<u8>()],
    };
    let message = err.to_string();
    let first = message.find("u8").unwrap();
    let second = message.find("u16").unwrap();
    assert!(first < second);
    assert!(message.rfind("u8").unwrap() > second);
}

#[test]
fn test_construction_error_keeps_cause() {
    let err = DiError::Construction {
        key: Key::of::<u32>(),
        site: InjectionSite::Constructor,
        cause: Arc::new(DiskFull),
    };
    assert!(err.to_string().contains("disk full"));
    assert!(err.cause().unwrap().is::<DiskFull>());
    assert!(DiError::TypeMismatch(Key::of::<u32>()).cause().is_none());
}

#[test]
fn test_assembly_errors_flatten() {
    let inner = DiError::Assembly(vec![
        DiError::Configuration("a".into()),
        DiError::Assembly(vec![DiError::DepthExceeded(3), DiError::OutOfScope(Key::of::<u8>())]),
    ]);
    let errors = inner.errors();
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[1], DiError::DepthExceeded(3)));
    assert!(inner.to_string().contains("2 error(s)"));

    let single = DiError::Configuration("b".into());
    assert_eq!(single.errors().len(), 1);
}

#[test]
fn test_errors_are_cloneable_and_thread_safe() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DiError>();

    let err = DiError::ConflictingBinding {
        key: Key::of::<u8>(),
        reason: "bound more than once".into(),
    };
    assert_eq!(err.clone().to_string(), err.to_string());
}
