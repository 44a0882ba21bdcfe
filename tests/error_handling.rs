//! Error handling and edge case tests.

use propkit::{
    DeclareProperties, PropertyError, PropertyPool, PropertySlot, Value, ValueKind,
};

// --- Lookup Errors ---

#[test]
fn test_get_unknown_key() {
    let pool = PropertyPool::new();
    match pool.get::<i64>("nothing.here") {
        Err(PropertyError::UnknownKey(key)) => assert_eq!(key.as_str(), "nothing.here"),
        other => panic!("expected UnknownKey, got {:?}", other.map(|p| p.get())),
    }
}

#[test]
fn test_typed_get_wrong_kind() {
    let pool = PropertyPool::new();
    pool.create_or_get("main.level.name", String::from("1-1")).unwrap();

    match pool.get::<i64>("main.level.name") {
        Err(PropertyError::TypeMismatch { key, expected, got }) => {
            assert_eq!(key.as_str(), "main.level.name");
            assert_eq!(expected, ValueKind::Str);
            assert_eq!(got, ValueKind::Int);
        }
        other => panic!("expected TypeMismatch, got {:?}", other.map(|p| p.get())),
    }
}

#[test]
fn test_malformed_key_rejected_everywhere() {
    let pool = PropertyPool::new();
    assert!(matches!(
        pool.create_or_get("not a key", 0i64),
        Err(PropertyError::InvalidKey(_))
    ));
    assert!(matches!(
        pool.get_dyn("also..bad"),
        Err(PropertyError::InvalidKey(_))
    ));
    assert!(!pool.exists("also..bad"));
}

// --- Registration Errors ---

#[test]
fn test_duplicate_key_kind_conflict() {
    let pool = PropertyPool::new();
    pool.create_or_get("main.player.score", 0i64).unwrap();

    match pool.create_or_get("main.player.score", false) {
        Err(PropertyError::KindConflict {
            key,
            existing,
            requested,
        }) => {
            assert_eq!(key.as_str(), "main.player.score");
            assert_eq!(existing, ValueKind::Int);
            assert_eq!(requested, ValueKind::Bool);
        }
        other => panic!("expected KindConflict, got {:?}", other.map(|p| p.get())),
    }

    // The original record is untouched by the failed registration.
    assert_eq!(pool.get::<i64>("main.player.score").unwrap().get(), 0);
}

#[test]
fn test_registration_error_aborts_binding() {
    struct Broken;
    impl DeclareProperties for Broken {
        fn property_slots() -> Vec<PropertySlot> {
            vec![
                PropertySlot::new("ok.first", ValueKind::Int),
                PropertySlot::new("bad key!", ValueKind::Int),
                PropertySlot::new("ok.second", ValueKind::Int),
            ]
        }
    }

    let pool = PropertyPool::new();
    let err = pool.bind::<Broken>().unwrap_err();
    assert!(matches!(err, PropertyError::Registration { .. }));
    // Binding stopped at the offender; later slots never registered.
    assert!(pool.exists("ok.first"));
    assert!(!pool.exists("ok.second"));
}

// --- Runtime Operation Errors ---

#[test]
fn test_arithmetic_on_bool_is_unsupported() {
    let pool = PropertyPool::new();
    pool.create_or_get("flags.paused", false).unwrap();

    let handle = pool.get_dyn("flags.paused").unwrap();
    assert!(matches!(
        handle.add(1i64),
        Err(PropertyError::UnsupportedOperation { .. })
    ));
    // Toggle is the supported unary for bools.
    assert_eq!(handle.toggle().unwrap(), Value::Bool(true));
}

#[test]
fn test_operand_kind_is_runtime_checked() {
    let pool = PropertyPool::new();
    pool.create_or_get("main.player.score", 10i64).unwrap();

    let handle = pool.get_dyn("main.player.score").unwrap();
    let err = handle.add("ten").unwrap_err();
    assert!(matches!(err, PropertyError::TypeMismatch { .. }));
    // Failed combinators leave the value alone.
    assert_eq!(handle.value(), Value::Int(10));
}

#[test]
fn test_division_by_zero_is_loud() {
    let pool = PropertyPool::new();
    pool.create_or_get("main.player.score", 10i64).unwrap();
    let handle = pool.get_dyn("main.player.score").unwrap();
    assert!(matches!(
        handle.divide(0i64),
        Err(PropertyError::DivisionByZero(_))
    ));
}

#[test]
fn test_locked_record() {
    let pool = PropertyPool::new();
    let constant = pool.create_or_get("physics.max-speed", 400.0f64).unwrap();
    constant.handle().lock();

    assert!(matches!(
        constant.set(500.0),
        Err(PropertyError::Locked(_))
    ));
    assert_eq!(constant.get(), 400.0);
}

#[test]
fn test_bad_subscription_pattern() {
    let pool = PropertyPool::new();
    assert!(matches!(
        pool.subscribe("", |_: &propkit::PropertyHandle, _: &propkit::ValueChange| {}),
        Err(PropertyError::InvalidPattern(_))
    ));
    assert!(matches!(
        pool.subscribe_stream("$", 8),
        Err(PropertyError::InvalidPattern(_))
    ));
}

#[test]
fn test_runtime_errors_do_not_poison_the_pool() {
    let pool = PropertyPool::new();
    pool.create_or_get("a.b", 1i64).unwrap();

    let _ = pool.get::<bool>("a.b");
    let _ = pool.get::<i64>("missing.key");
    let _ = pool.get_dyn("a.b").unwrap().divide(0i64);

    // The frame loop keeps going.
    pool.get::<i64>("a.b").unwrap().set(2).unwrap();
    assert_eq!(pool.get::<i64>("a.b").unwrap().get(), 2);
}
