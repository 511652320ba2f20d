//! Integration tests for a process-wide host kept in a static.
//!
//! Declarations usually happen from many places against one shared host, so
//! the host lives in a `LazyLock` and is reached from each test.
//!
//! NOTE: All tests use #[serial] because they share the same static host
//! (REGISTRATE). Running them in parallel would interleave their pending
//! counts and trace callbacks.

use deferred_registry::{Builder, Category, Handle, Registrate, RegistrateConfig};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

static REGISTRATE: LazyLock<Registrate> =
    LazyLock::new(|| Registrate::with_config(RegistrateConfig::new("shared")));

static OTHER: LazyLock<Registrate> = LazyLock::new(|| Registrate::new("other"));

// ============================================================================
// Entries declared ahead of use
// ============================================================================

struct Fluid;

/// Declares the fluid entries; each call to `fluids()` after the first
/// returns the same handles through lookup.
fn fluids() -> (Handle<String>, Handle<String>) {
    let category = Category::of::<Fluid>();
    if REGISTRATE.contains("water", category) {
        return (
            REGISTRATE.get("water", category),
            REGISTRATE.get("lava", category),
        );
    }

    let water = REGISTRATE
        .simple((), "water", category, || Ok("water".to_string()))
        .register()
        .unwrap();
    let lava = REGISTRATE
        .simple((), "lava", category, || Ok("lava".to_string()))
        .register()
        .unwrap();
    (water, lava)
}

#[test]
#[serial]
fn test_declare_then_resolve_later() {
    let (water, lava) = fluids();

    REGISTRATE.run_registration_for(Category::of::<Fluid>()).unwrap();

    assert_eq!(&*water.get().unwrap(), "water");
    assert_eq!(&*lava.get().unwrap(), "lava");
    assert_eq!(water.id().unwrap().to_string(), "shared:water");
}

#[test]
#[serial]
fn test_lookup_returns_equal_handles() {
    let (water, _) = fluids();
    let again = REGISTRATE.get::<String>("water", Category::of::<Fluid>());

    assert_eq!(water, again);
    assert!(REGISTRATE.get::<String>("milk", Category::of::<Fluid>()).is_empty());
}

#[test]
#[serial]
fn test_with_tracing() {
    struct Biome;

    let event_count = Arc::new(AtomicUsize::new(0));
    let event_count_clone = Arc::clone(&event_count);
    REGISTRATE.set_trace_callback(move |_event| {
        event_count_clone.fetch_add(1, Ordering::SeqCst);
    });

    let plains = REGISTRATE
        .simple((), "plains", Category::of::<Biome>(), || Ok(0.8f32))
        .register()
        .unwrap(); // +1 event
    REGISTRATE.run_registration_for(Category::of::<Biome>()).unwrap(); // +1 event
    let _ = plains.get_sibling::<f32>(Category::of::<Fluid>()); // +1 event

    assert_eq!(event_count.load(Ordering::SeqCst), 3);
    assert_eq!(*plains.get().unwrap(), 0.8);

    REGISTRATE.clear_trace_callback();
}

#[test]
#[serial]
fn test_trait_object_entries() {
    trait Behavior: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Glowing;
    impl Behavior for Glowing {
        fn name(&self) -> &str {
            "glowing"
        }
    }

    struct Effect;

    let handle = REGISTRATE
        .simple((), "glow", Category::of::<Effect>(), || {
            Ok(Arc::new(Glowing) as Arc<dyn Behavior>)
        })
        .register()
        .unwrap();
    REGISTRATE.run_registration_for(Category::of::<Effect>()).unwrap();

    let behavior: Arc<Arc<dyn Behavior>> = handle.get().unwrap();
    assert_eq!(behavior.name(), "glowing");
}

#[test]
#[serial]
fn test_hosts_are_isolated() {
    struct Sound;

    let mine = REGISTRATE
        .simple((), "click", Category::of::<Sound>(), || Ok(1u32))
        .register()
        .unwrap();
    let theirs = OTHER
        .simple((), "click", Category::of::<Sound>(), || Ok(2u32))
        .register()
        .unwrap();

    // same name and category, different namespace
    assert_ne!(mine, theirs);

    REGISTRATE.run_registration_for(Category::of::<Sound>()).unwrap();
    assert!(mine.is_present());
    assert!(!theirs.is_present());
    assert!(!OTHER.is_closed(Category::of::<Sound>()));

    OTHER.run_registration().unwrap();
    assert_eq!(*theirs.get().unwrap(), 2);
}
