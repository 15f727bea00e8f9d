// tests/codec_tests.rs
use std::sync::{Arc, Mutex};

use encrypted_field_vault::codec::{DataType, DecryptFallback, FieldCodec, FieldDescriptor};
use encrypted_field_vault::error::CoreError;
use encrypted_field_vault::{EngineRegistry, EnvelopeKeyManager};

mod common;
mod support;

use support::{fast_settings_with, memory_store, started_engine};

fn registry_with(identifier: &str, name: &str) -> Arc<EngineRegistry> {
    let registry = Arc::new(EngineRegistry::new());
    registry.register(name, started_engine(identifier, memory_store()));
    registry
}

fn card_descriptor() -> FieldDescriptor {
    FieldDescriptor::new("order", "cardNumber").crypto_engine("cardEngine")
}

#[test]
fn test_write_then_read_roundtrip() {
    common::setup();
    let registry = registry_with("codec-roundtrip", "cardEngine");
    let codec = FieldCodec::new(card_descriptor(), registry.clone()).unwrap();

    let stored = codec.write(Some("4111111111111111")).unwrap().unwrap();
    assert_ne!(stored, "4111111111111111");
    assert_eq!(
        registry.resolve("cardEngine").unwrap().decrypt_field(&stored).unwrap(),
        "4111111111111111"
    );
    assert_eq!(codec.read(Some(&stored)).unwrap().as_deref(), Some("4111111111111111"));
    assert_eq!(codec.fallback_count(), 0);
    assert!(codec.is_queryable());
}

#[test]
fn test_nulls_pass_through() {
    let registry = registry_with("codec-nulls", "cardEngine");
    let codec = FieldCodec::new(card_descriptor().null_marker("__NULL__"), registry).unwrap();

    assert_eq!(codec.write(None).unwrap(), None);
    assert_eq!(codec.read(None).unwrap(), None);
    assert_eq!(codec.read(Some("__NULL__")).unwrap(), None);
}

#[test]
fn test_encrypt_only_returns_stored_ciphertext() {
    let registry = registry_with("codec-write-only", "cardEngine");
    let codec = FieldCodec::new(card_descriptor().encrypt_only(true), registry).unwrap();

    let stored = codec.write(Some("4111111111111111")).unwrap().unwrap();
    assert_eq!(codec.read(Some(&stored)).unwrap(), Some(stored.clone()));
    assert_eq!(codec.fallback_count(), 0);
}

#[test]
fn test_undecryptable_value_falls_back_to_stored_value() {
    let registry = registry_with("codec-fallback", "cardEngine");
    let events: Arc<Mutex<Vec<DecryptFallback>>> = Arc::default();
    let sink = Arc::clone(&events);
    let codec = FieldCodec::new(card_descriptor(), registry)
        .unwrap()
        .on_fallback(move |event| sink.lock().unwrap().push(event.clone()));

    // Legacy plaintext row never migrated
    assert_eq!(
        codec.read(Some("4111111111111111")).unwrap().as_deref(),
        Some("4111111111111111")
    );

    // Ciphertext under some other engine's key
    let foreign = started_engine("codec-foreign", memory_store())
        .encrypt_field("5500000000000004")
        .unwrap();
    assert_eq!(codec.read(Some(&foreign)).unwrap(), Some(foreign.clone()));

    assert_eq!(codec.fallback_count(), 2);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].item_descriptor, "order");
    assert_eq!(events[0].property, "cardNumber");
    assert!(!events[0].error.is_empty());
}

#[test]
fn test_unresolvable_engine_fails_fast() {
    let registry = Arc::new(EngineRegistry::new());
    let codec = FieldCodec::new(card_descriptor(), registry.clone()).unwrap();

    assert!(matches!(codec.write(Some("4111")), Err(CoreError::Configuration(_))));
    assert!(matches!(codec.read(Some("anything")), Err(CoreError::Configuration(_))));

    // Null handling never needs the engine
    assert_eq!(codec.write(None).unwrap(), None);
    assert_eq!(codec.read(None).unwrap(), None);

    // Resolution is retried until it succeeds
    registry.register("cardEngine", started_engine("codec-late", memory_store()));
    assert!(codec.write(Some("4111")).unwrap().is_some());
}

#[test]
fn test_uninitialized_engine_fails_reads_instead_of_falling_back() {
    let store = memory_store();
    let ciphertext = started_engine("codec-uninit", store.clone())
        .encrypt_field("4111111111111111")
        .unwrap();

    // Lenient start with the wrong passphrase leaves no live key
    let broken =
        EnvelopeKeyManager::start(fast_settings_with("codec-uninit", "wrong-passphrase"), store)
            .unwrap();
    assert!(!broken.is_initialized());
    let registry = Arc::new(EngineRegistry::new());
    registry.register("cardEngine", Arc::new(broken));
    let codec = FieldCodec::new(card_descriptor(), registry).unwrap();

    assert!(matches!(
        codec.read(Some(&ciphertext)),
        Err(CoreError::EngineNotInitialized(_))
    ));
    assert!(matches!(
        codec.write(Some("4111111111111111")),
        Err(CoreError::EngineNotInitialized(_))
    ));
    assert_eq!(codec.fallback_count(), 0);
}

#[test]
fn test_encrypt_only_read_never_resolves_engine() {
    let codec = FieldCodec::new(
        card_descriptor().encrypt_only(true),
        Arc::new(EngineRegistry::new()),
    )
    .unwrap();
    assert_eq!(codec.read(Some("opaque")).unwrap().as_deref(), Some("opaque"));
}

#[test]
fn test_non_text_or_multi_valued_descriptors_are_rejected() {
    let registry = Arc::new(EngineRegistry::new());

    let mut numeric = card_descriptor();
    numeric.data_type = DataType::Integer;
    assert!(matches!(
        FieldCodec::new(numeric, registry.clone()),
        Err(CoreError::Configuration(_))
    ));

    let mut list = card_descriptor();
    list.multi_valued = true;
    assert!(matches!(
        FieldCodec::new(list, registry.clone()),
        Err(CoreError::Configuration(_))
    ));

    let unnamed = FieldDescriptor::new("order", "cardNumber");
    assert!(matches!(
        FieldCodec::new(unnamed, registry),
        Err(CoreError::Configuration(_))
    ));
}

#[test]
fn test_declarative_attributes() {
    let mut descriptor = FieldDescriptor::new("order", "cardNumber");
    descriptor.set_attribute("cryptoEngine", "cardEngine");
    descriptor.set_attribute("encryptOnly", "TRUE");
    descriptor.set_attribute("somethingElse", "ignored");
    assert_eq!(descriptor.crypto_engine, "cardEngine");
    assert!(descriptor.encrypt_only);

    let mut not_write_only = FieldDescriptor::new("order", "cardNumber");
    not_write_only.set_attribute("encryptOnly", "yes");
    assert!(!not_write_only.encrypt_only);
    assert_eq!(not_write_only.path(), "order.cardNumber");
}
