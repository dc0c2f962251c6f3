use std::sync::Arc;
use std::thread;
use wirepack::{FieldOptions, Serializer, TypeInfo, TypeRegistry, WireMessage};

#[derive(WireMessage, Default, Debug, PartialEq, Clone)]
struct Reading {
    #[wire(1)]
    sensor: String,
    #[wire(2, signed)]
    offset: i64,
    #[wire(3, fixed32)]
    raw: u32,
    #[wire(4)]
    samples: Vec<u32>,
}

/// The same schema as `Reading`, with a hand-written field table.
#[derive(Default, Debug, PartialEq, Clone)]
struct ManualReading {
    sensor: String,
    offset: i64,
    raw: u32,
    samples: Vec<u32>,
}

impl WireMessage for ManualReading {
    fn type_info() -> wirepack::Result<TypeInfo<Self>> {
        TypeInfo::<Self>::builder("ManualReading", ManualReading::default)
            .field(1, "sensor", |r| &r.sensor, |r| &mut r.sensor)
            .field_with(
                2,
                "offset",
                FieldOptions::new().signed(),
                |r| &r.offset,
                |r| &mut r.offset,
            )
            .field_with(
                3,
                "raw",
                FieldOptions::new().fixed32(),
                |r| &r.raw,
                |r| &mut r.raw,
            )
            .field(4, "samples", |r| &r.samples, |r| &mut r.samples)
            .build()
    }
}

fn reading() -> Reading {
    Reading {
        sensor: "t1".to_string(),
        offset: -300,
        raw: 0xdead_beef,
        samples: vec![1, 128, 70_000],
    }
}

fn manual(reading: &Reading) -> ManualReading {
    ManualReading {
        sensor: reading.sensor.clone(),
        offset: reading.offset,
        raw: reading.raw,
        samples: reading.samples.clone(),
    }
}

// =============================================================================
// Derived and hand-built tables
// =============================================================================

#[test]
fn test_derived_and_manual_tables_are_byte_identical() {
    let derived = reading();
    let generated = wirepack::serialize(&derived).unwrap();
    let handwritten = wirepack::serialize(&manual(&derived)).unwrap();
    assert_eq!(generated, handwritten);

    let cross: ManualReading = wirepack::deserialize(&generated).unwrap();
    assert_eq!(cross, manual(&derived));
    let back: Reading = wirepack::deserialize(&handwritten).unwrap();
    assert_eq!(back, derived);
}

#[test]
fn test_tables_describe_the_same_fields() {
    let derived = Reading::type_info().unwrap();
    let handwritten = ManualReading::type_info().unwrap();
    let generated: Vec<_> = derived
        .fields()
        .iter()
        .map(|f| (f.number(), f.wire_type(), f.name()))
        .collect();
    let handwritten: Vec<_> = handwritten
        .fields()
        .iter()
        .map(|f| (f.number(), f.wire_type(), f.name()))
        .collect();
    assert_eq!(generated, handwritten);
    assert_eq!(derived.name(), "Reading");
}

// =============================================================================
// Registry behavior
// =============================================================================

#[test]
fn test_resolve_caches_table() {
    let registry = TypeRegistry::new();
    assert!(registry.is_empty());
    let first = registry.resolve::<Reading>().unwrap();
    let second = registry.resolve::<Reading>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_keeps_first_table() {
    let registry = TypeRegistry::new();
    let first = registry.register(ManualReading::type_info().unwrap());
    let second = registry.register(ManualReading::type_info().unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &registry.get::<ManualReading>().unwrap()));
}

#[test]
fn test_registries_are_independent() {
    let a = TypeRegistry::new();
    let b = TypeRegistry::new();
    Serializer::new(&a).serialize(&reading()).unwrap();
    assert!(a.contains::<Reading>());
    assert!(!b.contains::<Reading>());
}

#[test]
fn test_concurrent_resolution_publishes_one_table() {
    let registry = Arc::new(TypeRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.resolve::<Reading>().unwrap())
        })
        .collect();
    let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for table in &tables[1..] {
        assert!(Arc::ptr_eq(&tables[0], table));
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_concurrent_serialization_is_consistent() {
    let expected = wirepack::serialize(&reading()).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let mut value = reading();
                value.samples.push(i);
                let bytes = wirepack::serialize(&value).unwrap();
                let decoded: Reading = wirepack::deserialize(&bytes).unwrap();
                assert_eq!(decoded, value);
                bytes
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let bytes = handle.join().unwrap();
        assert_eq!(&bytes[..expected.len()], expected.as_ref());
        assert_eq!(bytes[expected.len()..], [0x20, i as u8]);
    }
}
