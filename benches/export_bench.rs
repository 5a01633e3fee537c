//! Benchmarks for datastore-csv
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn benchmark_identifier_recovery(c: &mut Criterion) {
    use datastore_csv::backup::{encode_reference, EntityKey, ReferenceTokenParser};
    use datastore_csv::export::KeyCodec;
    use std::sync::Arc;

    let codec = KeyCodec::new(Arc::new(ReferenceTokenParser));
    let token = encode_reference("s~example-app-prod", &EntityKey::with_id("User", 42));
    let pair = format!(
        "{}_{}",
        token,
        encode_reference("s~example-app-prod", &EntityKey::with_name("Group", "admins"))
    );

    c.bench_function("recover_single_token", |b| {
        b.iter(|| black_box(codec.recover_opaque_identifier_string(black_box(&token))))
    });

    c.bench_function("recover_token_pair", |b| {
        b.iter(|| black_box(codec.recover_opaque_identifier_string(black_box(&pair))))
    });

    c.bench_function("recover_plain_string", |b| {
        b.iter(|| black_box(codec.recover_opaque_identifier_string(black_box("just some text"))))
    });
}

fn benchmark_row_encoding(c: &mut Criterion) {
    use datastore_csv::backup::{DecodedEntity, EntityKey, PropertyValue, ReferenceTokenParser};
    use datastore_csv::export::{KeyCodec, Schema, ValueEncoder};
    use std::sync::Arc;

    let encoder = ValueEncoder::new(KeyCodec::new(Arc::new(ReferenceTokenParser)));
    let entity = DecodedEntity::new(EntityKey::with_id("Foo", 12345))
        .with_property("name", PropertyValue::String("some name".into()))
        .with_property("count", PropertyValue::Integer(42))
        .with_property("ratio", PropertyValue::Float(0.25))
        .with_property("active", PropertyValue::Boolean(true))
        .with_property("owner", PropertyValue::Key(EntityKey::with_name("User", "bob")));
    let mut schema = Schema::new();
    schema.observe(&entity);

    c.bench_function("encode_row", |b| {
        b.iter(|| black_box(encoder.encode_row(black_box(&entity), &schema)))
    });
}

criterion_group!(benches, benchmark_identifier_recovery, benchmark_row_encoding);
criterion_main!(benches);
