use std::hint::black_box;

use brrtcontract::formats::FormatRegistry;
use brrtcontract::validator::{SchemaArena, SchemaValidator};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

fn pet_document() -> Value {
    json!({
        "definitions": {
            "Tag": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "id": {"type": "integer", "format": "int64"},
                    "name": {"type": "string", "minLength": 1, "maxLength": 32}
                }
            },
            "Pet": {
                "type": "object",
                "required": ["name", "status"],
                "properties": {
                    "id": {"type": "integer", "format": "int64", "minimum": 1},
                    "name": {"type": "string", "pattern": "^[A-Za-z][A-Za-z ]*$"},
                    "status": {"type": "string", "enum": ["available", "pending", "sold"]},
                    "born": {"type": "string", "format": "date"},
                    "tags": {"type": "array", "maxItems": 64, "items": {"$ref": "#/definitions/Tag"}}
                }
            }
        }
    })
}

fn pet(tags: usize) -> Value {
    let tags: Vec<Value> = (0..tags).map(|i| json!({"id": i, "name": format!("tag{i}")})).collect();
    json!({"id": 7, "name": "Rex", "status": "available", "born": "2020-02-29", "tags": tags})
}

/// Valid pets of growing size
fn bench_valid_pet(c: &mut Criterion) {
    let mut arena = SchemaArena::new(pet_document());
    let id = arena.compile_ref("#/definitions/Pet").unwrap();
    let formats = FormatRegistry::default();
    let validator = SchemaValidator::new(&arena, &formats);

    let mut group = c.benchmark_group("valid_pet");
    for tags in [0usize, 8, 64] {
        let instance = pet(tags);
        group.bench_with_input(BenchmarkId::new("tags", tags), &instance, |b, instance| {
            b.iter(|| {
                let result = validator.validate(id, black_box(instance));
                assert!(result.is_valid());
            });
        });
    }
    group.finish();
}

/// Every property wrong, so errors accumulate across the whole object
fn bench_invalid_pet(c: &mut Criterion) {
    let mut arena = SchemaArena::new(pet_document());
    let id = arena.compile_ref("#/definitions/Pet").unwrap();
    let formats = FormatRegistry::default();
    let validator = SchemaValidator::new(&arena, &formats);
    let instance = json!({
        "id": 0,
        "name": "7ex",
        "status": "lost",
        "born": "2021-02-29",
        "tags": [{"id": "x"}, {"name": ""}]
    });

    c.bench_function("invalid_pet", |b| {
        b.iter(|| {
            let result = validator.validate(id, black_box(&instance));
            assert!(!result.is_valid());
        });
    });
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_pet", |b| {
        b.iter(|| {
            let mut arena = SchemaArena::new(pet_document());
            black_box(arena.compile_ref("#/definitions/Pet").unwrap())
        });
    });
}

criterion_group!(benches, bench_valid_pet, bench_invalid_pet, bench_compile);
criterion_main!(benches);
