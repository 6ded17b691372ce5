//! Parameter binding: location lookup, collection splitting, coercion and
//! constraint checks, all failures collected per request.

mod common;

use std::sync::Arc;

use brrtcontract::binder::{FileHandle, FormData, ParamValue, ParameterBinder, RawParts};
use brrtcontract::errors::ValidationErrorKind;
use brrtcontract::formats::FormatRegistry;
use brrtcontract::spec::{ParamLocation, Parameter};
use brrtcontract::validator::{SchemaArena, SchemaValidator};
use brrtcontract::ContractConfig;
use chrono::NaiveDate;
use common::query;
use http::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

struct Fixture {
    binder: ParameterBinder,
    arena: SchemaArena,
    formats: FormatRegistry,
}

impl Fixture {
    fn new(params: Value) -> Self {
        let params: Vec<Parameter> = serde_json::from_value(params).unwrap();
        let mut arena = SchemaArena::default();
        let binder = ParameterBinder::new(&params, &mut arena, &ContractConfig::default()).unwrap();
        Self {
            binder,
            arena,
            formats: FormatRegistry::default(),
        }
    }

    fn bind(&self, raw: RawParts<'_>) -> (brrtcontract::binder::BoundRequest, brrtcontract::ValidationResult) {
        self.binder.bind(&raw, &SchemaValidator::new(&self.arena, &self.formats))
    }
}

fn strings(items: &[&str]) -> ParamValue {
    ParamValue::Array(items.iter().map(|s| ParamValue::String(s.to_string())).collect())
}

#[test]
fn test_csv_query_array() {
    let fixture = Fixture::new(json!([
        {"name": "tags", "in": "query", "type": "array", "items": {"type": "string"}}
    ]));
    let pairs = query(&[("tags", "a,b,c")]);
    let (bound, result) = fixture.bind(RawParts {
        query: &pairs,
        ..RawParts::default()
    });
    assert!(result.is_valid(), "{result}");
    assert_eq!(bound.get("tags"), Some(&strings(&["a", "b", "c"])));
}

#[test]
fn test_multi_query_array() {
    let fixture = Fixture::new(json!([
        {"name": "tags", "in": "query", "type": "array", "items": {"type": "string"}, "collectionFormat": "multi"}
    ]));
    let pairs = query(&[("tags", "a"), ("other", "x"), ("tags", "b")]);
    let (bound, result) = fixture.bind(RawParts {
        query: &pairs,
        ..RawParts::default()
    });
    assert!(result.is_valid());
    assert_eq!(bound.get("tags"), Some(&strings(&["a", "b"])));
}

#[test]
fn test_multi_on_header_is_configuration_error() {
    let params: Vec<Parameter> = serde_json::from_value(json!([
        {"name": "X-Tags", "in": "header", "type": "array", "items": {"type": "string"}, "collectionFormat": "multi"}
    ]))
    .unwrap();
    let mut arena = SchemaArena::default();
    let err = ParameterBinder::new(&params, &mut arena, &ContractConfig::default()).unwrap_err();
    assert_eq!(err.errors()[0].kind, ValidationErrorKind::InvalidCollectionFormat);
    assert_eq!(err.errors()[0].location, Some(ParamLocation::Header));
}

#[test]
fn test_other_collection_formats() {
    let fixture = Fixture::new(json!([
        {"name": "ssv", "in": "query", "type": "array", "items": {"type": "integer"}, "collectionFormat": "ssv"},
        {"name": "pipes", "in": "query", "type": "array", "items": {"type": "string"}, "collectionFormat": "pipes"},
        {"name": "X-Tsv", "in": "header", "type": "array", "items": {"type": "string"}, "collectionFormat": "tsv"}
    ]));
    let pairs = query(&[("ssv", "1 2 3"), ("pipes", "x|y")]);
    let mut headers = HeaderMap::new();
    headers.insert("x-tsv", HeaderValue::from_static("p\tq"));
    let (bound, result) = fixture.bind(RawParts {
        query: &pairs,
        headers: Some(&headers),
        ..RawParts::default()
    });
    assert!(result.is_valid(), "{result}");
    assert_eq!(
        bound.get("ssv"),
        Some(&ParamValue::Array(vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)]))
    );
    assert_eq!(bound.get("pipes"), Some(&strings(&["x", "y"])));
    assert_eq!(bound.get("X-Tsv"), Some(&strings(&["p", "q"])));
}

#[test]
fn test_missing_required_query_param() {
    let fixture = Fixture::new(json!([
        {"name": "limit", "in": "query", "type": "integer", "required": true},
        {"name": "offset", "in": "query", "type": "integer"}
    ]));
    let (bound, result) = fixture.bind(RawParts::default());
    assert!(bound.is_empty());
    assert_eq!(result.errors().len(), 1);
    let error = &result.errors()[0];
    assert_eq!(error.kind, ValidationErrorKind::Required);
    assert_eq!(error.path, "limit");
    assert_eq!(error.location, Some(ParamLocation::Query));
}

#[test]
fn test_every_failure_collected() {
    let fixture = Fixture::new(json!([
        {"name": "id", "in": "path", "type": "integer", "format": "int32", "required": true},
        {"name": "limit", "in": "query", "type": "integer", "maximum": 10},
        {"name": "when", "in": "query", "type": "string", "format": "date"},
        {"name": "X-Token", "in": "header", "type": "string", "required": true}
    ]));
    let path_params = [(Arc::<str>::from("id"), "99999999999".to_string())];
    let pairs = query(&[("limit", "11"), ("when", "2024-13-40")]);
    let (_, result) = fixture.bind(RawParts {
        path_params: &path_params,
        query: &pairs,
        ..RawParts::default()
    });
    let mut kinds: Vec<&str> = result.errors().iter().map(|e| e.kind.as_str()).collect();
    kinds.sort_unstable();
    // int32 overflow, maximum, invalid date, missing header
    assert_eq!(kinds, vec!["maximum", "parse", "parse", "required"]);
}

#[test]
fn test_scalar_coercion() {
    let fixture = Fixture::new(json!([
        {"name": "flag", "in": "query", "type": "boolean"},
        {"name": "off", "in": "query", "type": "boolean"},
        {"name": "ratio", "in": "query", "type": "number", "format": "double"},
        {"name": "day", "in": "query", "type": "string", "format": "date"},
        {"name": "blob", "in": "query", "type": "string", "format": "byte"}
    ]));
    let pairs = query(&[
        ("flag", "Checked"),
        ("off", "nope"),
        ("ratio", "0.25"),
        ("day", "2024-02-29"),
        ("blob", "aGVsbG8="),
    ]);
    let (bound, result) = fixture.bind(RawParts {
        query: &pairs,
        ..RawParts::default()
    });
    assert!(result.is_valid(), "{result}");
    assert_eq!(bound.get("flag"), Some(&ParamValue::Bool(true)));
    assert_eq!(bound.get("off"), Some(&ParamValue::Bool(false)));
    assert_eq!(bound.get("ratio"), Some(&ParamValue::Float(0.25)));
    assert_eq!(
        bound.get("day"),
        Some(&ParamValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
    );
    assert_eq!(bound.get("blob"), Some(&ParamValue::Bytes(b"hello".to_vec())));
}

#[test]
fn test_defaults_fill_absent_values() {
    let fixture = Fixture::new(json!([
        {"name": "limit", "in": "query", "type": "integer", "required": true, "default": 25},
        {"name": "sort", "in": "query", "type": "array", "items": {"type": "string"}, "default": ["name"]}
    ]));
    let pairs = query(&[("limit", "")]);
    let (bound, result) = fixture.bind(RawParts {
        query: &pairs,
        ..RawParts::default()
    });
    assert!(result.is_valid(), "{result}");
    assert_eq!(bound.get("limit"), Some(&ParamValue::Int(25)));
    assert_eq!(bound.get("sort"), Some(&strings(&["name"])));
}

#[test]
fn test_form_fields_and_files() {
    let fixture = Fixture::new(json!([
        {"name": "caption", "in": "formData", "type": "string", "maxLength": 10},
        {"name": "photo", "in": "formData", "type": "file", "required": true}
    ]));
    let form = FormData {
        fields: vec![("caption".into(), "cat".into())],
        files: vec![FileHandle {
            field: "photo".into(),
            filename: Some("cat.png".into()),
            content_type: Some("image/png".into()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }],
    };
    let (bound, result) = fixture.bind(RawParts {
        form: Some(&form),
        ..RawParts::default()
    });
    assert!(result.is_valid(), "{result}");
    assert_eq!(bound.get("caption").and_then(|v| v.as_str()), Some("cat"));
    assert!(matches!(bound.get("photo"), Some(ParamValue::File(f)) if f.filename.as_deref() == Some("cat.png")));

    let (_, result) = fixture.bind(RawParts::default());
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].location, Some(ParamLocation::FormData));
}

#[test]
fn test_body_validated_under_param_name() {
    let fixture = Fixture::new(json!([
        {"name": "pet", "in": "body", "required": true, "schema": {
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}, "age": {"type": "integer", "minimum": 0}}
        }}
    ]));
    let body = json!({"age": -2});
    let (bound, result) = fixture.bind(RawParts {
        body: Some(&body),
        ..RawParts::default()
    });
    let mut paths: Vec<&str> = result.errors().iter().map(|e| e.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["pet.age", "pet.name"]);
    assert!(result.errors().iter().all(|e| e.location == Some(ParamLocation::Body)));
    assert_eq!(bound.body(), Some(&body));
}

#[test]
fn test_nested_collection_formats() {
    let fixture = Fixture::new(json!([
        {"name": "grid", "in": "query", "type": "array", "collectionFormat": "pipes",
         "items": {"type": "array", "collectionFormat": "csv", "items": {"type": "integer"}}}
    ]));
    let pairs = query(&[("grid", "1,2|3,x")]);
    let (_, result) = fixture.bind(RawParts {
        query: &pairs,
        ..RawParts::default()
    });
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].path, "grid.1.1");
}
