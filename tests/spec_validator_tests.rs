//! Startup consistency checks run by `SpecValidator`.

mod common;

use brrtcontract::errors::{ConfigError, ValidationErrorKind};
use brrtcontract::spec::{load_spec, load_spec_from_yaml, SpecValidator};
use brrtcontract::ValidationResult;
use std::io::Write;

fn validate(yaml: &str) -> ValidationResult {
    SpecValidator::new().validate(&load_spec_from_yaml(yaml).expect("fixture should parse"))
}

fn kinds(result: &ValidationResult) -> Vec<ValidationErrorKind> {
    result.errors().iter().map(|e| e.kind).collect()
}

#[test]
fn test_petstore_is_valid() {
    let result = SpecValidator::new().validate(&common::petstore());
    assert!(result.is_valid(), "{result}");
}

#[test]
fn test_petstore_from_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(common::PETSTORE.as_bytes()).unwrap();
    let spec = load_spec(file.path()).unwrap();
    assert!(SpecValidator::new().ensure_valid(&spec).is_ok());
    assert_eq!(spec.base_path(), "/v1");
}

#[test]
fn test_undeclared_path_param() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      responses: {"200": {description: ok}}
"#,
    );
    assert_eq!(kinds(&result), vec![ValidationErrorKind::PathParamUndeclared]);
    assert!(result.errors()[0].message.contains("has no parameter definition"));
}

#[test]
fn test_path_param_not_in_template() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - {name: petId, in: path, required: true, type: string}
      responses: {"200": {description: ok}}
"#,
    );
    assert_eq!(kinds(&result), vec![ValidationErrorKind::PathParamNotInPath]);
    assert!(result.errors()[0].message.contains("is not present in the path"));
}

#[test]
fn test_multiple_body_params() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets:
    post:
      operationId: addPet
      parameters:
        - {name: pet, in: body, schema: {type: object}}
        - {name: other, in: body, schema: {type: object}}
      responses: {"200": {description: ok}}
"#,
    );
    assert_eq!(kinds(&result), vec![ValidationErrorKind::MultipleBodyParams]);
    let message = &result.errors()[0].message;
    assert!(message.contains("\"pet\"") && message.contains("\"other\""), "{message}");
}

#[test]
fn test_duplicate_parameters() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - {name: limit, in: query, type: integer}
        - {name: limit, in: query, type: string}
        - {name: limit, in: header, type: string}
      responses: {"200": {description: ok}}
"#,
    );
    assert_eq!(kinds(&result), vec![ValidationErrorKind::DuplicateParameter]);
}

#[test]
fn test_overlapping_templates() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets/{id}:
    get:
      operationId: getPet
      parameters: [{name: id, in: path, required: true, type: string}]
      responses: {"200": {description: ok}}
  /pets/{name}:
    get:
      operationId: getPetByName
      parameters: [{name: name, in: path, required: true, type: string}]
      responses: {"200": {description: ok}}
    put:
      operationId: putPetByName
      parameters: [{name: name, in: path, required: true, type: string}]
      responses: {"200": {description: ok}}
"#,
    );
    // only GET collides; PUT has a single template
    assert_eq!(kinds(&result), vec![ValidationErrorKind::PathOverlap]);
}

#[test]
fn test_multi_on_header_rejected() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - name: X-Tags
          in: header
          type: array
          items: {type: string}
          collectionFormat: multi
      responses: {"200": {description: ok}}
"#,
    );
    // the document schema also rejects multi outside query and formData
    let found = kinds(&result);
    assert!(found.contains(&ValidationErrorKind::InvalidCollectionFormat), "{result}");
    assert!(found.contains(&ValidationErrorKind::DocumentSchema), "{result}");
    assert!(found
        .iter()
        .all(|k| matches!(k, ValidationErrorKind::InvalidCollectionFormat | ValidationErrorKind::DocumentSchema)));
}

#[test]
fn test_operation_ids() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /a:
    get:
      operationId: same
      responses: {"200": {description: ok}}
  /b:
    get:
      operationId: same
      responses: {"200": {description: ok}}
  /c:
    get:
      responses: {"200": {description: ok}}
"#,
    );
    let mut found = kinds(&result);
    found.sort_by_key(|k| k.as_str());
    assert_eq!(
        found,
        vec![ValidationErrorKind::DuplicateOperationId, ValidationErrorKind::MissingOperationId]
    );
}

#[test]
fn test_unknown_security_scheme_and_dangling_ref() {
    let result = validate(
        r##"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      security: [{oauth: [read]}]
      parameters:
        - $ref: "#/parameters/missing"
      responses: {"200": {description: ok}}
"##,
    );
    let mut found = kinds(&result);
    found.sort_by_key(|k| k.as_str());
    assert_eq!(
        found,
        vec![ValidationErrorKind::UnknownSecurityScheme, ValidationErrorKind::UnresolvedReference]
    );
}

#[test]
fn test_untyped_body_array() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets:
    post:
      operationId: addPets
      parameters:
        - {name: pets, in: body, schema: {type: array}}
      responses: {"200": {description: ok}}
"#,
    );
    assert_eq!(kinds(&result), vec![ValidationErrorKind::UntypedCollection]);
}

#[test]
fn test_errors_accumulate() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets/{petId}:
    get:
      parameters:
        - {name: other, in: path, required: true, type: string}
      responses: {"200": {description: ok}}
"#,
    );
    // missing operationId, undeclared {petId}, stray "other"
    assert_eq!(result.errors().len(), 3);
    assert!(SpecValidator::new()
        .ensure_valid(&load_spec_from_yaml(MINIMAL).unwrap())
        .is_ok());
}

const MINIMAL: &str = r#"
swagger: "2.0"
info:
  title: Minimal
  version: "1"
paths: {}
"#;

#[test]
fn test_document_schema_rejects_unknown_top_level_key() {
    let yaml = format!("{MINIMAL}servers: [{{url: \"http://localhost\"}}]\n");
    let result = validate(&yaml);
    assert_eq!(kinds(&result), vec![ValidationErrorKind::DocumentSchema]);
    assert_eq!(result.errors()[0].path, "servers");
    assert!(result.errors()[0].message.contains("Swagger 2.0"));

    let extended = format!("{MINIMAL}x-servers: [{{url: \"http://localhost\"}}]\n");
    assert!(validate(&extended).is_valid());
}

#[test]
fn test_document_schema_requires_info_and_responses() {
    let result = validate(
        r#"
swagger: "2.0"
paths:
  /pets:
    get:
      operationId: listPets
"#,
    );
    assert!(!result.is_valid());
    assert!(
        result.errors().iter().all(|e| e.kind == ValidationErrorKind::DocumentSchema),
        "{result}"
    );
    assert!(result.errors().iter().any(|e| e.message.contains("info")), "{result}");
    assert!(result.errors().iter().any(|e| e.message.contains("responses")), "{result}");
}

#[test]
fn test_document_schema_rejects_optional_path_param() {
    let result = validate(
        r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      parameters:
        - {name: petId, in: path, type: string}
      responses: {"200": {description: ok}}
"#,
    );
    assert!(kinds(&result).contains(&ValidationErrorKind::DocumentSchema), "{result}");
}

#[test]
fn test_template_must_span_whole_segment() {
    let yaml = r#"
swagger: "2.0"
info: {title: t, version: "1"}
paths:
  /files/{name}.json:
    get:
      operationId: getFile
      parameters:
        - {name: name, in: path, required: true, type: string}
      responses: {"200": {description: ok}}
"#;
    let result = validate(yaml);
    assert_eq!(kinds(&result), vec![ValidationErrorKind::InvalidPathTemplate]);
    assert_eq!(result.errors()[0].path, "/files/{name}.json");
    assert!(result.errors()[0].message.contains("{name}.json"));

    let err = SpecValidator::new()
        .ensure_valid(&load_spec_from_yaml(yaml).unwrap())
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSpec(_)), "{err}");
}
