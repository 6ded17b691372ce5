use std::borrow::Cow;
use std::sync::Arc;

use http::HeaderMap;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use tracing::debug;

use super::coerce::{decode, from_default, Decoder, ScalarKind};
use super::value::{BoundRequest, FormData, ParamValue};
use crate::config::ContractConfig;
use crate::errors::{ValidationError, ValidationErrorKind};
use crate::spec::{CollectionFormat, ParamLocation, Parameter};
use crate::validator::{SchemaArena, SchemaId, SchemaValidator, ValidationResult};

/// Raw request parts a binder reads from.
///
/// `query` and `form` hold already url-decoded pairs; path parameters are
/// the raw matched segments and are percent-decoded here.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawParts<'a> {
    pub path_params: &'a [(Arc<str>, String)],
    pub query: &'a [(String, String)],
    pub headers: Option<&'a HeaderMap>,
    pub form: Option<&'a FormData>,
    pub body: Option<&'a Value>,
}

#[derive(Debug, Clone)]
enum Source {
    Body,
    File,
    Text(Decoder),
}

/// Binding descriptor of one declared parameter.
#[derive(Debug, Clone)]
struct ParamBinding {
    name: String,
    location: ParamLocation,
    required: bool,
    allow_empty: bool,
    default: Option<Value>,
    source: Source,
    schema: SchemaId,
}

/// Per-operation parameter binder, built once when routes are built.
#[derive(Debug, Clone, Default)]
pub struct ParameterBinder {
    bindings: Vec<ParamBinding>,
}

impl ParameterBinder {
    /// Compile the binding descriptors of `params` into `arena`.
    ///
    /// Every configuration problem is collected: `multi` outside query and
    /// form data, uncompilable constraints, unknown string formats.
    pub fn new(params: &[Parameter], arena: &mut SchemaArena, config: &ContractConfig) -> Result<Self, ValidationResult> {
        let mut bindings = Vec::with_capacity(params.len());
        let mut problems = ValidationResult::new();

        for param in params {
            if let Err(error) = check_configuration(param, config) {
                problems.add_error(error);
                continue;
            }
            let schema = match arena.compile(&param.json_schema()) {
                Ok(id) => id,
                Err(err) => {
                    problems.add_error(ValidationError::new(
                        ValidationErrorKind::InvalidSchema,
                        param.name.as_str(),
                        Some(param.location),
                        format!("invalid schema for param {:?}: {err}", param.name),
                    ));
                    continue;
                }
            };
            let source = if param.is_body() {
                Source::Body
            } else if param.is_file() {
                Source::File
            } else {
                Source::Text(Decoder::for_schema(&param.simple))
            };
            bindings.push(ParamBinding {
                name: param.name.clone(),
                location: param.location,
                required: param.required || param.location == ParamLocation::Path,
                allow_empty: param.allow_empty_value,
                default: param.simple.default.clone(),
                source,
                schema,
            });
        }

        problems.into_result().map(|()| Self { bindings })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether a body or form data is expected.
    pub fn takes_body(&self) -> bool {
        self.bindings
            .iter()
            .any(|b| matches!(b.location, ParamLocation::Body | ParamLocation::FormData))
    }

    /// Bind every declared parameter, collecting all failures.
    pub fn bind(&self, raw: &RawParts<'_>, validator: &SchemaValidator<'_>) -> (BoundRequest, ValidationResult) {
        let mut bound = BoundRequest::new();
        let mut result = ValidationResult::new();

        for binding in &self.bindings {
            match &binding.source {
                Source::Body => bind_body(binding, raw, validator, &mut bound, &mut result),
                Source::File => match raw.form.and_then(|form| form.file(&binding.name)) {
                    Some(file) => bound.insert(&binding.name, binding.location, ParamValue::File(file.clone())),
                    None if binding.required => {
                        result.add_error(ValidationError::required(&binding.name, Some(binding.location)))
                    }
                    None => {}
                },
                Source::Text(decoder) => bind_text(binding, decoder, raw, validator, &mut bound, &mut result),
            }
        }

        debug!(
            declared = self.bindings.len(),
            bound = bound.len(),
            errors = result.errors().len(),
            "Parameters bound"
        );
        (bound, result)
    }
}

fn check_configuration(param: &Parameter, config: &ContractConfig) -> Result<(), ValidationError> {
    if param.simple.collection_format == Some(CollectionFormat::Multi) && !param.location.allows_multi() {
        return Err(ValidationError::new(
            ValidationErrorKind::InvalidCollectionFormat,
            param.name.as_str(),
            Some(param.location),
            format!(
                "the collection format \"multi\" is not supported for the {} param {:?}",
                param.location, param.name
            ),
        ));
    }
    if let (Some("string"), Some(format)) = (param.simple.type_name.as_deref(), param.simple.format.as_deref()) {
        if !config.formats().contains(format) {
            return Err(ValidationError::new(
                ValidationErrorKind::UnknownFormat,
                param.name.as_str(),
                Some(param.location),
                format!("{} in {} has unknown format {format:?}", param.name, param.location),
            ));
        }
    }
    Ok(())
}

fn bind_body(
    binding: &ParamBinding,
    raw: &RawParts<'_>,
    validator: &SchemaValidator<'_>,
    bound: &mut BoundRequest,
    result: &mut ValidationResult,
) {
    match raw.body {
        Some(body) => {
            result.merge(validator.validate_at(binding.schema, body, &binding.name, Some(ParamLocation::Body)));
            bound.insert(&binding.name, ParamLocation::Body, ParamValue::Json(body.clone()));
        }
        None if binding.required => result.add_error(ValidationError::required(&binding.name, Some(ParamLocation::Body))),
        None => {}
    }
}

fn occurrences<'a>(binding: &ParamBinding, raw: &RawParts<'a>) -> Result<Vec<Cow<'a, str>>, ValidationError> {
    let name = binding.name.as_str();
    let values = match binding.location {
        ParamLocation::Path => {
            let mut values = Vec::new();
            if let Some((_, value)) = raw.path_params.iter().rev().find(|(k, _)| &**k == name) {
                let decoded = percent_decode_str(value)
                    .decode_utf8()
                    .map_err(|_| ValidationError::parse_failure(name, Some(ParamLocation::Path), "string", value))?;
                values.push(decoded);
            }
            values
        }
        ParamLocation::Query => raw
            .query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| Cow::Borrowed(v.as_str()))
            .collect(),
        ParamLocation::Header => raw
            .headers
            .map(|headers| {
                headers
                    .get_all(name)
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(Cow::Borrowed)
                    .collect()
            })
            .unwrap_or_default(),
        ParamLocation::FormData => raw
            .form
            .map(|form| form.all(name).into_iter().map(Cow::Borrowed).collect())
            .unwrap_or_default(),
        ParamLocation::Body => Vec::new(),
    };
    Ok(values)
}

fn bind_text(
    binding: &ParamBinding,
    decoder: &Decoder,
    raw: &RawParts<'_>,
    validator: &SchemaValidator<'_>,
    bound: &mut BoundRequest,
    result: &mut ValidationResult,
) {
    let values = match occurrences(binding, raw) {
        Ok(values) => values,
        Err(error) => {
            result.add_error(error);
            return;
        }
    };
    let texts: Vec<&str> = values.iter().map(|v| v.as_ref()).collect();
    let keeps_empty = binding.allow_empty && *decoder == Decoder::Scalar(ScalarKind::String);
    let absent = texts.iter().all(|t| t.is_empty()) && !(keeps_empty && !texts.is_empty());

    if absent {
        if let Some(default) = &binding.default {
            bound.insert(&binding.name, binding.location, from_default(decoder, default));
        } else if binding.required {
            result.add_error(ValidationError::required(&binding.name, Some(binding.location)));
        }
        return;
    }

    match decode(decoder, &texts) {
        Ok(value) => {
            result.merge(validator.validate_at(binding.schema, &value.to_json(), &binding.name, Some(binding.location)));
            bound.insert(&binding.name, binding.location, value);
        }
        Err(failures) => result.add_errors(failures.into_iter().map(|failure| {
            let path = if failure.suffix.is_empty() {
                binding.name.clone()
            } else {
                format!("{}.{}", binding.name, failure.suffix)
            };
            ValidationError::parse_failure(&path, Some(binding.location), failure.expected, &failure.raw)
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatRegistry;
    use serde_json::json;

    fn params(value: Value) -> Vec<Parameter> {
        serde_json::from_value(value).unwrap()
    }

    fn build(value: Value) -> (ParameterBinder, SchemaArena) {
        let mut arena = SchemaArena::default();
        let binder = ParameterBinder::new(&params(value), &mut arena, &ContractConfig::default()).unwrap();
        (binder, arena)
    }

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_default_skips_required() {
        let (binder, arena) = build(json!([
            {"name": "limit", "in": "query", "type": "integer", "format": "int32", "required": true, "default": 20}
        ]));
        let formats = FormatRegistry::default();
        let (bound, result) = binder.bind(&RawParts::default(), &SchemaValidator::new(&arena, &formats));
        assert!(result.is_valid());
        assert_eq!(bound.get("limit"), Some(&ParamValue::Int(20)));
    }

    #[test]
    fn test_path_param_percent_decoded() {
        let (binder, arena) = build(json!([{"name": "name", "in": "path", "type": "string", "required": true}]));
        let formats = FormatRegistry::default();
        let path_params = [(Arc::<str>::from("name"), "hello%20world".to_string())];
        let raw = RawParts {
            path_params: &path_params,
            ..RawParts::default()
        };
        let (bound, result) = binder.bind(&raw, &SchemaValidator::new(&arena, &formats));
        assert!(result.is_valid());
        assert_eq!(bound.get("name").and_then(|v| v.as_str()), Some("hello world"));
    }

    #[test]
    fn test_allow_empty_value() {
        let (binder, arena) = build(json!([
            {"name": "q", "in": "query", "type": "string", "required": true, "allowEmptyValue": true},
            {"name": "r", "in": "query", "type": "string", "required": true}
        ]));
        let formats = FormatRegistry::default();
        let pairs = query(&[("q", ""), ("r", "")]);
        let raw = RawParts {
            query: &pairs,
            ..RawParts::default()
        };
        let (bound, result) = binder.bind(&raw, &SchemaValidator::new(&arena, &formats));
        assert_eq!(bound.get("q").and_then(|v| v.as_str()), Some(""));
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].path, "r");
    }

    #[test]
    fn test_unknown_string_format_rejected() {
        let mut arena = SchemaArena::default();
        let err = ParameterBinder::new(
            &params(json!([{"name": "c", "in": "query", "type": "string", "format": "color-name"}])),
            &mut arena,
            &ContractConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.errors()[0].kind, ValidationErrorKind::UnknownFormat);
    }

    #[test]
    fn test_takes_body() {
        let (binder, _) = build(json!([{"name": "pet", "in": "body", "schema": {"type": "object"}}]));
        assert!(binder.takes_body());
        let (binder, _) = build(json!([{"name": "id", "in": "query", "type": "string"}]));
        assert!(!binder.takes_body());
    }
}
