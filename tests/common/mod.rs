#![allow(dead_code)]

use brrtcontract::dispatcher::{HandlerRequest, HandlerResponse};
use brrtcontract::security::{ApiKeyAuth, ApiKeyLocation, BasicAuth, Principal};
use brrtcontract::server::RequestPipeline;
use brrtcontract::spec::{load_spec_from_yaml, SpecDocument};
use brrtcontract::ContractConfig;
use serde_json::{json, Value};

pub const API_KEY: &str = "test123";

pub const PETSTORE: &str = r##"
swagger: "2.0"
info:
  title: Petstore
  version: "1.0.0"
basePath: /v1
consumes: [application/json]
produces: [application/json]
securityDefinitions:
  api_key:
    type: apiKey
    name: X-API-Key
    in: header
  basic:
    type: basic
definitions:
  Pet:
    type: object
    required: [name]
    properties:
      id:
        type: integer
        format: int64
      name:
        type: string
        minLength: 1
      tag:
        type: string
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          type: integer
          format: int32
          required: true
          maximum: 100
        - name: tags
          in: query
          type: array
          items:
            type: string
          collectionFormat: csv
        - name: status
          in: query
          type: array
          items:
            type: string
            enum: [available, sold]
          collectionFormat: multi
      responses:
        "200":
          description: pets
    post:
      operationId: addPet
      security:
        - api_key: []
        - basic: []
      parameters:
        - name: pet
          in: body
          required: true
          schema:
            $ref: "#/definitions/Pet"
      responses:
        "201":
          description: created
  /pets/mine:
    get:
      operationId: myPets
      responses:
        "200":
          description: mine
  /pets/{petId}:
    parameters:
      - name: petId
        in: path
        required: true
        type: integer
        format: int64
    get:
      operationId: getPet
      responses:
        "200":
          description: pet
    delete:
      operationId: deletePet
      responses:
        "204":
          description: deleted
  /pets/{petId}/photo:
    post:
      operationId: uploadPhoto
      consumes: [application/x-www-form-urlencoded]
      parameters:
        - name: petId
          in: path
          required: true
          type: integer
        - name: caption
          in: formData
          type: string
          required: true
          maxLength: 20
      responses:
        "200":
          description: uploaded
"##;

pub fn petstore() -> SpecDocument {
    load_spec_from_yaml(PETSTORE).expect("petstore fixture should parse")
}

pub fn petstore_config() -> ContractConfig {
    ContractConfig::default()
        .with_authenticator(
            "api_key",
            ApiKeyAuth::new("X-API-Key", ApiKeyLocation::Header, |key: &str| {
                if key == API_KEY {
                    Ok(Principal::new("key-holder"))
                } else {
                    Err("unknown api key".to_string())
                }
            }),
        )
        .with_authenticator(
            "basic",
            BasicAuth::new(|user: &str, pass: &str| {
                if pass == "secret" {
                    Ok(Principal::new(user))
                } else {
                    Err("wrong password".to_string())
                }
            }),
        )
}

fn echo(req: HandlerRequest) -> HandlerResponse {
    HandlerResponse::json(
        200,
        json!({
            "operation": req.operation_id,
            "params": req.params.params_json(),
            "principal": req.principal.as_ref().map(|p| p.name.clone()),
        }),
    )
}

/// Petstore pipeline whose handlers echo what they were given.
pub fn petstore_pipeline() -> RequestPipeline {
    RequestPipeline::builder(petstore())
        .config(petstore_config())
        .handler("listPets", echo)
        .handler("myPets", echo)
        .handler("getPet", echo)
        .handler("uploadPhoto", echo)
        .handler("deletePet", |_req: HandlerRequest| HandlerResponse::empty(204))
        .handler("addPet", |req: HandlerRequest| {
            let mut pet = req.body().cloned().unwrap_or(Value::Null);
            if let Value::Object(map) = &mut pet {
                map.insert("owner".into(), json!(req.principal.map(|p| p.name)));
            }
            HandlerResponse::json(201, pet)
        })
        .build()
        .expect("petstore pipeline should build")
}

pub fn json_body(res: &http::Response<Vec<u8>>) -> Value {
    serde_json::from_slice(res.body()).expect("response body should be JSON")
}

pub fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
