//! # Codecs
//!
//! Media type → body decoder ([`Consumer`]) and value encoder
//! ([`Producer`]). JSON, url-encoded and multipart forms and plain text
//! ship with the crate; anything else (XML, YAML) is registered by the
//! caller.
//!
//! Lookup tries the exact essence, then a structured suffix
//! (`application/problem+json` → `application/json`), then `type/*`, then
//! `*/*`.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::binder::{FileHandle, FormData};
use crate::negotiate::MediaType;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to read body: {0}")]
    Io(#[from] io::Error),

    #[error("malformed {media_type} body: {reason}")]
    Malformed { media_type: String, reason: String },

    #[error("cannot encode value as {0}")]
    Unencodable(String),
}

/// A decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Value(Value),
    Form(FormData),
}

pub trait Consumer: Send + Sync {
    fn consume(&self, body: &mut dyn Read) -> Result<Decoded, CodecError>;

    /// Decode with the request's full `Content-Type` at hand, for media
    /// types whose parameters drive decoding (`boundary`).
    fn consume_with_type(&self, content_type: &str, body: &mut dyn Read) -> Result<Decoded, CodecError> {
        let _ = content_type;
        self.consume(body)
    }
}

pub trait Producer: Send + Sync {
    fn produce(&self, value: &Value, out: &mut dyn Write) -> Result<(), CodecError>;
}

impl<F> Consumer for F
where
    F: Fn(&mut dyn Read) -> Result<Decoded, CodecError> + Send + Sync,
{
    fn consume(&self, body: &mut dyn Read) -> Result<Decoded, CodecError> {
        self(body)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Consumer for JsonCodec {
    fn consume(&self, body: &mut dyn Read) -> Result<Decoded, CodecError> {
        serde_json::from_reader(body)
            .map(Decoded::Value)
            .map_err(|e| match e.classify() {
                serde_json::error::Category::Io => CodecError::Io(e.into()),
                _ => CodecError::Malformed {
                    media_type: "application/json".into(),
                    reason: e.to_string(),
                },
            })
    }
}

impl Producer for JsonCodec {
    fn produce(&self, value: &Value, out: &mut dyn Write) -> Result<(), CodecError> {
        serde_json::to_writer(out, value).map_err(|e| CodecError::Unencodable(format!("application/json: {e}")))
    }
}

/// `application/x-www-form-urlencoded`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormCodec;

impl Consumer for FormCodec {
    fn consume(&self, body: &mut dyn Read) -> Result<Decoded, CodecError> {
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        let fields = url::form_urlencoded::parse(&bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Decoded::Form(FormData {
            fields,
            files: Vec::new(),
        }))
    }
}

/// `multipart/form-data`: text parts become form fields, parts carrying a
/// `filename` become [`FileHandle`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultipartCodec;

impl MultipartCodec {
    const MEDIA_TYPE: &'static str = "multipart/form-data";

    fn malformed(reason: impl Into<String>) -> CodecError {
        CodecError::Malformed {
            media_type: Self::MEDIA_TYPE.into(),
            reason: reason.into(),
        }
    }

    /// Split `body` on `boundary` (RFC 7578). The preamble before the first
    /// delimiter and the epilogue after the closing one are ignored.
    pub fn parse(body: &[u8], boundary: &str) -> Result<FormData, CodecError> {
        let opening = format!("--{boundary}");
        let delimiter = format!("\r\n--{boundary}");
        let start = find(body, opening.as_bytes()).ok_or_else(|| Self::malformed("missing opening boundary"))?;
        let mut rest = &body[start + opening.len()..];
        let mut form = FormData::default();
        loop {
            if rest.starts_with(b"--") {
                return Ok(form);
            }
            rest = skip_line_end(rest).ok_or_else(|| Self::malformed("boundary not followed by a line break"))?;
            let end = find(rest, delimiter.as_bytes()).ok_or_else(|| Self::malformed("missing closing boundary"))?;
            Self::add_part(&mut form, &rest[..end])?;
            rest = &rest[end + delimiter.len()..];
        }
    }

    fn add_part(form: &mut FormData, part: &[u8]) -> Result<(), CodecError> {
        let (head, content) = match part.strip_prefix(b"\r\n") {
            Some(content) => (&b""[..], content),
            None => {
                let split = find(part, b"\r\n\r\n").ok_or_else(|| Self::malformed("part headers not terminated"))?;
                (&part[..split], &part[split + 4..])
            }
        };
        let head = std::str::from_utf8(head).map_err(|_| Self::malformed("part headers are not UTF-8"))?;

        let mut disposition = None;
        let mut content_type = None;
        for line in head.split("\r\n").filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Self::malformed(format!("invalid part header {line:?}")))?;
            match name.trim().to_ascii_lowercase().as_str() {
                "content-disposition" => disposition = Some(value.trim()),
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let disposition = disposition.ok_or_else(|| Self::malformed("part without Content-Disposition"))?;
        let mut params = disposition.split(';');
        if !params.next().is_some_and(|kind| kind.trim().eq_ignore_ascii_case("form-data")) {
            return Err(Self::malformed(format!("unsupported disposition {disposition:?}")));
        }
        let mut field = None;
        let mut filename = None;
        for param in params {
            let Some((key, value)) = param.split_once('=') else { continue };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => field = Some(value),
                "filename" => filename = Some(value),
                _ => {}
            }
        }
        let field = field.ok_or_else(|| Self::malformed("part without a name"))?;

        if filename.is_some() {
            form.files.push(FileHandle {
                field,
                filename,
                content_type,
                bytes: content.to_vec(),
            });
        } else {
            let text = String::from_utf8(content.to_vec())
                .map_err(|_| Self::malformed(format!("field {field:?} is not UTF-8")))?;
            form.fields.push((field, text));
        }
        Ok(())
    }
}

impl Consumer for MultipartCodec {
    fn consume(&self, _body: &mut dyn Read) -> Result<Decoded, CodecError> {
        Err(Self::malformed("missing boundary parameter"))
    }

    fn consume_with_type(&self, content_type: &str, body: &mut dyn Read) -> Result<Decoded, CodecError> {
        let boundary = MediaType::parse(content_type)
            .and_then(|m| m.param("boundary").map(str::to_string))
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Self::malformed("missing boundary parameter"))?;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        Self::parse(&bytes, &boundary).map(Decoded::Form)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Skip transport padding and the CRLF that ends a boundary line.
fn skip_line_end(rest: &[u8]) -> Option<&[u8]> {
    let padding = rest.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
    rest[padding..].strip_prefix(b"\r\n")
}

/// `text/plain`: bodies decode to a JSON string; strings encode verbatim,
/// other values as their JSON text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Consumer for TextCodec {
    fn consume(&self, body: &mut dyn Read) -> Result<Decoded, CodecError> {
        let mut text = String::new();
        body.read_to_string(&mut text).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => CodecError::Malformed {
                media_type: "text/plain".into(),
                reason: "body is not valid UTF-8".into(),
            },
            _ => CodecError::Io(e),
        })?;
        Ok(Decoded::Value(Value::String(text)))
    }
}

impl Producer for TextCodec {
    fn produce(&self, value: &Value, out: &mut dyn Write) -> Result<(), CodecError> {
        match value {
            Value::String(s) => out.write_all(s.as_bytes())?,
            Value::Null => {}
            other => out.write_all(other.to_string().as_bytes())?,
        }
        Ok(())
    }
}

/// Media type → codec tables. Built once, shared read-only.
#[derive(Clone)]
pub struct CodecRegistry {
    consumers: HashMap<String, Arc<dyn Consumer>>,
    producers: HashMap<String, Arc<dyn Producer>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut consumers: Vec<&String> = self.consumers.keys().collect();
        let mut producers: Vec<&String> = self.producers.keys().collect();
        consumers.sort();
        producers.sort();
        f.debug_struct("CodecRegistry")
            .field("consumers", &consumers)
            .field("producers", &producers)
            .finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self {
            consumers: HashMap::new(),
            producers: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_consumer("application/json", JsonCodec);
        registry.register_consumer("application/x-www-form-urlencoded", FormCodec);
        registry.register_consumer("multipart/form-data", MultipartCodec);
        registry.register_consumer("text/plain", TextCodec);
        registry.register_producer("application/json", JsonCodec);
        registry.register_producer("text/plain", TextCodec);
        registry
    }

    pub fn register_consumer(&mut self, media_type: &str, consumer: impl Consumer + 'static) {
        self.consumers.insert(media_type.to_ascii_lowercase(), Arc::new(consumer));
    }

    pub fn register_producer(&mut self, media_type: &str, producer: impl Producer + 'static) {
        self.producers.insert(media_type.to_ascii_lowercase(), Arc::new(producer));
    }

    pub fn consumer(&self, media_type: &str) -> Option<Arc<dyn Consumer>> {
        lookup(&self.consumers, media_type).map(Arc::clone)
    }

    pub fn producer(&self, media_type: &str) -> Option<Arc<dyn Producer>> {
        lookup(&self.producers, media_type).map(Arc::clone)
    }

    pub fn consumer_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.consumers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn producer_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.producers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

fn lookup<'a, T: ?Sized>(table: &'a HashMap<String, Arc<T>>, media_type: &str) -> Option<&'a Arc<T>> {
    let essence = crate::negotiate::media_type_essence(media_type)?;
    if let Some(found) = table.get(&essence) {
        return Some(found);
    }
    let (main, sub) = essence.split_once('/')?;
    if let Some((_, suffix)) = sub.rsplit_once('+') {
        if let Some(found) = table.get(&format!("{main}/{suffix}")) {
            return Some(found);
        }
    }
    table.get(&format!("{main}/*")).or_else(|| table.get("*/*"))
}
