use std::fmt;
use std::io::{self, Cursor, Read};

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tracing::debug;

/// Request body stream. Owned by the pipeline once the request is handed
/// over and dropped on every exit path.
pub struct RequestBody {
    inner: Box<dyn Read + Send>,
    bytes_read: usize,
}

impl RequestBody {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            inner: Box::new(reader),
            bytes_read: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}

impl Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n;
        Ok(n)
    }
}

impl Drop for RequestBody {
    fn drop(&mut self) {
        debug!(bytes_read = self.bytes_read, "Request body released");
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody").field("bytes_read", &self.bytes_read).finish()
    }
}

/// Transport-neutral inbound request.
#[derive(Debug)]
pub struct RawRequest {
    pub method: Method,
    /// Path plus optional query string, as received.
    pub uri: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl RawRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: RequestBody::empty(),
        }
    }

    /// Add a header; invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            self.headers.append(name, value);
        }
        self
    }

    /// In-memory body; sets `Content-Length` when the caller did not.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        if !self.headers.contains_key(CONTENT_LENGTH) {
            self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        self.body = RequestBody::new(Cursor::new(body));
        self
    }

    /// Streamed body of unknown length.
    #[must_use]
    pub fn with_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.body = RequestBody::new(reader);
        self
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(p, _)| p)
    }

    pub fn query_string(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, q)| q)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    /// Whether the headers announce a body: a non-zero length or a
    /// transfer encoding.
    pub fn has_body(&self) -> bool {
        match self.content_length() {
            Some(len) => len > 0,
            None => self.headers.contains_key(TRANSFER_ENCODING),
        }
    }
}

/// Decode a query string into ordered pairs, keeping repeated keys.
pub fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    match query {
        Some(q) if !q.is_empty() => url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Outcome of reading a body against a size limit.
#[derive(Debug)]
pub(crate) enum BodyRead {
    Complete(Vec<u8>),
    TooLarge,
}

/// Read at most `limit` bytes; one byte more means the body is too large.
pub(crate) fn read_limited(body: &mut RequestBody, limit: usize) -> io::Result<BodyRead> {
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    body.by_ref().take(cap).read_to_end(&mut buf)?;
    if buf.len() > limit {
        return Ok(BodyRead::TooLarge);
    }
    Ok(BodyRead::Complete(buf))
}
