// Module request and response types
//
// The pipeline never writes to the network directly: every response is
// buffered in a `ModuleResponse` and committed exactly once at the end.

use std::net::IpAddr;

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};

/// Request as seen by directives and the downstream handler
#[derive(Debug, Clone)]
pub struct ModuleRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    remote_addr: Option<IpAddr>,
    context_path: String,
}

impl ModuleRequest {
    /// Create a request for a decoded path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            remote_addr: None,
            context_path: String::new(),
        }
    }

    /// Parse and attach a raw query string (`a=1&b`)
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = parse_query(query);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a header as text
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any of the given parameter spellings is present
    pub fn has_any_param(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.param(name).is_some())
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    let decode = |s: &str| {
        let s = s.replace('+', " ");
        urlencoding::decode(&s)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| s.clone())
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        })
        .collect()
}

/// Buffered response
#[derive(Debug, Clone)]
pub struct ModuleResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    committed: bool,
}

impl Default for ModuleResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace a header; values that are not valid header text are dropped
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping invalid header value"),
        }
    }

    /// Add a header value alongside existing ones
    pub fn append_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping invalid header value"),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    /// Replace the response with a short plain-text error
    pub fn send_error(&mut self, status: StatusCode, message: &str) {
        self.status = status;
        self.headers.clear();
        self.set_header(CONTENT_TYPE, "text/plain; charset=utf-8");
        self.body = message.as_bytes().to_vec();
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Finalize the response; only the first call has an effect
    ///
    /// Returns `false` when the response had already been committed.
    pub fn commit(&mut self) -> bool {
        if self.committed {
            tracing::warn!("Response already committed");
            return false;
        }
        if self.status == StatusCode::NOT_MODIFIED {
            self.body.clear();
        }
        let length = self.body.len().to_string();
        self.set_header(CONTENT_LENGTH, &length);
        self.committed = true;
        true
    }

    /// Split into status, headers and body
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, Bytes::from(self.body))
    }
}
