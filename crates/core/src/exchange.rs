//! Request and response values flowing through the engine.

use bytes::Bytes;
use url::Url;

/// An intercepted resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Uppercase HTTP method.
    pub method: String,
    /// Absolute URL, query included, fragment removed.
    pub url: Url,
    /// Whether the request loads a full document.
    pub is_navigation: bool,
}

impl Request {
    pub fn new(method: &str, mut url: Url, is_navigation: bool) -> Self {
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url, is_navigation }
    }

    /// Sub-resource GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, false)
    }

    /// Document GET request.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, true)
    }

    /// GET is the only method the cache stores.
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }
}

/// A response, either fresh from the network or read back from a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// 2xx status.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
