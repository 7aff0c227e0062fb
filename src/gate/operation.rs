//! Metadata describing an outbound operation.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Uri};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a counted operation, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// What the skip policy gets to look at.
#[derive(Debug, Clone, Default)]
pub struct OperationMeta {
    target: String,
    path: String,
    headers: HeaderMap,
    skip: bool,
    background: bool,
}

impl OperationMeta {
    /// Describe an operation against `target`: a path or an absolute URL.
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        let path = extract_path(&target);
        Self {
            target,
            path,
            ..Self::default()
        }
    }

    /// Capture the URI and headers of an HTTP request.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            target: request.uri().to_string(),
            path: request.uri().path().to_string(),
            headers: request.headers().clone(),
            skip: false,
            background: false,
        }
    }

    /// Attach a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Exempt this operation from busy tracking.
    pub fn skip_busy(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Flag this operation as a background refresh.
    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path component of the target, without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_marked_skip(&self) -> bool {
        self.skip
    }

    pub fn is_background(&self) -> bool {
        self.background
    }
}

fn extract_path(target: &str) -> String {
    // Only absolute URLs go through `Uri`; "health" would parse as an
    // authority with an empty path.
    if target.contains("://") {
        if let Ok(uri) = target.parse::<Uri>() {
            return uri.path().to_string();
        }
    }
    target
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}
