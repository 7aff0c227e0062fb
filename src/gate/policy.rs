//! Skip policy: which operations do not count toward busy state.
//!
//! # Responsibilities
//! - Honor an explicit skip marker (builder flag or header)
//! - Exempt low-priority polling endpoints (health, liveness)
//! - Exempt background refreshes (builder flag or header)
//!
//! # Design Decisions
//! - Pure predicate, never fails
//! - Anything unrecognized counts: a marker header with an odd value or
//!   non-UTF-8 bytes does not skip

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::GateConfig;
use crate::gate::operation::OperationMeta;

pub const DEFAULT_SKIP_HEADER: &str = "x-skip-busy";
pub const DEFAULT_BACKGROUND_HEADER: &str = "x-background-refresh";

/// Decides whether an operation is exempt from busy tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipPolicy {
    skip_header: HeaderName,
    background_header: HeaderName,
    quiet_paths: Vec<String>,
}

impl SkipPolicy {
    /// Build a policy from gate configuration.
    ///
    /// Header names are checked by config validation; an invalid one that
    /// slips through falls back to the default name.
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            skip_header: header_or_default(&config.skip_header, DEFAULT_SKIP_HEADER),
            background_header: header_or_default(
                &config.background_header,
                DEFAULT_BACKGROUND_HEADER,
            ),
            quiet_paths: config
                .quiet_paths
                .iter()
                .filter_map(|p| normalize_path(p))
                .collect(),
        }
    }

    /// True if `op` should not count toward busy state.
    pub fn should_skip(&self, op: &OperationMeta) -> bool {
        op.is_marked_skip()
            || op.is_background()
            || header_is_truthy(op.headers(), &self.skip_header)
            || header_is_truthy(op.headers(), &self.background_header)
            || self.is_quiet_path(op.path())
    }

    fn is_quiet_path(&self, path: &str) -> bool {
        let Some(path) = normalize_path(path) else {
            return false;
        };
        // Patterns start with '/', so a suffix match lands on a segment boundary.
        self.quiet_paths
            .iter()
            .any(|quiet| path == *quiet || path.ends_with(quiet.as_str()))
    }

    pub fn skip_header(&self) -> &HeaderName {
        &self.skip_header
    }

    pub fn background_header(&self) -> &HeaderName {
        &self.background_header
    }

    pub fn quiet_paths(&self) -> &[String] {
        &self.quiet_paths
    }

    /// Remove the policy's marker headers so they never leave the process.
    pub fn strip_markers(&self, headers: &mut HeaderMap) {
        headers.remove(&self.skip_header);
        headers.remove(&self.background_header);
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self::from_config(&GateConfig::default())
    }
}

fn header_or_default(name: &str, default: &'static str) -> HeaderName {
    HeaderName::from_bytes(name.as_bytes()).unwrap_or_else(|_| {
        tracing::warn!(header = %name, fallback = default, "Invalid marker header name");
        HeaderName::from_static(default)
    })
}

fn header_is_truthy(headers: &HeaderMap, name: &HeaderName) -> bool {
    headers.get(name).is_some_and(is_truthy)
}

fn is_truthy(value: &HeaderValue) -> bool {
    match value.to_str() {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "" | "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return Some("/".to_string());
    }
    if path.starts_with('/') {
        Some(path.to_string())
    } else {
        Some(format!("/{}", path))
    }
}
