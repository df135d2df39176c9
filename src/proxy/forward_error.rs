use std::time::Duration;

use anyhow::Error;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("upstream did not respond within {timeout:?}")]
pub struct UpstreamTimeout {
    pub timeout: Duration,
}

/// Normalized classification of forwarding failures so the response and the
/// metrics agree on what went wrong.
pub enum ForwardErrorKind<'a> {
    Timeout(&'a UpstreamTimeout),
    Other,
}

impl ForwardErrorKind<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            ForwardErrorKind::Timeout(_) => "timeout",
            ForwardErrorKind::Other => "other",
        }
    }
}

pub fn classify_forward_error(err: &Error) -> ForwardErrorKind<'_> {
    if let Some(timeout) = err.downcast_ref::<UpstreamTimeout>() {
        ForwardErrorKind::Timeout(timeout)
    } else {
        ForwardErrorKind::Other
    }
}

pub fn log_forward_error(kind: &ForwardErrorKind<'_>, method: &str, path: &str, err: &Error) {
    match kind {
        ForwardErrorKind::Timeout(timeout) => warn!(
            method,
            path,
            timeout_ms = timeout.timeout.as_millis() as u64,
            "upstream request timed out"
        ),
        ForwardErrorKind::Other => warn!(
            method,
            path,
            error = format!("{err:#}"),
            "upstream request failed"
        ),
    }
}
