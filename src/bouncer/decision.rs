use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use thiserror::Error;

use crate::proxy::body::ProxyBody;
use crate::proxy::response::plain_text_response;

/// A rejection produced by a decider: the status and plain-text message sent
/// back to the client in place of the upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: Arc<str>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<Arc<str>>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<Arc<str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn to_response(&self) -> Response<ProxyBody> {
        plain_text_response(self.status, Bytes::copy_from_slice(self.message.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject(HttpError),
}

impl Decision {
    pub fn reject(status: StatusCode, message: impl Into<Arc<str>>) -> Self {
        Decision::Reject(HttpError::new(status, message))
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl From<Result<(), HttpError>> for Decision {
    fn from(result: Result<(), HttpError>) -> Self {
        match result {
            Ok(()) => Decision::Allow,
            Err(error) => Decision::Reject(error),
        }
    }
}
