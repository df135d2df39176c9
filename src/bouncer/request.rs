use std::time::Duration;

use bytes::{Buf, Bytes, buf::Reader};
use http::{HeaderMap, Method, Request, StatusCode, Uri, request::Parts};
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;
use tokio::time::timeout;

use crate::bouncer::HttpError;
use crate::proxy::body::{BoxError, ProxyBody, full};
use crate::proxy::request::request_target;

/// Bounds applied while a request body is buffered for inspection.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_size: usize,
    pub read_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum BodyReadError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("timed out after {0:?} reading request body")]
    TimedOut(Duration),
    #[error("failed to read request body: {0}")]
    Io(BoxError),
}

impl BodyReadError {
    pub fn to_http_error(&self) -> HttpError {
        match self {
            BodyReadError::TooLarge { .. } => HttpError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body exceeds configured limit",
            ),
            BodyReadError::TimedOut(_) => {
                HttpError::new(StatusCode::REQUEST_TIMEOUT, "timed out reading request body")
            }
            BodyReadError::Io(_) => HttpError::bad_request("failed to read body from request"),
        }
    }
}

/// A request whose body has been read into memory.
///
/// Deciders receive it by reference; each call to [`BufferedRequest::body`]
/// or [`BufferedRequest::body_reader`] starts from the first byte, so one
/// decider consuming the body never affects the next.
#[derive(Debug)]
pub struct BufferedRequest {
    parts: Parts,
    body: Bytes,
}

impl BufferedRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self { parts, body }
    }

    /// Reads the whole body of `request`, bounded by `limits`.
    pub async fn read<B>(request: Request<B>, limits: BodyLimits) -> Result<Self, BodyReadError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        if body.is_end_stream() {
            return Ok(Self::new(parts, Bytes::new()));
        }

        let collected = timeout(
            limits.read_timeout,
            Limited::new(body, limits.max_size).collect(),
        )
        .await
        .map_err(|_| BodyReadError::TimedOut(limits.read_timeout))?
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                BodyReadError::TooLarge {
                    limit: limits.max_size,
                }
            } else {
                BodyReadError::Io(err)
            }
        })?;

        Ok(Self::new(parts, collected.to_bytes()))
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Path plus query, as the client sent it.
    pub fn request_target(&self) -> &str {
        request_target(&self.parts.uri)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_reader(&self) -> Reader<Bytes> {
        self.body.clone().reader()
    }

    /// Rebuilds a request carrying the buffered body, ready to be read again
    /// or forwarded.
    pub fn into_request(self) -> Request<ProxyBody> {
        Request::from_parts(self.parts, full(self.body))
    }
}
