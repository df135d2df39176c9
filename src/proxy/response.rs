use bytes::Bytes;
use http::{Response, StatusCode, header};

use crate::proxy::body::{ProxyBody, full};
use crate::proxy::forward_error::ForwardErrorKind;

#[derive(Clone, Copy, Debug)]
pub struct ForwardErrorSpec {
    pub status: StatusCode,
    pub body: &'static str,
}

pub fn forward_error_spec(kind: &ForwardErrorKind<'_>) -> ForwardErrorSpec {
    match kind {
        ForwardErrorKind::Timeout(_) => ForwardErrorSpec {
            status: StatusCode::GATEWAY_TIMEOUT,
            body: "upstream request timed out",
        },
        ForwardErrorKind::Other => ForwardErrorSpec {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream request failed",
        },
    }
}

pub fn plain_text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ProxyBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

impl ForwardErrorSpec {
    pub fn to_response(self) -> Response<ProxyBody> {
        plain_text_response(self.status, self.body)
    }
}
