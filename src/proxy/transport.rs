use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;
use tracing::debug;

use crate::bouncer::{BodyLimits, HttpError, RuleSet};
use crate::metrics;
use crate::proxy::RuleStore;
use crate::proxy::body::{BoxError, ProxyBody, boxed};
use crate::proxy::forward_error::{classify_forward_error, log_forward_error};
use crate::proxy::response::forward_error_spec;
use crate::proxy::upstream::Forward;

/// What happened to a request on its way through the transport.
#[derive(Debug)]
pub enum Outcome {
    Forwarded,
    Rejected {
        bouncer: Arc<str>,
        error: HttpError,
    },
    UpstreamFailed {
        kind: &'static str,
        reason: String,
    },
}

impl Outcome {
    /// Label used by the access log and the request metrics.
    pub fn decision(&self) -> &'static str {
        match self {
            Outcome::Forwarded => "ALLOW",
            Outcome::Rejected { .. } => "REJECT",
            Outcome::UpstreamFailed { .. } => "ERROR",
        }
    }
}

pub struct Handled {
    pub response: Response<ProxyBody>,
    pub outcome: Outcome,
}

/// Runs every inbound request through the active bouncers and forwards the
/// survivors.
///
/// The rule set is sampled once per request, so a concurrent reload never
/// mixes two rule sets within one request. A request no bouncer matches is
/// streamed to the backend without buffering.
#[derive(Clone)]
pub struct BouncingTransport {
    forward: Arc<dyn Forward>,
    rules: RuleStore,
    limits: BodyLimits,
}

impl BouncingTransport {
    pub fn new(forward: Arc<dyn Forward>, rules: RuleSet, limits: BodyLimits) -> Self {
        Self {
            forward,
            rules: RuleStore::new(rules),
            limits,
        }
    }

    pub fn rules(&self) -> RuleSet {
        self.rules.snapshot()
    }

    /// Installs `rules` for requests that start from now on. Requests already
    /// in flight finish with the set they started with. Returns the previous
    /// set.
    pub fn replace_rule_set(&self, rules: RuleSet) -> RuleSet {
        metrics::set_active_bouncers(rules.len());
        self.rules.replace(rules)
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response<ProxyBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.dispatch(request).await.response
    }

    pub async fn dispatch<B>(&self, request: Request<B>) -> Handled
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let rules = self.rules.snapshot();
        let mut request = request.map(boxed);

        if rules.any_match(request.method(), request.uri()) {
            for bouncer in rules.bouncers() {
                request = match bouncer.bounce(request, self.limits).await {
                    Ok(request) => request,
                    Err(error) => {
                        metrics::record_rejection(bouncer.id());
                        return Handled {
                            response: error.to_response(),
                            outcome: Outcome::Rejected {
                                bouncer: bouncer.id().clone(),
                                error,
                            },
                        };
                    }
                };
            }
        } else {
            debug!(
                method = %request.method(),
                path = request.uri().path(),
                "no bouncer matched; forwarding without buffering"
            );
        }

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        match self.forward.forward(request).await {
            Ok(response) => Handled {
                response,
                outcome: Outcome::Forwarded,
            },
            Err(err) => {
                let kind = classify_forward_error(&err);
                log_forward_error(&kind, method.as_str(), &path, &err);
                metrics::record_upstream_error(kind.label());
                let response = forward_error_spec(&kind).to_response();
                Handled {
                    response,
                    outcome: Outcome::UpstreamFailed {
                        kind: kind.label(),
                        reason: format!("{err:#}"),
                    },
                }
            }
        }
    }
}
