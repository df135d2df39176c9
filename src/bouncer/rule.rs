use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::{Method, Request, Uri};
use tracing::{debug, info};

use crate::bouncer::{BodyLimits, BodyReadError, BufferedRequest, Decider, Decision, HttpError, Target};
use crate::metrics;
use crate::proxy::body::ProxyBody;
use crate::proxy::request::redacted_path;

struct NamedDecider {
    name: Arc<str>,
    decider: Arc<dyn Decider>,
}

/// One rule of the rule set: a target and the ordered deciders that run
/// against every request the target selects.
pub struct Bouncer {
    id: Arc<str>,
    target: Target,
    deciders: Vec<NamedDecider>,
    dry_run: bool,
}

impl Bouncer {
    pub fn new(id: impl Into<Arc<str>>, target: Target, dry_run: bool) -> Self {
        Self {
            id: id.into(),
            target,
            deciders: Vec::new(),
            dry_run,
        }
    }

    pub fn with_decider(mut self, name: impl Into<Arc<str>>, decider: Arc<dyn Decider>) -> Self {
        self.push_decider(name, decider);
        self
    }

    pub fn push_decider(&mut self, name: impl Into<Arc<str>>, decider: Arc<dyn Decider>) {
        self.deciders.push(NamedDecider {
            name: name.into(),
            decider,
        });
    }

    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn decider_count(&self) -> usize {
        self.deciders.len()
    }

    pub fn decider_names(&self) -> impl Iterator<Item = &str> {
        self.deciders.iter().map(|entry| entry.name.as_ref())
    }

    pub fn matches(&self, method: &Method, uri: &Uri) -> bool {
        self.target.matches(method, uri)
    }

    /// Runs the deciders in order. The first rejection wins unless the
    /// bouncer is in dry-run mode, in which case rejections are logged and
    /// the remaining deciders still run.
    pub async fn evaluate(&self, request: &BufferedRequest) -> Decision {
        for entry in &self.deciders {
            let Decision::Reject(error) = entry.decider.decide(request).await else {
                continue;
            };

            if self.dry_run {
                metrics::record_dry_run_rejection(&self.id);
                info!(
                    bouncer = %self.id,
                    decider = %entry.name,
                    method = %request.method(),
                    path = %redacted_path(request.request_target()),
                    status = error.status.as_u16(),
                    reason = %error.message,
                    "dry run: would have rejected request"
                );
                continue;
            }

            debug!(
                bouncer = %self.id,
                decider = %entry.name,
                status = error.status.as_u16(),
                reason = %error.message,
                "request rejected"
            );
            return Decision::Reject(error);
        }
        Decision::Allow
    }

    /// Applies this bouncer to `request`.
    ///
    /// Requests outside the target pass through untouched and their body is
    /// never read. Otherwise the body is buffered, the deciders run, and on
    /// approval the request comes back with an equivalent, unread body.
    pub async fn bounce(
        &self,
        request: Request<ProxyBody>,
        limits: BodyLimits,
    ) -> Result<Request<ProxyBody>, HttpError> {
        if !self.matches(request.method(), request.uri()) {
            return Ok(request);
        }

        let read: Pin<Box<dyn Future<Output = Result<BufferedRequest, BodyReadError>> + Send>> =
            Box::pin(BufferedRequest::read(request, limits));
        let buffered = read
            .await
            .map_err(|err| {
                debug!(bouncer = %self.id, error = %err, "failed to buffer request body");
                err.to_http_error()
            })?;

        match self.evaluate(&buffered).await {
            Decision::Allow => Ok(buffered.into_request()),
            Decision::Reject(error) => Err(error),
        }
    }
}
