use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::header::HOST;
use http::{Request, StatusCode, Version};
use http_body_util::BodyExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::bouncer::{BufferedRequest, CheckTemplate, Decider, Decision, TemplateFn};
use crate::config::DeciderParams;
use crate::metrics;
use crate::proxy::body::{ProxyBody, full};
use crate::proxy::headers::strip_hop_by_hop;
use crate::proxy::upstream::{Backend, HttpClient};
use crate::util::timeout_with_context;

pub const NAME: &str = "Mirror";

/// Shared resources every mirror decider sends through.
#[derive(Clone)]
pub struct MirrorOptions {
    pub client: HttpClient,
    pub timeout: Duration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct Params {
    destination: String,
    #[serde(default)]
    reject_on_failure: bool,
}

/// Sends a copy of every request it sees to another Alertmanager.
///
/// By default the copy goes out on a detached task and the request is
/// allowed straight away. With `reject_on_failure` the copy is awaited and a
/// failed mirror rejects the original request with 502.
pub struct Mirror {
    destination: Backend,
    options: MirrorOptions,
    reject_on_failure: bool,
}

impl Mirror {
    pub fn new(destination: &str, options: MirrorOptions, reject_on_failure: bool) -> Result<Self> {
        let destination =
            Backend::parse(destination).context("invalid mirror destination")?;
        Ok(Self {
            destination,
            options,
            reject_on_failure,
        })
    }

    fn mirrored_request(&self, request: &BufferedRequest) -> Result<Request<ProxyBody>> {
        let uri = self.destination.rewrite(request.uri())?;
        let mut headers = request.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);

        let mut mirrored = Request::new(full(request.body().clone()));
        *mirrored.method_mut() = request.method().clone();
        *mirrored.uri_mut() = uri;
        *mirrored.version_mut() = Version::HTTP_11;
        *mirrored.headers_mut() = headers;
        Ok(mirrored)
    }
}

async fn send(options: MirrorOptions, request: Request<ProxyBody>) -> Result<StatusCode> {
    let response = timeout_with_context(
        options.timeout,
        options.client.request(request),
        "waiting for mirror response",
    )
    .await?;
    let status = response.status();
    timeout_with_context(
        options.timeout,
        response.into_body().collect(),
        "reading mirror response",
    )
    .await?;
    Ok(status)
}

#[async_trait]
impl Decider for Mirror {
    async fn decide(&self, request: &BufferedRequest) -> Decision {
        let mirrored = match self.mirrored_request(request) {
            Ok(mirrored) => mirrored,
            Err(err) => {
                return Decision::reject(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to create request to {}: {err:#}", self.destination),
                );
            }
        };
        let url = mirrored.uri().to_string();

        if self.reject_on_failure {
            return match send(self.options.clone(), mirrored).await {
                Ok(status) => {
                    debug!(destination = %url, status = status.as_u16(), "mirrored request");
                    Decision::Allow
                }
                Err(err) => {
                    metrics::record_mirror_error();
                    Decision::reject(
                        StatusCode::BAD_GATEWAY,
                        format!("failed to mirror request to {url}: {err:#}"),
                    )
                }
            };
        }

        let options = self.options.clone();
        tokio::spawn(async move {
            match send(options, mirrored).await {
                Ok(status) => {
                    debug!(destination = %url, status = status.as_u16(), "mirrored request");
                }
                Err(err) => {
                    metrics::record_mirror_error();
                    warn!(destination = %url, error = format!("{err:#}"), "failed to mirror request");
                }
            }
        });
        Decision::Allow
    }
}

pub fn template(options: MirrorOptions) -> impl CheckTemplate {
    TemplateFn::new(&["destination"], move |params: &DeciderParams| -> Result<Arc<dyn Decider>> {
        let params: Params = params.decode()?;
        Ok(Arc::new(Mirror::new(
            &params.destination,
            options.clone(),
            params.reject_on_failure,
        )?))
    })
}
