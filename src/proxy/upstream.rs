use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use async_trait::async_trait;
use http::uri::{Authority, Scheme};
use http::{Request, Response, Uri, Version};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::crypto::ring;
use rustls::{RootCertStore, client::ClientConfig};
use rustls_native_certs as native_certs;
use tokio::time::timeout;
use tracing::warn;

use crate::proxy::body::{ProxyBody, boxed};
use crate::proxy::forward_error::UpstreamTimeout;
use crate::proxy::headers::strip_hop_by_hop;

/// Pooled HTTP/HTTPS client shared by the forwarder and the mirror decider.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, ProxyBody>;

/// Sends an approved request on to its destination.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, request: Request<ProxyBody>) -> Result<Response<ProxyBody>>;
}

/// A fixed origin plus optional path prefix that request targets are
/// rewritten onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl Backend {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let uri: Uri = value
            .parse()
            .with_context(|| format!("invalid URL '{value}'"))?;
        let scheme = uri
            .scheme()
            .cloned()
            .ok_or_else(|| anyhow!("URL '{value}' must be absolute (http:// or https://)"))?;
        ensure!(
            scheme == Scheme::HTTP || scheme == Scheme::HTTPS,
            "URL '{value}' must use http or https"
        );
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| anyhow!("URL '{value}' is missing a host"))?;
        ensure!(
            uri.query().is_none(),
            "URL '{value}' must not carry a query string"
        );

        Ok(Self {
            scheme,
            authority,
            base_path: uri.path().to_string(),
        })
    }

    /// Moves `uri` onto this origin: the base path and the request path are
    /// joined with a single slash and the request query is kept.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri> {
        let path = join_paths(&self.base_path, uri.path());
        let path_and_query = match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .with_context(|| format!("failed to build URI for {self}"))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)?;
        if self.base_path != "/" {
            f.write_str(&self.base_path)?;
        }
        Ok(())
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Forwards requests to the backend over a pooled client.
#[derive(Clone)]
pub struct UpstreamForwarder {
    client: HttpClient,
    backend: Arc<Backend>,
    timeout: Duration,
}

impl UpstreamForwarder {
    pub fn new(client: HttpClient, backend: Backend, timeout: Duration) -> Self {
        Self {
            client,
            backend: Arc::new(backend),
            timeout,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

#[async_trait]
impl Forward for UpstreamForwarder {
    async fn forward(&self, request: Request<ProxyBody>) -> Result<Response<ProxyBody>> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.backend.rewrite(&parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);

        let response = match timeout(
            self.timeout,
            self.client.request(Request::from_parts(parts, body)),
        )
        .await
        {
            Ok(result) => result.with_context(|| format!("request to {} failed", self.backend))?,
            Err(_) => {
                return Err(UpstreamTimeout {
                    timeout: self.timeout,
                }
                .into());
            }
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, boxed(body)))
    }
}

pub fn build_http_client(connect_timeout: Duration, max_idle_per_host: usize) -> Result<HttpClient> {
    let tls = build_tls_client_config()?;

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(Some(connect_timeout));

    let connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Ok(Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(max_idle_per_host)
        .pool_timer(TokioTimer::new())
        .build(connector))
}

fn build_tls_client_config() -> Result<ClientConfig> {
    let provider = ring::default_provider();
    let builder = ClientConfig::builder_with_provider(provider.into());
    let builder = builder.with_safe_default_protocol_versions()?;

    let mut root_store = RootCertStore::empty();
    match native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            if ignored > 0 {
                warn!(ignored, "ignored {ignored} invalid system trust anchors");
            }
            if added == 0 {
                warn!("no trust anchors loaded from system locations; https upstreams will fail verification");
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to load system trust anchors");
        }
    }

    Ok(builder
        .with_root_certificates(Arc::new(root_store))
        .with_no_client_auth())
}
