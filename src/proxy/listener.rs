use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use http::{Request, Response};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::AppContext;
use super::body::ProxyBody;
use super::request::logged_path;
use super::transport::{Handled, Outcome};
use crate::logging::AccessLogBuilder;

pub async fn start_listener(app: AppContext) -> Result<()> {
    let bind_addr = app.settings.listen;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;
    let local_addr = listener.local_addr().unwrap_or(bind_addr);
    info!(
        address = %local_addr,
        tls = app.tls.is_some(),
        bouncers = app.transport.rules().len(),
        "bouncer listener started"
    );

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!(error = %err, "failed to accept incoming connection");
                continue;
            }
        };
        debug!(peer = %peer_addr, "accepted connection");
        if let Err(err) = stream.set_nodelay(true) {
            debug!(peer = %peer_addr, error = %err, "failed to set TCP_NODELAY on downstream stream");
        }
        let connection_app = app.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, peer_addr, connection_app).await {
                debug!(peer = %peer_addr, error = format!("{err:#}"), "connection closed with error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, app: AppContext) -> Result<()> {
    let Some(acceptor) = app.tls.clone() else {
        return serve_connection(stream, peer, app).await;
    };

    let client_timeout = app.settings.client_timeout();
    let stream = timeout(client_timeout, acceptor.accept(stream))
        .await
        .map_err(|_| anyhow!("timed out during TLS handshake"))?
        .context("TLS handshake failed")?;
    serve_connection(stream, peer, app).await
}

async fn serve_connection<S>(stream: S, peer: SocketAddr, app: AppContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let client_timeout = app.settings.client_timeout();
    let service = service_fn(move |request: Request<Incoming>| {
        let app = app.clone();
        async move { Ok::<_, Infallible>(handle_request(request, peer, &app).await) }
    });

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(client_timeout);
    builder
        .serve_connection(TokioIo::new(stream), service)
        .await
        .map_err(|err| anyhow!("failed to serve connection: {err}"))
}

async fn handle_request(
    request: Request<Incoming>,
    peer: SocketAddr,
    app: &AppContext,
) -> Response<ProxyBody> {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = logged_path(request.uri(), app.settings.log_queries);

    let Handled { response, outcome } = app.transport.dispatch(request).await;

    let mut log = AccessLogBuilder::new(peer)
        .method(method)
        .path(path)
        .status(response.status())
        .decision(outcome.decision())
        .elapsed(started.elapsed());
    match outcome {
        Outcome::Forwarded => {}
        Outcome::Rejected { bouncer, error } => {
            log = log.bouncer(&*bouncer).error_reason(&*error.message);
        }
        Outcome::UpstreamFailed { reason, .. } => {
            log = log.error_reason(reason);
        }
    }
    log.log();

    response
}
