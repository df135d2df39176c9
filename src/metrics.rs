use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TEXT_FORMAT, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::debug;

use crate::proxy::body::{ProxyBody, full};
use crate::proxy::response::plain_text_response;

pub const METRICS_PATH: &str = "/metrics";

const METRICS_READ_TIMEOUT: Duration = Duration::from_secs(5);

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("requests_total", "Total requests by decision");
    let vec = IntCounterVec::new(opts, &["decision"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register requests_total");
    vec
});

static REQUEST_STATUS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("requests_status_total", "Requests by status class");
    let vec = IntCounterVec::new(opts, &["status_class"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register requests_status_total");
    vec
});

static REQUEST_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new("request_duration_seconds", "Request latency by decision")
        .buckets(latency_buckets());
    let vec = HistogramVec::new(opts, &["decision"]).expect("create histogram vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register request_duration_seconds");
    vec
});

static BOUNCER_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("bouncer_rejections_total", "Requests rejected by bouncer");
    let vec = IntCounterVec::new(opts, &["bouncer"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register bouncer_rejections_total");
    vec
});

static BOUNCER_DRY_RUN_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "bouncer_dry_run_rejections_total",
        "Rejections suppressed because the bouncer runs in dry-run mode",
    );
    let vec = IntCounterVec::new(opts, &["bouncer"]).expect("create counter vec");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register bouncer_dry_run_rejections_total");
    vec
});

static UPSTREAM_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let vec = IntCounterVec::new(
        Opts::new("upstream_errors_total", "Upstream errors by kind"),
        &["kind"],
    )
    .expect("create upstream_errors_total");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register upstream_errors_total");
    vec
});

static MIRROR_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("mirror_errors_total", "Failed mirror requests")
        .expect("create mirror_errors_total");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register mirror_errors_total");
    counter
});

static RULE_SET_RELOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let vec = IntCounterVec::new(
        Opts::new("rule_set_reloads_total", "Bouncer rule reloads by result"),
        &["result"],
    )
    .expect("create rule_set_reloads_total");
    REGISTRY
        .register(Box::new(vec.clone()))
        .expect("register rule_set_reloads_total");
    vec
});

static ACTIVE_BOUNCERS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new("active_bouncers", "Bouncers in the active rule set")
        .expect("create active_bouncers");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register active_bouncers");
    gauge
});

fn latency_buckets() -> Vec<f64> {
    vec![
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

pub fn record_request(decision: &str, status: StatusCode, elapsed: Duration) {
    REQUESTS_TOTAL.with_label_values(&[decision]).inc();
    REQUEST_STATUS_TOTAL
        .with_label_values(&[status_class(status.as_u16())])
        .inc();
    REQUEST_LATENCY_SECONDS
        .with_label_values(&[decision])
        .observe(elapsed.as_secs_f64());
}

pub fn record_rejection(bouncer: &str) {
    BOUNCER_REJECTIONS_TOTAL.with_label_values(&[bouncer]).inc();
}

pub fn record_dry_run_rejection(bouncer: &str) {
    BOUNCER_DRY_RUN_REJECTIONS_TOTAL
        .with_label_values(&[bouncer])
        .inc();
}

pub fn record_upstream_error(kind: &str) {
    UPSTREAM_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_mirror_error() {
    MIRROR_ERRORS_TOTAL.inc();
}

pub fn record_reload(success: bool) {
    let label = if success { "success" } else { "failure" };
    RULE_SET_RELOADS_TOTAL.with_label_values(&[label]).inc();
}

pub fn set_active_bouncers(count: usize) {
    ACTIVE_BOUNCERS.set(count as i64);
}

/// Serializes unit tests that set and read the process-wide gauge.
#[cfg(test)]
pub(crate) static GAUGE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn active_bouncers() -> i64 {
    ACTIVE_BOUNCERS.get()
}

pub fn gather() -> Result<Vec<u8>> {
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .context("failed to encode metrics")?;
    Ok(buffer)
}

fn metrics_response(method: &Method, path: &str) -> Response<ProxyBody> {
    if method != Method::GET || path != METRICS_PATH {
        return plain_text_response(StatusCode::NOT_FOUND, "not found");
    }

    match gather() {
        Ok(body) => {
            let mut response = Response::new(full(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT));
            response
        }
        Err(err) => {
            debug!(error = %err, "metrics encoding failed");
            plain_text_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
        }
    }
}

/// Serves the registry in the Prometheus text format on `addr`.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            let service = service_fn(|request: Request<Incoming>| async move {
                Ok::<_, Infallible>(metrics_response(request.method(), request.uri().path()))
            });
            let mut builder = http1::Builder::new();
            builder
                .timer(TokioTimer::new())
                .header_read_timeout(METRICS_READ_TIMEOUT);
            if let Err(err) = builder
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(error = %err, "metrics connection error");
            }
        });
    }
}
