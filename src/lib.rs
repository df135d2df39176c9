pub mod bouncer;
pub mod cli;
pub mod config;
pub mod deciders;
pub mod logging;
pub mod metrics;
pub mod proxy;
pub mod settings;
pub mod util;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    bouncer::TemplateRegistry,
    deciders::MirrorOptions,
    proxy::{
        tls::build_tls_acceptor,
        transport::BouncingTransport,
        upstream::{UpstreamForwarder, build_http_client},
    },
    settings::Settings,
};

pub async fn run(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    if let Some(addr) = settings.metrics_listen {
        tokio::spawn(async move {
            tracing::info!(address = %addr, "metrics endpoint starting");
            if let Err(err) = crate::metrics::serve(addr).await {
                tracing::error!(error = %err, "metrics endpoint failed");
            }
        });
    }

    let client = build_http_client(
        settings.upstream_connect_timeout(),
        settings.upstream_pool_idle,
    )?;
    let registry = deciders::default_registry(MirrorOptions {
        client: client.clone(),
        timeout: settings.mirror_timeout(),
    });
    let rules = settings
        .load_rule_set(&registry)
        .context("failed to load bouncer rules")?;
    crate::metrics::set_active_bouncers(rules.len());
    tracing::info!(
        bouncers = rules.len(),
        backend = %settings.backend,
        "bouncer rules loaded"
    );

    let forwarder = UpstreamForwarder::new(client, settings.backend()?, settings.upstream_timeout());
    let transport = BouncingTransport::new(Arc::new(forwarder), rules, settings.body_limits());
    spawn_reload_task(settings.clone(), registry, transport.clone())?;

    let tls = match settings.tls_files() {
        Some((cert, key)) => Some(build_tls_acceptor(cert, key)?),
        None => None,
    };

    let app = proxy::AppContext::new(settings, transport, tls);
    proxy::run(app).await
}

/// Re-reads the rule document and installs it. On failure the current rules
/// stay active.
pub fn reload_rule_set(
    settings: &Settings,
    registry: &TemplateRegistry,
    transport: &BouncingTransport,
) -> Result<usize> {
    let result = settings.load_rule_set(registry);
    crate::metrics::record_reload(result.is_ok());
    let rules = result?;
    let count = rules.len();
    transport.replace_rule_set(rules);
    Ok(count)
}

#[cfg(unix)]
fn spawn_reload_task(
    settings: Arc<Settings>,
    registry: TemplateRegistry,
    transport: BouncingTransport,
) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hup.recv().await.is_some() {
            tracing::info!("received SIGHUP; reloading bouncer rules");
            match reload_rule_set(&settings, &registry, &transport) {
                Ok(bouncer_count) => {
                    tracing::info!(bouncer_count, "bouncer rules reloaded");
                }
                Err(err) => {
                    tracing::error!(error = format!("{err:#}"), "bouncer rule reload failed; keeping previous rules");
                }
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_reload_task(
    _settings: Arc<Settings>,
    _registry: TemplateRegistry,
    _transport: BouncingTransport,
) -> Result<()> {
    tracing::info!("SIGHUP reload is not supported on this platform");
    Ok(())
}
