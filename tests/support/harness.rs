use std::net::SocketAddr;
use std::path::Path;

use anyhow::Result;
use tokio::task::JoinHandle;

use alertmanager_bouncer::{cli::LogFormat, settings::Settings};

use super::dirs::TestDirs;
use super::http_utils::{HttpResponse, send_request};
use super::net::{free_local_addr, wait_for_listener};

pub fn test_settings(listen: SocketAddr, backend: &str, bouncers: &Path) -> Settings {
    Settings {
        listen,
        backend: backend.to_string(),
        bouncers: bouncers.to_path_buf(),
        log: LogFormat::Text,
        log_queries: false,
        tls_cert: None,
        tls_key: None,
        client_timeout: 5,
        upstream_connect_timeout: 2,
        upstream_timeout: 5,
        mirror_timeout: 2,
        max_request_body_size: 64 * 1024,
        upstream_pool_idle: 4,
        metrics_listen: None,
    }
}

/// A bouncer started through the public `run` entry point.
pub struct BouncerHarness {
    pub dirs: TestDirs,
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl BouncerHarness {
    pub async fn spawn(bouncers: &str, backend: &str) -> Result<Self> {
        Self::spawn_with(bouncers, backend, |_| {}).await
    }

    pub async fn spawn_with<F>(bouncers: &str, backend: &str, customize: F) -> Result<Self>
    where
        F: FnOnce(&mut Settings),
    {
        let dirs = TestDirs::new()?;
        dirs.write_bouncers(bouncers)?;

        let addr = free_local_addr()?;
        let mut settings = test_settings(addr, backend, &dirs.bouncers_path);
        customize(&mut settings);

        let handle = tokio::spawn(async move {
            if let Err(err) = alertmanager_bouncer::run(settings).await {
                tracing::error!(error = ?err, "bouncer run failed");
            }
        });
        wait_for_listener(addr).await?;

        Ok(Self { dirs, addr, handle })
    }

    pub async fn send(&self, method: &str, path: &str, body: &str) -> Result<HttpResponse> {
        send_request(self.addr, method, path, body).await
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
