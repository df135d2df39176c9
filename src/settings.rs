use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::bouncer::{BodyLimits, RuleSet, TemplateRegistry, compile_rule_set};
use crate::cli::{Cli, LogFormat};
use crate::config::load_rule_document;
use crate::proxy::upstream::Backend;

fn default_log_queries() -> bool {
    false
}

fn default_client_timeout() -> u64 {
    10
}

fn default_upstream_connect_timeout() -> u64 {
    5
}

fn default_upstream_timeout() -> u64 {
    60
}

fn default_mirror_timeout() -> u64 {
    5
}

fn default_max_request_body_size() -> usize {
    4 * 1024 * 1024
}

fn default_upstream_pool_idle() -> usize {
    32
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub listen: SocketAddr,
    pub backend: String,
    pub bouncers: PathBuf,
    #[serde(default = "default_log_format")]
    pub log: LogFormat,
    #[serde(default = "default_log_queries")]
    pub log_queries: bool,
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
    #[serde(default = "default_client_timeout")]
    pub client_timeout: u64,
    #[serde(default = "default_upstream_connect_timeout")]
    pub upstream_connect_timeout: u64,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: u64,
    #[serde(default = "default_mirror_timeout")]
    pub mirror_timeout: u64,
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: usize,
    #[serde(default = "default_upstream_pool_idle")]
    pub upstream_pool_idle: usize,
    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,
}

impl Settings {
    /// Merges the settings file (if any), `BOUNCER__*` environment variables
    /// and command-line overrides, in increasing order of precedence.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder();
        let config_path = resolve_config_path(cli)?;

        if let Some(path) = &config_path {
            builder = builder.add_source(File::from(path.clone()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("BOUNCER")
                .separator("__")
                .try_parsing(true),
        );
        builder = apply_cli_overrides(builder, cli)?;

        let cfg = builder.build().map_err(to_anyhow)?;
        let mut settings: Settings = cfg.try_deserialize().map_err(to_anyhow)?;
        if let Some(path) = &config_path {
            settings.apply_base_dir(path);
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Reads the bouncer rule document and compiles it against `registry`.
    pub fn load_rule_set(&self, registry: &TemplateRegistry) -> Result<RuleSet> {
        let document = load_rule_document(&self.bouncers)?;
        compile_rule_set(&document, registry)
            .with_context(|| format!("failed to load bouncers from {}", self.bouncers.display()))
    }

    pub fn backend(&self) -> Result<Backend> {
        Backend::parse(&self.backend).context("invalid backend")
    }

    pub fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            max_size: self.max_request_body_size,
            read_timeout: self.client_timeout(),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout)
    }

    pub fn upstream_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }

    pub fn mirror_timeout(&self) -> Duration {
        Duration::from_secs(self.mirror_timeout)
    }

    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err)
}

fn apply_cli_overrides(
    builder: ConfigBuilder<DefaultState>,
    cli: &Cli,
) -> Result<ConfigBuilder<DefaultState>> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let path_override = |path: &Option<PathBuf>| {
        path.as_ref()
            .map(|path| absolutize(path, &cwd).display().to_string())
    };

    builder
        .set_override_option("listen", cli.listen_addr.map(|addr| addr.to_string()))?
        .set_override_option("backend", cli.backend_addr.clone())?
        .set_override_option("bouncers", path_override(&cli.bouncers))?
        .set_override_option("tls_cert", path_override(&cli.tls_certfile))?
        .set_override_option("tls_key", path_override(&cli.tls_keyfile))?
        .set_override_option("log", cli.log.map(LogFormat::as_str))
        .map_err(to_anyhow)
}

fn resolve_config_path(cli: &Cli) -> Result<Option<PathBuf>> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            bail!("configuration file {} does not exist", path.display());
        }
        return Ok(Some(path.clone()));
    }

    Ok(default_config_candidates()
        .into_iter()
        .find(|candidate| candidate.exists()))
}

fn default_config_candidates() -> [PathBuf; 2] {
    [
        PathBuf::from("/etc/alertmanager-bouncer/bouncer.toml"),
        PathBuf::from("bouncer.toml"),
    ]
}

impl Settings {
    fn apply_base_dir(&mut self, config_path: &Path) {
        let base_dir = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        self.bouncers = absolutize(&self.bouncers, base_dir);
        self.tls_cert = self.tls_cert.as_ref().map(|path| absolutize(path, base_dir));
        self.tls_key = self.tls_key.as_ref().map(|path| absolutize(path, base_dir));
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_request_body_size > 0,
            "max_request_body_size must be greater than 0 (got {})",
            self.max_request_body_size
        );
        ensure!(
            self.client_timeout > 0,
            "client_timeout must be greater than 0 seconds (got {})",
            self.client_timeout
        );
        ensure!(
            self.upstream_connect_timeout > 0,
            "upstream_connect_timeout must be greater than 0 seconds (got {})",
            self.upstream_connect_timeout
        );
        ensure!(
            self.upstream_timeout > 0,
            "upstream_timeout must be greater than 0 seconds (got {})",
            self.upstream_timeout
        );
        ensure!(
            self.mirror_timeout > 0,
            "mirror_timeout must be greater than 0 seconds (got {})",
            self.mirror_timeout
        );
        ensure!(
            !self.bouncers.as_os_str().is_empty(),
            "bouncers must name the rule document"
        );
        self.backend()?;
        match (&self.tls_cert, &self.tls_key) {
            (Some(_), None) => bail!("TLS cert file given without TLS key file"),
            (None, Some(_)) => bail!("TLS key file given without TLS cert file"),
            _ => {}
        }
        Ok(())
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
