use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "alertmanager-bouncer",
    about = "Policy-enforcing reverse proxy for the Alertmanager API"
)]
pub struct Cli {
    /// Path to the runtime configuration file (defaults to ./bouncer.toml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to accept client connections on.
    #[arg(long = "listen-addr")]
    pub listen_addr: Option<SocketAddr>,

    /// Alertmanager URL requests are forwarded to.
    #[arg(long = "backend-addr")]
    pub backend_addr: Option<String>,

    /// Path of the YAML bouncer rule document.
    #[arg(long)]
    pub bouncers: Option<PathBuf>,

    #[arg(long = "tls-certfile")]
    pub tls_certfile: Option<PathBuf>,

    #[arg(long = "tls-keyfile")]
    pub tls_keyfile: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub log: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}
