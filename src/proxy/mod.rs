pub mod body;
pub mod forward_error;
pub mod headers;
pub mod listener;
pub mod request;
pub mod response;
pub mod tls;
pub mod transport;
pub mod upstream;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;

use crate::bouncer::RuleSet;
use crate::settings::Settings;
use transport::BouncingTransport;

/// Holder of the active rule set. Readers take a cheap snapshot; a reload
/// swaps the whole set at once.
#[derive(Clone)]
pub struct RuleStore {
    tx: Arc<watch::Sender<RuleSet>>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(rules)),
        }
    }

    pub fn snapshot(&self) -> RuleSet {
        self.tx.borrow().clone()
    }

    /// Installs `rules` and hands back the set it replaced.
    pub fn replace(&self, rules: RuleSet) -> RuleSet {
        self.tx.send_replace(rules)
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub transport: BouncingTransport,
    pub tls: Option<TlsAcceptor>,
}

impl AppContext {
    pub fn new(
        settings: Arc<Settings>,
        transport: BouncingTransport,
        tls: Option<TlsAcceptor>,
    ) -> Self {
        Self {
            settings,
            transport,
            tls,
        }
    }
}

pub async fn run(app: AppContext) -> Result<()> {
    listener::start_listener(app).await
}
