use std::sync::Arc;

use anyhow::{Result, ensure};
use async_trait::async_trait;
use serde::Deserialize;

use crate::bouncer::{BufferedRequest, CheckTemplate, Decider, Decision, HttpError, TemplateFn};
use crate::config::DeciderParams;
use crate::deciders::Silence;

pub const NAME: &str = "AllSilencesHaveAuthor";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Params {
    domain: String,
}

/// Rejects silences whose `createdBy` does not end with the configured
/// domain.
pub struct SilencesHaveAuthor {
    domain: String,
}

impl SilencesHaveAuthor {
    pub fn new(domain: impl Into<String>) -> Result<Self> {
        let domain = domain.into();
        ensure!(!domain.is_empty(), "domain must not be empty");
        Ok(Self { domain })
    }

    fn check(&self, request: &BufferedRequest) -> Result<(), HttpError> {
        let silence = Silence::from_request(request)?;
        if !silence.created_by.ends_with(&self.domain) {
            return Err(HttpError::bad_request(format!(
                "creators must be {:?} emails. Got {:?}",
                self.domain, silence.created_by
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Decider for SilencesHaveAuthor {
    async fn decide(&self, request: &BufferedRequest) -> Decision {
        self.check(request).into()
    }
}

pub fn template() -> impl CheckTemplate {
    TemplateFn::new(&["domain"], |params: &DeciderParams| -> Result<Arc<dyn Decider>> {
        let params: Params = params.decode()?;
        Ok(Arc::new(SilencesHaveAuthor::new(params.domain)?))
    })
}
