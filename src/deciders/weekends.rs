use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use time::Weekday;

use crate::bouncer::{BufferedRequest, CheckTemplate, Decider, Decision, HttpError, TemplateFn};
use crate::config::DeciderParams;
use crate::deciders::Silence;

pub const NAME: &str = "SilencesDontExpireOnWeekends";

const WEEKEND_MESSAGE: &str =
    "by policy, silences can't expire on weekends. Be nice to people oncall over the weekend!";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Params {}

/// Rejects silences that end on a Saturday or Sunday, judged in the UTC
/// offset the client wrote `endsAt` in.
pub struct SilencesDontExpireOnWeekends;

impl SilencesDontExpireOnWeekends {
    fn check(&self, request: &BufferedRequest) -> Result<(), HttpError> {
        let silence = Silence::from_request(request)?;
        if matches!(silence.ends_at.weekday(), Weekday::Saturday | Weekday::Sunday) {
            return Err(HttpError::bad_request(WEEKEND_MESSAGE));
        }
        Ok(())
    }
}

#[async_trait]
impl Decider for SilencesDontExpireOnWeekends {
    async fn decide(&self, request: &BufferedRequest) -> Decision {
        self.check(request).into()
    }
}

pub fn template() -> impl CheckTemplate {
    TemplateFn::new(&[], |params: &DeciderParams| -> Result<Arc<dyn Decider>> {
        let Params {} = params.decode()?;
        Ok(Arc::new(SilencesDontExpireOnWeekends))
    })
}
