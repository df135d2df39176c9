use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::bouncer::{BufferedRequest, CheckTemplate, Decider, Decision, HttpError, TemplateFn};
use crate::config::DeciderParams;
use crate::deciders::Silence;

pub const NAME: &str = "LongSilencesHaveTicket";

/// JIRA-style issue key at the start of the comment.
pub const DEFAULT_TICKET_PATTERN: &str = "^[A-Z]+-[0-9]+";

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct Params {
    max_length: DurationParam,
    #[serde(default)]
    ticket_regex: Option<String>,
}

/// `8h`, `90m`, `1h 30m` or a bare number of seconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum DurationParam {
    Seconds(u64),
    Text(String),
}

impl DurationParam {
    fn to_duration(&self) -> Result<Duration> {
        match self {
            DurationParam::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationParam::Text(text) => humantime::parse_duration(text.trim())
                .with_context(|| format!("invalid maxLength '{text}'")),
        }
    }
}

/// Rejects silences longer than `max_length` unless their comment
/// references a ticket.
pub struct LongSilencesHaveTicket {
    max_length: Duration,
    max_length_signed: time::Duration,
    ticket_regex: Regex,
}

impl LongSilencesHaveTicket {
    pub fn new(max_length: Duration, ticket_pattern: Option<&str>) -> Result<Self> {
        ensure!(!max_length.is_zero(), "maxLength must be greater than zero");
        let max_length_signed = time::Duration::try_from(max_length)
            .map_err(|_| anyhow!("maxLength {max_length:?} is out of range"))?;
        let pattern = ticket_pattern.unwrap_or(DEFAULT_TICKET_PATTERN);
        let ticket_regex = Regex::new(pattern)
            .with_context(|| format!("failed to compile ticketRegex '{pattern}'"))?;
        Ok(Self {
            max_length,
            max_length_signed,
            ticket_regex,
        })
    }

    fn check(&self, request: &BufferedRequest) -> Result<(), HttpError> {
        let silence = Silence::from_request(request)?;
        let too_long = silence.duration() > self.max_length_signed;
        if too_long && !self.ticket_regex.is_match(&silence.comment) {
            return Err(HttpError::bad_request(format!(
                "silences longer than {} must have tickets attached to them to track ongoing work",
                clock_duration(self.max_length)
            )));
        }
        Ok(())
    }
}

/// Renders `duration` as hours, minutes and seconds (`8h0m0s`, `1m30s`,
/// `1.5s`), falling back to `ms`, `µs` or `ns` below one second.
fn clock_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if secs == 0 {
        return match nanos {
            0 => "0s".to_string(),
            1..=999 => format!("{nanos}ns"),
            1_000..=999_999 => format!("{}µs", fraction(nanos / 1_000, nanos % 1_000, 3)),
            _ => format!("{}ms", fraction(nanos / 1_000_000, nanos % 1_000_000, 6)),
        };
    }

    let seconds = fraction((secs % 60) as u32, nanos, 9);
    let minutes = secs / 60 % 60;
    let hours = secs / 3600;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn fraction(whole: u32, rest: u32, digits: usize) -> String {
    if rest == 0 {
        return whole.to_string();
    }
    let rest = format!("{rest:0digits$}");
    format!("{whole}.{}", rest.trim_end_matches('0'))
}

#[async_trait]
impl Decider for LongSilencesHaveTicket {
    async fn decide(&self, request: &BufferedRequest) -> Decision {
        self.check(request).into()
    }
}

pub fn template() -> impl CheckTemplate {
    TemplateFn::new(&["maxLength"], |params: &DeciderParams| -> Result<Arc<dyn Decider>> {
        let params: Params = params.decode()?;
        let max_length = params.max_length.to_duration()?;
        Ok(Arc::new(LongSilencesHaveTicket::new(
            max_length,
            params.ticket_regex.as_deref(),
        )?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deciders::tests::silence_request;

    const DAY_LONG: &str = r#""startsAt":"2020-01-19T00:23:55.242Z","endsAt":"2020-01-20T00:23:55.242Z""#;

    fn eight_hours(pattern: Option<&str>) -> LongSilencesHaveTicket {
        LongSilencesHaveTicket::new(Duration::from_secs(8 * 3600), pattern).unwrap()
    }

    async fn decide(decider: &LongSilencesHaveTicket, body: &str) -> Decision {
        decider.decide(&silence_request(body)).await
    }

    #[tokio::test]
    async fn short_silence_needs_no_ticket() {
        let body = r#"{"startsAt":"2020-01-19T00:23:55.242Z","endsAt":"2020-01-19T00:23:55.242Z"}"#;
        assert!(decide(&eight_hours(None), body).await.is_allow());
    }

    #[tokio::test]
    async fn long_silence_without_ticket_is_rejected() {
        let Decision::Reject(err) = decide(&eight_hours(None), &format!("{{{DAY_LONG}}}")).await
        else {
            panic!("expected rejection");
        };
        assert_eq!(
            &*err.message,
            "silences longer than 8h0m0s must have tickets attached to them to track ongoing work"
        );
    }

    #[test]
    fn max_length_is_rendered_as_a_clock_duration() {
        assert_eq!(clock_duration(Duration::from_secs(8 * 3600)), "8h0m0s");
        assert_eq!(clock_duration(Duration::from_secs(90 * 60)), "1h30m0s");
        assert_eq!(clock_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(clock_duration(Duration::from_millis(1_500)), "1.5s");
        assert_eq!(clock_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(clock_duration(Duration::from_micros(1_500)), "1.5ms");
        assert_eq!(clock_duration(Duration::from_nanos(42)), "42ns");
    }

    #[tokio::test]
    async fn missing_start_counts_as_a_long_silence() {
        let body = r#"{"endsAt":"2020-01-20T00:23:55.242Z","comment":"no ticket"}"#;
        assert!(!decide(&eight_hours(None), body).await.is_allow());
    }

    #[tokio::test]
    async fn long_silence_with_ticket_is_allowed() {
        let body = format!(r#"{{{DAY_LONG},"comment":"TICKET-1"}}"#);
        assert!(decide(&eight_hours(None), &body).await.is_allow());
    }

    #[tokio::test]
    async fn custom_ticket_pattern_is_used() {
        let body = format!(r#"{{{DAY_LONG},"comment":"CATS"}}"#);
        assert!(decide(&eight_hours(Some("CATS")), &body).await.is_allow());
        assert!(!decide(&eight_hours(Some("CATS1")), &body).await.is_allow());
    }

    #[tokio::test]
    async fn malformed_silence_is_rejected() {
        let body = format!("{{{DAY_LONG},}}");
        assert!(!decide(&eight_hours(None), &body).await.is_allow());
    }

    #[test]
    fn template_accepts_text_and_seconds() {
        assert!(template().build(&DeciderParams::default().with("maxLength", "8h")).is_ok());
        assert!(
            template()
                .build(&DeciderParams::default().with("maxLength", serde_yaml::Value::Number(28800u64.into())))
                .is_ok()
        );
    }

    #[test]
    fn template_rejects_bad_parameters() {
        let build = |params: DeciderParams| template().build(&params).is_err();
        assert!(build(DeciderParams::default().with("maxLength", "0s")));
        assert!(build(DeciderParams::default().with("maxLength", "soon")));
        assert!(build(
            DeciderParams::default()
                .with("maxLength", "8h")
                .with("ticketRegex", "(")
        ));
        assert!(build(
            DeciderParams::default()
                .with("maxLength", "8h")
                .with("ticket", "X")
        ));
    }
}
