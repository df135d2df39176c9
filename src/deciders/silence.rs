use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use time::macros::datetime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::bouncer::{BufferedRequest, HttpError};

/// The parts of an Alertmanager silence the built-in deciders look at.
#[derive(Debug, Clone, PartialEq)]
pub struct Silence {
    pub comment: String,
    pub created_by: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub matchers: Vec<Matcher>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_regex: bool,
    #[serde(default = "default_is_equal", deserialize_with = "null_as_equal")]
    pub is_equal: bool,
}

fn default_is_equal() -> bool {
    true
}

/// Instant a silence falls back to when `startsAt` or `endsAt` is absent or
/// `null`.
pub const UNSET_TIMESTAMP: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

/// Absent fields and explicit `null` both decode to the field's empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_as_equal<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(|value| value.unwrap_or(true))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSilence {
    #[serde(default, deserialize_with = "null_as_default")]
    comment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    created_by: String,
    #[serde(default)]
    starts_at: Option<String>,
    #[serde(default)]
    ends_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    matchers: Vec<Matcher>,
}

impl Silence {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let raw: RawSilence = serde_json::from_slice(body).context("invalid silence JSON")?;
        Ok(Self {
            comment: raw.comment,
            created_by: raw.created_by,
            starts_at: parse_timestamp("startsAt", raw.starts_at.as_deref())?,
            ends_at: parse_timestamp("endsAt", raw.ends_at.as_deref())?,
            matchers: raw.matchers,
        })
    }

    /// Parses the request body, turning failures into a 400 rejection.
    pub fn from_request(request: &BufferedRequest) -> Result<Self, HttpError> {
        Self::from_slice(request.body())
            .map_err(|err| HttpError::bad_request(format!("failed to parse silence: {err:#}")))
    }

    pub fn duration(&self) -> time::Duration {
        self.ends_at - self.starts_at
    }
}

fn parse_timestamp(field: &str, value: Option<&str>) -> Result<OffsetDateTime> {
    let Some(value) = value else {
        return Ok(UNSET_TIMESTAMP);
    };
    OffsetDateTime::parse(value, &Rfc3339)
        .with_context(|| format!("{field} '{value}' is not an RFC 3339 timestamp"))
}
