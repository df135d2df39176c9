use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;

use super::model::{BouncerSpec, DeciderParams, DeciderSpec, RuleDocument};

pub fn load_rule_document(path: &Path) -> Result<RuleDocument> {
    let contents = fs::read(path)
        .with_context(|| format!("failed to read bouncer rules {}", path.display()))?;
    parse_rule_document(&contents)
        .with_context(|| format!("invalid bouncer rules in {}", path.display()))
}

/// Parses a YAML (or JSON) rule document. Unknown fields at any level are
/// errors.
pub fn parse_rule_document(contents: &[u8]) -> Result<RuleDocument> {
    if contents.iter().all(u8::is_ascii_whitespace) {
        bail!("bouncer rule document is empty");
    }

    let raw: RawRuleDocument =
        serde_yaml::from_slice(contents).context("failed to parse bouncer rule document")?;

    let mut bouncers = Vec::with_capacity(raw.bouncers.len());
    for (index, bouncer) in raw.bouncers.into_iter().enumerate() {
        let id: Arc<str> = Arc::from(format!("bouncer#{index}"));
        let spec = convert_bouncer(id.clone(), bouncer).with_context(|| format!("{id} is invalid"))?;
        bouncers.push(spec);
    }

    Ok(RuleDocument { bouncers })
}

fn convert_bouncer(id: Arc<str>, raw: RawBouncer) -> Result<BouncerSpec> {
    let method = raw.method.trim();
    ensure!(!method.is_empty(), "method must not be empty");
    ensure!(
        !method.chars().any(char::is_whitespace),
        "method '{method}' must not contain whitespace"
    );

    let mut deciders = Vec::with_capacity(raw.deciders.len());
    for decider in raw.deciders {
        let name = decider.name.trim();
        ensure!(!name.is_empty(), "decider name must not be empty");
        deciders.push(DeciderSpec {
            name: Arc::from(name),
            params: decider.config.unwrap_or_default(),
        });
    }

    Ok(BouncerSpec {
        id,
        method: Arc::from(method),
        uri_regex: raw.uri_regex,
        dry_run: raw.dry_run,
        deciders,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleDocument {
    #[serde(default)]
    bouncers: Vec<RawBouncer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBouncer {
    method: String,
    #[serde(rename = "uriRegex")]
    uri_regex: String,
    #[serde(default, rename = "dryrun")]
    dry_run: bool,
    #[serde(default)]
    deciders: Vec<RawDecider>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecider {
    name: String,
    #[serde(default)]
    config: Option<DeciderParams>,
}
