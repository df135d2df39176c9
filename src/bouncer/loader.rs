use std::sync::Arc;

use anyhow::{Context, Result};
use http::{Method, Uri};
use regex::Regex;

use crate::bouncer::{Bouncer, Target, TemplateRegistry};
use crate::config::{BouncerSpec, RuleDocument, parse_rule_document};

/// The active, ordered list of bouncers. Cloning shares the list; a rule set
/// never changes once built.
#[derive(Clone, Default)]
pub struct RuleSet {
    bouncers: Arc<[Bouncer]>,
}

impl RuleSet {
    pub fn new(bouncers: Vec<Bouncer>) -> Self {
        Self {
            bouncers: bouncers.into(),
        }
    }

    pub fn bouncers(&self) -> &[Bouncer] {
        &self.bouncers
    }

    pub fn len(&self) -> usize {
        self.bouncers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bouncers.is_empty()
    }

    pub fn any_match(&self, method: &Method, uri: &Uri) -> bool {
        self.bouncers
            .iter()
            .any(|bouncer| bouncer.matches(method, uri))
    }
}

/// Parses and compiles a rule document in one step. Either every bouncer
/// builds or nothing is returned.
pub fn load_rule_set(contents: &[u8], registry: &TemplateRegistry) -> Result<RuleSet> {
    let document = parse_rule_document(contents)?;
    compile_rule_set(&document, registry)
}

pub fn compile_rule_set(document: &RuleDocument, registry: &TemplateRegistry) -> Result<RuleSet> {
    let mut bouncers = Vec::with_capacity(document.bouncers.len());
    for spec in &document.bouncers {
        let bouncer = compile_bouncer(spec, registry)
            .with_context(|| format!("failed to compile {}", spec.id))?;
        bouncers.push(bouncer);
    }
    Ok(RuleSet::new(bouncers))
}

fn compile_bouncer(spec: &BouncerSpec, registry: &TemplateRegistry) -> Result<Bouncer> {
    let uri_regex = Regex::new(&spec.uri_regex)
        .with_context(|| format!("invalid uriRegex '{}'", spec.uri_regex))?;
    let target = Target::new(spec.method.clone(), uri_regex);

    let mut bouncer = Bouncer::new(spec.id.clone(), target, spec.dry_run);
    for decider in &spec.deciders {
        let built = registry
            .instantiate(&decider.name, &decider.params)
            .with_context(|| format!("failed to create decider '{}'", decider.name))?;
        bouncer.push_decider(decider.name.clone(), built);
    }
    Ok(bouncer)
}
