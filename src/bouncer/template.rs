use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};

use crate::bouncer::Decider;
use crate::config::DeciderParams;

/// Builds deciders of one kind from the parameters given in the rule
/// document.
pub trait CheckTemplate: Send + Sync {
    /// Parameters that must be present before [`CheckTemplate::build`] runs.
    fn required_parameters(&self) -> &[&'static str] {
        &[]
    }

    fn build(&self, params: &DeciderParams) -> Result<Arc<dyn Decider>>;
}

/// A [`CheckTemplate`] backed by a closure.
pub struct TemplateFn<F> {
    required: &'static [&'static str],
    build: F,
}

impl<F> TemplateFn<F>
where
    F: Fn(&DeciderParams) -> Result<Arc<dyn Decider>> + Send + Sync,
{
    pub fn new(required: &'static [&'static str], build: F) -> Self {
        Self { required, build }
    }
}

impl<F> CheckTemplate for TemplateFn<F>
where
    F: Fn(&DeciderParams) -> Result<Arc<dyn Decider>> + Send + Sync,
{
    fn required_parameters(&self) -> &[&'static str] {
        self.required
    }

    fn build(&self, params: &DeciderParams) -> Result<Arc<dyn Decider>> {
        (self.build)(params)
    }
}

/// Immutable lookup from decider name to template. Cheap to clone; built
/// once at startup and shared by the initial load and every reload.
#[derive(Clone, Default)]
pub struct TemplateRegistry {
    templates: Arc<BTreeMap<Arc<str>, Arc<dyn CheckTemplate>>>,
}

#[derive(Default)]
pub struct TemplateRegistryBuilder {
    templates: BTreeMap<Arc<str>, Arc<dyn CheckTemplate>>,
}

impl TemplateRegistryBuilder {
    /// Registers `template` under `name`. Names are unique; registering the
    /// same name twice is a programming error.
    pub fn register(mut self, name: &str, template: impl CheckTemplate + 'static) -> Self {
        let previous = self
            .templates
            .insert(Arc::from(name), Arc::new(template));
        assert!(previous.is_none(), "decider template '{name}' registered twice");
        self
    }

    pub fn build(self) -> TemplateRegistry {
        TemplateRegistry {
            templates: Arc::new(self.templates),
        }
    }
}

impl TemplateRegistry {
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn CheckTemplate>> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|name| name.as_ref())
    }

    /// Looks up `name`, checks the required parameters are present and
    /// builds the decider.
    pub fn instantiate(&self, name: &str, params: &DeciderParams) -> Result<Arc<dyn Decider>> {
        let template = self.get(name).ok_or_else(|| {
            anyhow!(
                "unknown decider '{name}' (known deciders: {})",
                self.names().collect::<Vec<_>>().join(", ")
            )
        })?;

        let missing: Vec<&str> = template
            .required_parameters()
            .iter()
            .copied()
            .filter(|param| !params.contains(param))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!(
                "missing required parameter(s): {}",
                missing.join(", ")
            ));
        }

        template.build(params)
    }
}
