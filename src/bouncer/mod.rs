//! Request bouncing: targets, deciders and the rule sets built from the
//! rule document.

mod decider;
mod decision;
mod loader;
mod request;
mod rule;
mod target;
mod template;

pub use decider::{Decider, DeciderFn, decider_fn};
pub use decision::{Decision, HttpError};
pub use loader::{RuleSet, compile_rule_set, load_rule_set};
pub use request::{BodyLimits, BodyReadError, BufferedRequest};
pub use rule::Bouncer;
pub use target::Target;
pub use template::{CheckTemplate, TemplateFn, TemplateRegistry, TemplateRegistryBuilder};
