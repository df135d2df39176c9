//! The bouncer rule document: a YAML list of bouncers, each naming a
//! target and the deciders to run.

mod loader;
pub mod model;

pub use loader::{load_rule_document, parse_rule_document};
pub use model::{BouncerSpec, DeciderParams, DeciderSpec, RuleDocument};
