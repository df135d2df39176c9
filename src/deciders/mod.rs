//! Built-in deciders for the Alertmanager silences API.

pub mod author;
pub mod mirror;
mod silence;
pub mod ticket;
pub mod weekends;

pub use mirror::MirrorOptions;
pub use silence::{Matcher, Silence};

use crate::bouncer::{TemplateRegistry, TemplateRegistryBuilder};

/// Registry builder holding the deciders that only inspect the silence in
/// the request body.
pub fn silence_templates() -> TemplateRegistryBuilder {
    TemplateRegistry::builder()
        .register(author::NAME, author::template())
        .register(weekends::NAME, weekends::template())
        .register(ticket::NAME, ticket::template())
}

/// Every built-in decider, including `Mirror`.
pub fn default_registry(mirror: MirrorOptions) -> TemplateRegistry {
    silence_templates()
        .register(mirror::NAME, mirror::template(mirror))
        .build()
}
