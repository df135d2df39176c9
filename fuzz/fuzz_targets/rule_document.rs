#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

use alertmanager_bouncer::bouncer::{TemplateRegistry, load_rule_set};
use alertmanager_bouncer::deciders::silence_templates;

static REGISTRY: Lazy<TemplateRegistry> = Lazy::new(|| silence_templates().build());

fuzz_target!(|data: &[u8]| {
    if let Ok(rules) = load_rule_set(data, &REGISTRY) {
        for bouncer in rules.bouncers() {
            assert!(bouncer.id().starts_with("bouncer#"));
        }
    }
});
