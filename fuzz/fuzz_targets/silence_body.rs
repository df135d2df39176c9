#![no_main]

use libfuzzer_sys::fuzz_target;

use alertmanager_bouncer::deciders::Silence;

fuzz_target!(|data: &[u8]| {
    if let Ok(silence) = Silence::from_slice(data) {
        let _ = silence.duration();
    }
});
