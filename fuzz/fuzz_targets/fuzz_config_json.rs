//! Fuzz target: `ServoConfig` JSON parsing + validation
//!
//! Feeds arbitrary bytes through the same path `JsonConfigStore::load` uses
//! and, for every config that passes `validate()`, drives the derived
//! timing and conversion helpers.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A validated config never yields zero steps or a zero watchdog cadence
//! - Clamped angles stay inside the configured limits
//! - Pulses stay inside the configured pulse range
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use apis_servo::{Axis, ServoConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = serde_json::from_slice::<ServoConfig>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }

    assert!(cfg.total_steps() >= 1);
    assert!(cfg.watchdog_every_ticks() >= 1);
    assert!(cfg.pwm_period_us() > 0);

    for axis in Axis::ALL {
        let cal = cfg.axis(axis);
        for probe in [f32::MIN, -1e6, cal.min_deg, cal.center_deg, cal.max_deg, 1e6, f32::MAX, f32::NAN] {
            let a = cfg.clamp(axis, probe);
            assert!(a >= cal.min_deg && a <= cal.max_deg, "{axis} clamp({probe}) = {a}");
            let p = cfg.angle_to_pulse(axis, a);
            assert!(p >= cal.pulse_min_us && p <= cal.pulse_max_us, "{axis} pulse {p}");
        }
    }
});
