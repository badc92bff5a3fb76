//! Fuzz target: angle ⇄ pulse conversion on the shipped calibration
//!
//! Interprets the input as raw `f32` angles and `u32` pulses.
//!
//! Invariants checked:
//! - No panics for any bit pattern (NaN, infinities, subnormals)
//! - `clamp` always lands inside the axis limits
//! - `pulse_to_angle` always lands inside the axis limits
//!
//! cargo fuzz run fuzz_angle_pulse

#![no_main]

use apis_servo::{Axis, ServoConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cfg = ServoConfig::default();

    for chunk in data.chunks_exact(4) {
        let bits = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let angle = f32::from_bits(bits);

        for axis in Axis::ALL {
            let cal = cfg.axis(axis);
            let a = cfg.clamp(axis, angle);
            assert!(a >= cal.min_deg && a <= cal.max_deg);

            let back = cfg.pulse_to_angle(axis, bits);
            assert!(back >= cal.min_deg && back <= cal.max_deg);

            let _ = cfg.is_valid(axis, angle);
            let _ = cfg.angle_to_pulse(axis, angle);
        }
    }
});
