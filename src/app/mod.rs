//! Application boundary: the port traits the servo core is written against.
//!
//! All interaction with PWM hardware, the laser, the status LED, and
//! persistent configuration happens through the traits in [`ports`],
//! keeping the positioning logic testable without real peripherals.

pub mod ports;
