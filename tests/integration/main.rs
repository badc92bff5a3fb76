//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below exercises the controller end-to-end against the
//! in-memory PWM backend (or a fake sysfs tree) and mock collaborators.
//! Everything runs on the host with real threads and real sleeps, no
//! hardware required.

#![cfg(not(target_os = "espidf"))]

mod controller_tests;
mod mock_hw;
mod watchdog_tests;
