//! Adapters: concrete implementations of the port traits that are not
//! PWM drivers.
//!
//! | Adapter       | Implements | Connects to                   |
//! |---------------|------------|-------------------------------|
//! | `config_file` | ConfigPort | JSON file (Linux fs / ESP VFS) |
//! | `time`        | (clock)    | esp_timer / `Instant`         |

pub mod config_file;
pub mod time;
