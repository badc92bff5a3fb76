//! PWM backends and task helpers.
//!
//! | Driver      | Implements | Connects to                         |
//! |-------------|------------|-------------------------------------|
//! | `pwm_ledc`  | PwmPort    | ESP32 LEDC timer 0, channels 0/1    |
//! | `pwm_sysfs` | PwmPort    | Linux `/sys/class/pwm` (mock fallback) |
//! | `pwm_mock`  | PwmPort    | In-memory test double               |

pub mod pwm_ledc;
pub mod pwm_mock;
pub mod pwm_sysfs;
pub mod task_pin;
