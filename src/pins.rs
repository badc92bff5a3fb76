//! GPIO / PWM channel assignments for the APIS servo board.
//!
//! Single source of truth: every PWM backend references this module rather
//! than hard-coding pin numbers or channel indices.

// ---------------------------------------------------------------------------
// ESP32-CAM (LEDC peripheral)
// ---------------------------------------------------------------------------

/// Pan servo signal pin (free on the ESP32-CAM header).
pub const ESP32_PAN_GPIO: i32 = 13;
/// Tilt servo signal pin.
pub const ESP32_TILT_GPIO: i32 = 15;

/// LEDC duty resolution shared by both servo channels (8192 levels).
pub const LEDC_DUTY_BITS: u32 = 13;
/// LEDC channel index for pan.
pub const LEDC_CH_PAN: u32 = 0;
/// LEDC channel index for tilt.
pub const LEDC_CH_TILT: u32 = 1;

// ---------------------------------------------------------------------------
// Raspberry Pi (PWM sysfs)
// ---------------------------------------------------------------------------

/// On the Pi 5 the two hardware PWM outputs live on pwmchip2.
/// Requires `dtoverlay=pwm-2chan` in `/boot/config.txt`.
pub const PWM_CHIP_PATH: &str = "/sys/class/pwm/pwmchip2";

/// sysfs channel driving GPIO18 (pan).
pub const PWM_PAN_CHANNEL: u8 = 0;
/// sysfs channel driving GPIO19 (tilt).
pub const PWM_TILT_CHANNEL: u8 = 1;

/// Pan GPIO on the Pi header (PWM0 capable).
pub const PI_PAN_GPIO: i32 = 18;
/// Tilt GPIO on the Pi header (PWM1 capable).
pub const PI_TILT_GPIO: i32 = 19;
