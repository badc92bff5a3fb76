//! APIS servo controller: entry point.
//!
//! ```text
//!  JsonConfigStore ──▶ ServoConfig ──▶ ServoController<P> ──▶ PwmPort
//!                                          │                  LEDC (ESP32)
//!                                          │                  sysfs (Linux)
//!                                          ▼                  mock (other)
//!                                   failure callback
//! ```
//!
//! Environment:
//! - `APIS_SERVO_CONFIG`: config file path (default `/etc/apis/servo.json`)
//! - `APIS_SERVO_SELF_TEST=1`: run the commissioning sweep after init
//! - `RUST_LOG`: log filter on the host build
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use apis_servo::adapters::config_file::{DEFAULT_CONFIG_PATH, JsonConfigStore};
use apis_servo::app::ports::{ConfigPort, PwmPort};
use apis_servo::safety::FailureEscalation;
use apis_servo::{ServoConfig, ServoController};

const STATS_INTERVAL: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    init_logging()?;
    info!("APIS servo controller v{}", env!("CARGO_PKG_VERSION"));

    let path = std::env::var("APIS_SERVO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = match JsonConfigStore::new(&path).load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config: {} ({}), running with defaults", e, path);
            ServoConfig::default()
        }
    };

    let pwm = platform_pwm(&config)?;
    info!("PWM backend: {}", pwm.name());
    run(ServoController::new(pwm, config, FailureEscalation::new()))
}

fn run<P: PwmPort + 'static>(servo: ServoController<P>) -> Result<()> {
    servo.set_failure_callback(|axis| {
        error!("servo failure on {} axis, laser interlock engaged", axis);
    });
    servo.init().context("servo init")?;

    if std::env::var("APIS_SERVO_SELF_TEST").is_ok_and(|v| v == "1") {
        servo.self_test().context("servo self-test")?;
    }

    let status = servo.home().context("servo home")?;
    if status.is_clamped() {
        warn!("home position outside configured limits, clamped");
    }

    loop {
        std::thread::sleep(STATS_INTERVAL);
        let stats = servo.get_stats().context("servo stats")?;
        info!("servo stats: {}", serde_json::to_string(&stats)?);
    }
}

// ── Platform wiring ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

#[cfg(target_os = "espidf")]
fn platform_pwm(
    config: &ServoConfig,
) -> Result<apis_servo::drivers::pwm_ledc::LedcPwm<apis_servo::drivers::pwm_ledc::ServoChannel>> {
    use apis_servo::drivers::pwm_ledc::LedcPwm;

    // Pins must match `pins::ESP32_PAN_GPIO` / `pins::ESP32_TILT_GPIO`.
    let p = esp_idf_hal::peripherals::Peripherals::take().context("peripherals")?;
    LedcPwm::esp32(
        p.ledc.timer0,
        p.ledc.channel0,
        p.ledc.channel1,
        p.pins.gpio13,
        p.pins.gpio15,
        config.pwm_frequency_hz,
        config.pwm_period_us(),
    )
    .context("LEDC setup")
}

#[cfg(target_os = "linux")]
fn platform_pwm(config: &ServoConfig) -> Result<apis_servo::drivers::pwm_sysfs::SysfsPwm> {
    Ok(apis_servo::drivers::pwm_sysfs::SysfsPwm::new(config.pwm_period_us()))
}

#[cfg(not(any(target_os = "espidf", target_os = "linux")))]
fn platform_pwm(_config: &ServoConfig) -> Result<apis_servo::drivers::pwm_mock::MockPwm> {
    warn!("no PWM hardware on this platform, using the in-memory backend");
    Ok(apis_servo::drivers::pwm_mock::MockPwm::new())
}
