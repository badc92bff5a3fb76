//! Linux PWM-sysfs backend (Raspberry Pi).
//!
//! Drives the two hardware PWM channels through
//! `/sys/class/pwm/pwmchipN/{export,pwmM/period,pwmM/duty_cycle,pwmM/enable}`.
//!
//! ## Degraded mode
//!
//! If the chip is missing (no `dtoverlay=pwm-2chan`) or a channel refuses
//! configuration, the backend drops into a logging-only mock mode instead
//! of failing startup. Higher layers keep running, which is what you want
//! on a dev box or a half-provisioned unit; the warning at init says why.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::PwmPort;
use crate::error::PwmError;
use crate::pins;
use crate::servo::Axis;

/// PWM backend writing to the kernel's sysfs interface.
#[derive(Debug)]
pub struct SysfsPwm {
    chip: PathBuf,
    period_ns: u32,
    mock_mode: bool,
}

impl SysfsPwm {
    /// Backend on the board's default chip (`pins::PWM_CHIP_PATH`).
    pub fn new(period_us: u32) -> Self {
        Self::with_chip(pins::PWM_CHIP_PATH, period_us)
    }

    /// Backend on an arbitrary chip directory.
    pub fn with_chip(chip: impl AsRef<Path>, period_us: u32) -> Self {
        Self {
            chip: chip.as_ref().to_path_buf(),
            period_ns: period_us.saturating_mul(1_000),
            mock_mode: false,
        }
    }

    /// True when init fell back to logging-only mode.
    pub fn is_mock(&self) -> bool {
        self.mock_mode
    }

    fn channel(axis: Axis) -> u8 {
        match axis {
            Axis::Pan => pins::PWM_PAN_CHANNEL,
            Axis::Tilt => pins::PWM_TILT_CHANNEL,
        }
    }

    fn attr(&self, channel: u8, name: &str) -> PathBuf {
        self.chip.join(format!("pwm{}", channel)).join(name)
    }

    fn export(&self, channel: u8) -> Result<(), PwmError> {
        if self.chip.join(format!("pwm{}", channel)).exists() {
            debug!("PWM channel {} already exported", channel);
            return Ok(());
        }
        write_attr(&self.chip.join("export"), channel).map_err(|e| {
            warn!("PWM export of channel {} failed: {}", channel, e);
            PwmError::ExportFailed { channel }
        })
    }

    fn configure(&self, channel: u8) -> Result<(), PwmError> {
        let fail = |e: io::Error| {
            warn!("PWM configure of channel {} failed: {}", channel, e);
            PwmError::ConfigureFailed { channel }
        };
        write_attr(&self.attr(channel, "period"), self.period_ns).map_err(fail)?;
        write_attr(&self.attr(channel, "enable"), 1).map_err(fail)?;
        Ok(())
    }

    fn bring_up(&self) -> Result<(), PwmError> {
        self.export(pins::PWM_PAN_CHANNEL)?;
        self.export(pins::PWM_TILT_CHANNEL)?;
        self.configure(pins::PWM_PAN_CHANNEL)?;
        self.configure(pins::PWM_TILT_CHANNEL)?;
        Ok(())
    }
}

fn write_attr(path: &Path, value: impl ToString) -> io::Result<()> {
    fs::write(path, value.to_string())
}

impl PwmPort for SysfsPwm {
    fn init(&mut self) -> Result<(), PwmError> {
        match self.bring_up() {
            Ok(()) => {
                self.mock_mode = false;
                info!(
                    "PWM initialized (sysfs {}) - channels {} (pan), {} (tilt)",
                    self.chip.display(),
                    pins::PWM_PAN_CHANNEL,
                    pins::PWM_TILT_CHANNEL
                );
            }
            Err(e @ PwmError::ExportFailed { .. }) => {
                warn!(
                    "{} - running in mock mode. Ensure dtoverlay=pwm-2chan is in /boot/config.txt",
                    e
                );
                self.mock_mode = true;
            }
            Err(e) => {
                warn!("{} - running in mock mode", e);
                self.mock_mode = true;
            }
        }
        if self.mock_mode {
            debug!(
                "PWM mock mode active - GPIO {} (pan), GPIO {} (tilt)",
                pins::PI_PAN_GPIO,
                pins::PI_TILT_GPIO
            );
        }
        Ok(())
    }

    fn set_pulse(&mut self, axis: Axis, pulse_us: u32) -> Result<(), PwmError> {
        if self.mock_mode {
            debug!("PWM (mock): {} = {} us", axis.name(), pulse_us);
            return Ok(());
        }
        let channel = Self::channel(axis);
        let duty_ns = pulse_us.saturating_mul(1_000);
        write_attr(&self.attr(channel, "duty_cycle"), duty_ns).map_err(|e| {
            warn!("Failed to set PWM duty cycle for channel {}: {}", channel, e);
            PwmError::WriteFailed { channel }
        })
    }

    fn cleanup(&mut self) {
        if self.mock_mode {
            debug!("PWM cleanup (mock mode)");
            return;
        }
        for channel in [pins::PWM_PAN_CHANNEL, pins::PWM_TILT_CHANNEL] {
            if let Err(e) = write_attr(&self.attr(channel, "enable"), 0) {
                warn!("PWM disable of channel {} failed: {}", channel, e);
            }
        }
        info!("PWM cleanup (sysfs)");
    }

    fn name(&self) -> &'static str {
        if self.mock_mode { "sysfs(mock)" } else { "sysfs" }
    }
}
