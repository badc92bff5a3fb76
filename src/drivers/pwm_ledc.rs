//! ESP32 LEDC servo backend.
//!
//! Both servos share LEDC timer 0 at the servo frame rate with 13-bit
//! resolution, so one period is 8192 duty counts:
//!
//! ```text
//! duty = pulse_us * (max_duty + 1) / period_us      // 1500 us -> 614
//! ```
//!
//! The backend only needs `embedded_hal::pwm::SetDutyCycle` per channel.
//! On the ESP32 those are esp-idf-hal `LedcDriver`s sharing one
//! `LedcTimerDriver`; host tests plug in fakes.

use embedded_hal::pwm::SetDutyCycle;
use log::{debug, info, warn};

use crate::app::ports::PwmPort;
use crate::error::PwmError;
use crate::pins;
use crate::servo::Axis;

/// Convert a pulse width into LEDC duty counts.
///
/// Saturates at `max_duty`; a zero period yields zero.
pub fn pulse_to_duty(pulse_us: u32, period_us: u32, max_duty: u16) -> u16 {
    if period_us == 0 {
        return 0;
    }
    let counts = u64::from(max_duty) + 1;
    let duty = u64::from(pulse_us) * counts / u64::from(period_us);
    duty.min(u64::from(max_duty)) as u16
}

/// Two LEDC channels driving the pan and tilt servos.
pub struct LedcPwm<C> {
    pan: C,
    tilt: C,
    period_us: u32,
}

impl<C: SetDutyCycle> LedcPwm<C> {
    /// Wrap two already-configured channels.
    pub fn new(pan: C, tilt: C, period_us: u32) -> Self {
        Self {
            pan,
            tilt,
            period_us,
        }
    }

    fn channel_mut(&mut self, axis: Axis) -> (&mut C, u8) {
        match axis {
            Axis::Pan => (&mut self.pan, pins::LEDC_CH_PAN as u8),
            Axis::Tilt => (&mut self.tilt, pins::LEDC_CH_TILT as u8),
        }
    }

    /// Duty count that `pulse_us` maps to on `axis`'s channel.
    pub fn duty_for(&self, pulse_us: u32, axis: Axis) -> u16 {
        let max = match axis {
            Axis::Pan => self.pan.max_duty_cycle(),
            Axis::Tilt => self.tilt.max_duty_cycle(),
        };
        pulse_to_duty(pulse_us, self.period_us, max)
    }
}

impl<C: SetDutyCycle + Send> PwmPort for LedcPwm<C> {
    fn init(&mut self) -> Result<(), PwmError> {
        for axis in Axis::ALL {
            let (ch, channel) = self.channel_mut(axis);
            ch.set_duty_cycle_fully_off().map_err(|e| {
                warn!("LEDC channel {} rejected initial duty: {:?}", channel, e);
                PwmError::ConfigureFailed { channel }
            })?;
        }
        info!(
            "PWM initialized (LEDC) - GPIO {} (pan), GPIO {} (tilt), {}-bit",
            pins::ESP32_PAN_GPIO,
            pins::ESP32_TILT_GPIO,
            pins::LEDC_DUTY_BITS
        );
        Ok(())
    }

    fn set_pulse(&mut self, axis: Axis, pulse_us: u32) -> Result<(), PwmError> {
        let duty = self.duty_for(pulse_us, axis);
        let (ch, channel) = self.channel_mut(axis);
        ch.set_duty_cycle(duty).map_err(|e| {
            warn!("LEDC duty write on channel {} failed: {:?}", channel, e);
            PwmError::WriteFailed { channel }
        })
    }

    fn cleanup(&mut self) {
        for axis in Axis::ALL {
            let (ch, channel) = self.channel_mut(axis);
            if let Err(e) = ch.set_duty_cycle_fully_off() {
                warn!("LEDC stop on channel {} failed: {:?}", channel, e);
            }
        }
        debug!("PWM cleanup (LEDC)");
    }

    fn name(&self) -> &'static str {
        "ledc"
    }
}

// ── ESP-IDF channel ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::ServoChannel;

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::Arc;

    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::ledc::config::TimerConfig;
    use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution, CHANNEL0, CHANNEL1, TIMER0};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::units::Hertz;
    use esp_idf_svc::sys::EspError;
    use log::info;

    use super::LedcPwm;
    use crate::error::PwmError;
    use crate::pins;

    type ServoTimer = LedcTimerDriver<'static, TIMER0>;

    /// One LEDC channel on the shared servo timer.
    ///
    /// Keeps the timer driver alive; dropping the last channel stops it.
    pub struct ServoChannel {
        driver: LedcDriver<'static>,
        _timer: Arc<ServoTimer>,
    }

    impl embedded_hal::pwm::ErrorType for ServoChannel {
        type Error = <LedcDriver<'static> as embedded_hal::pwm::ErrorType>::Error;
    }

    impl embedded_hal::pwm::SetDutyCycle for ServoChannel {
        fn max_duty_cycle(&self) -> u16 {
            self.driver.max_duty_cycle()
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.driver.set_duty_cycle(duty)
        }
    }

    fn init_failed(e: EspError) -> PwmError {
        PwmError::InitFailed(e.code())
    }

    impl LedcPwm<ServoChannel> {
        /// Timer 0 at `frequency_hz` with 13-bit resolution, channels 0/1 on
        /// the given pan and tilt pins.
        pub fn esp32(
            timer: TIMER0,
            pan_channel: CHANNEL0,
            tilt_channel: CHANNEL1,
            pan_pin: impl Peripheral<P = impl OutputPin> + 'static,
            tilt_pin: impl Peripheral<P = impl OutputPin> + 'static,
            frequency_hz: u32,
            period_us: u32,
        ) -> Result<Self, PwmError> {
            let config = TimerConfig::default()
                .frequency(Hertz(frequency_hz))
                .resolution(Resolution::Bits13);
            let timer = Arc::new(LedcTimerDriver::new(timer, &config).map_err(init_failed)?);

            let pan = ServoChannel {
                driver: LedcDriver::new(pan_channel, &*timer, pan_pin).map_err(init_failed)?,
                _timer: Arc::clone(&timer),
            };
            let tilt = ServoChannel {
                driver: LedcDriver::new(tilt_channel, &*timer, tilt_pin).map_err(init_failed)?,
                _timer: timer,
            };

            info!(
                "LEDC timer configured ({} Hz, {}-bit)",
                frequency_hz,
                pins::LEDC_DUTY_BITS
            );
            Ok(LedcPwm::new(pan, tilt, period_us))
        }
    }
}
