//! PWM output pins
//!
//! A [`PwmOutput`] ties one GPIO pin to an exclusively-owned channel
//! and a (possibly shared) timer, and tracks the duty value it wants on
//! the wire so frequency changes can put it back.

use embassy_sync::blocking_mutex::raw::RawMutex;

use spinther_hal::pwm::{ChannelConfig, PwmPlatform, DEFAULT_FREQUENCY_HZ, MAX_DUTY};

use super::{PwmBank, PwmError, TimerLease};

/// Resource selection for a new [`PwmOutput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmOutputConfig {
    /// Channel to use; `None` takes the lowest free one
    pub channel: Option<u8>,
    /// Timer to use; `None` takes a fresh one, a specific index shares
    /// with whoever already holds it
    pub timer: Option<u8>,
    /// Timer frequency. Ignored when joining an already-running timer -
    /// the frequency configured by the first owner stays.
    pub frequency_hz: u32,
}

impl Default for PwmOutputConfig {
    fn default() -> Self {
        Self {
            channel: None,
            timer: None,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
        }
    }
}

/// One pin driven with a PWM signal
///
/// Construction allocates a channel and a timer from the bank and binds
/// the channel to the pin at duty 0. Dropping the output returns the
/// channel, drops its timer reference (which quiesces the timer once no
/// other output shares it) and gives back the pin reservation the
/// platform took when the channel was bound.
pub struct PwmOutput<'a, M: RawMutex, P: PwmPlatform> {
    bank: &'a PwmBank<M, P>,
    timer: TimerLease<'a, M, P>,
    channel: u8,
    pin: u8,
    duty: u16,
}

impl<'a, M: RawMutex, P: PwmPlatform> PwmOutput<'a, M, P> {
    /// Create an output on `pin` with default resource selection
    pub fn new(bank: &'a PwmBank<M, P>, pin: u8) -> Result<Self, PwmError<P::Error>> {
        Self::with_config(bank, pin, PwmOutputConfig::default())
    }

    /// Create an output on `pin` with explicit resource selection
    ///
    /// If the channel binding fails after the slots were reserved, both
    /// slots are returned to the bank before the error is reported, so
    /// a failed construction never leaks a timer or channel.
    pub fn with_config(
        bank: &'a PwmBank<M, P>,
        pin: u8,
        config: PwmOutputConfig,
    ) -> Result<Self, PwmError<P::Error>> {
        let channel = bank.acquire_channel(config.channel)?;
        let timer = match bank.acquire_timer(config.timer, config.frequency_hz) {
            Ok(timer) => timer,
            Err(err) => {
                let _ = bank.release_channel(channel);
                return Err(err);
            }
        };

        let binding = ChannelConfig {
            channel,
            pin,
            timer: timer.index(),
            initial_duty: 0,
        };
        if let Err(err) = bank.configure_channel(&binding) {
            let _ = bank.release_channel(channel);
            // The timer lease returns its slot when it drops here.
            return Err(PwmError::Configuration(err));
        }

        info!(
            "PWM output on pin {} using channel {} and timer {}",
            pin,
            channel,
            timer.index()
        );
        Ok(Self {
            bank,
            timer,
            channel,
            pin,
            duty: 0,
        })
    }

    /// Set the duty cycle as a percentage (0.0 to 100.0)
    pub fn set_duty_percent(&mut self, percent: f32) -> Result<(), PwmError<P::Error>> {
        // Negative values saturate to 0 in the cast; values above 100%
        // run into the clamp in set_duty.
        let duty = (percent * MAX_DUTY as f32 / 100.0 + 0.5) as u16;
        self.set_duty(duty)
    }

    /// Set the duty cycle as a raw value (0 to [`MAX_DUTY`])
    ///
    /// Values above [`MAX_DUTY`] are clamped with a warning rather than
    /// rejected.
    pub fn set_duty(&mut self, duty: u16) -> Result<(), PwmError<P::Error>> {
        let duty = if duty > MAX_DUTY {
            warn!(
                "duty {} on pin {} exceeds maximum {}, clamping",
                duty, self.pin, MAX_DUTY
            );
            MAX_DUTY
        } else {
            duty
        };
        self.bank
            .apply_duty(self.channel, duty)
            .map_err(PwmError::Configuration)?;
        self.duty = duty;
        Ok(())
    }

    /// Change the frequency of this output's timer
    ///
    /// Every output sharing the timer is affected. The hardware rescales
    /// duty proportionally on a frequency change, so this output's
    /// stored duty is re-applied immediately afterwards; other outputs
    /// on the same timer must call [`PwmOutput::set_duty`] themselves to
    /// restore theirs.
    pub fn set_frequency(&mut self, freq_hz: u32) -> Result<(), PwmError<P::Error>> {
        self.timer.set_frequency(freq_hz)?;
        self.bank
            .apply_duty(self.channel, self.duty)
            .map_err(PwmError::Configuration)
    }

    /// Duty value currently stored for this output
    pub fn duty(&self) -> u16 {
        self.duty
    }

    /// Frequency of this output's timer
    pub fn frequency_hz(&self) -> u32 {
        self.timer.frequency_hz()
    }

    /// Channel index this output owns
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Timer index this output shares
    pub fn timer_index(&self) -> u8 {
        self.timer.index()
    }

    /// Pin this output drives
    pub fn pin(&self) -> u8 {
        self.pin
    }
}

impl<'a, M: RawMutex, P: PwmPlatform> Drop for PwmOutput<'a, M, P> {
    fn drop(&mut self) {
        if self.bank.release_channel(self.channel).is_err() {
            error!("PWM channel {} released while not held", self.channel);
        }
        // The platform reserved the pin when the channel was bound but
        // never releases it on its own.
        self.bank.release_pin(self.pin);
        // The timer lease field drops after this body, releasing the
        // shared timer reference.
    }
}
