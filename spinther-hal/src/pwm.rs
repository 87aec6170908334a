//! PWM hardware abstractions
//!
//! The PWM peripheral on ESP32-class chips is split into a small bank of
//! timers (each sets a frequency) and a bank of channels (each binds one
//! pin to a timer and sets a duty). Timers can be shared between
//! channels; channels cannot be shared. [`PwmPlatform`] is the trait the
//! pooling logic in spinther-core drives; implementations map it onto
//! the vendor timer/channel registers.

/// Number of hardware PWM timers
pub const PWM_TIMER_COUNT: usize = 4;

/// Number of hardware PWM channels
pub const PWM_CHANNEL_COUNT: usize = 8;

/// Duty resolution the timers are configured for (bits)
pub const DUTY_RESOLUTION_BITS: u32 = 12;

/// Maximum duty value at [`DUTY_RESOLUTION_BITS`] resolution
///
/// Duty is an integer in `0..=MAX_DUTY`, not a percentage.
pub const MAX_DUTY: u16 = 1 << DUTY_RESOLUTION_BITS;

/// Timer frequency used when the caller does not specify one
pub const DEFAULT_FREQUENCY_HZ: u32 = 1000;

/// Hardware binding of a PWM channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Channel index (0 to [`PWM_CHANNEL_COUNT`] - 1)
    pub channel: u8,
    /// GPIO pin the channel drives
    pub pin: u8,
    /// Timer index the channel takes its frequency from
    pub timer: u8,
    /// Duty value applied at configuration time
    pub initial_duty: u16,
}

/// PWM timer and channel hardware
///
/// Implementations handle the vendor register interface. Indices passed
/// in are always range-checked by the caller; implementations do not
/// need to validate them again.
pub trait PwmPlatform {
    /// Error type for configuration operations
    type Error: core::fmt::Debug;

    /// Configure a timer to run at the given frequency
    ///
    /// Called both to bring a fresh timer up and to change the frequency
    /// of a running one. Changing the frequency of a running timer
    /// proportionally rescales the duty of every channel bound to it;
    /// callers are responsible for restoring duty afterwards.
    fn configure_timer(&mut self, timer: u8, freq_hz: u32) -> Result<(), Self::Error>;

    /// Stop a timer's counter
    fn pause_timer(&mut self, timer: u8);

    /// Release a timer's hardware resources
    ///
    /// Called after [`PwmPlatform::pause_timer`] once no channel uses the
    /// timer any more.
    fn deconfigure_timer(&mut self, timer: u8);

    /// Bind a channel to a pin and timer
    ///
    /// Note: the vendor driver reserves the pin as a side effect of this
    /// call but never releases it; [`PwmPlatform::release_pin`] undoes
    /// the reservation on teardown.
    fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), Self::Error>;

    /// Set and latch a channel's duty value
    fn set_duty(&mut self, channel: u8, duty: u16) -> Result<(), Self::Error>;

    /// Release the pin reservation taken by [`PwmPlatform::configure_channel`]
    fn release_pin(&mut self, pin: u8);
}
