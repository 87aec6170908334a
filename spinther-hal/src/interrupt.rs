//! GPIO interrupt hardware abstractions
//!
//! [`InterruptPlatform`] covers the vendor calls needed to arm a GPIO
//! interrupt: installing the shared interrupt service, configuring a
//! pin's trigger and pull resistors, and attaching the per-pin vector.
//! The routing and deferred dispatch logic lives in spinther-core.

/// Highest GPIO number plus one (GPIO0..GPIO48 on S3-class parts)
pub const GPIO_PIN_COUNT: usize = 49;

/// Interrupt trigger condition for a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Low-to-high transition
    #[default]
    RisingEdge,
    /// High-to-low transition
    FallingEdge,
    /// Any transition
    AnyEdge,
    /// Level held low
    LowLevel,
    /// Level held high
    HighLevel,
}

/// Pull resistor configuration for an interrupt pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PullConfig {
    /// Enable the internal pull-up
    pub pull_up: bool,
    /// Enable the internal pull-down
    pub pull_down: bool,
}

impl Default for PullConfig {
    /// Pull-down enabled, matching the expected idle-low wiring of
    /// rising-edge inputs
    fn default() -> Self {
        Self {
            pull_up: false,
            pull_down: true,
        }
    }
}

impl PullConfig {
    /// No pull resistors
    pub const NONE: Self = Self {
        pull_up: false,
        pull_down: false,
    };

    /// Pull-up only
    pub const UP: Self = Self {
        pull_up: true,
        pull_down: false,
    };

    /// Pull-down only
    pub const DOWN: Self = Self {
        pull_up: false,
        pull_down: true,
    };
}

/// GPIO interrupt hardware
///
/// Implementations map these calls onto the vendor interrupt driver.
/// Once a pin is attached, the vendor vector is expected to call into
/// the interrupt-context bridge with the pin number.
pub trait InterruptPlatform {
    /// Error type for configuration operations
    type Error: core::fmt::Debug;

    /// Install the shared GPIO interrupt service
    ///
    /// Called exactly once, before the first pin is attached.
    fn install_service(&mut self) -> Result<(), Self::Error>;

    /// Configure a pin's trigger condition and pull resistors
    ///
    /// The pin is configured as input/output so tests can raise events
    /// by driving the output side.
    fn configure_pin(&mut self, pin: u8, trigger: Trigger, pull: PullConfig)
        -> Result<(), Self::Error>;

    /// Attach the per-pin interrupt vector
    ///
    /// After this call the hardware may raise events for the pin at any
    /// time.
    fn attach_pin(&mut self, pin: u8) -> Result<(), Self::Error>;
}
