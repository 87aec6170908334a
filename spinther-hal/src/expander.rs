//! I/O expander abstractions
//!
//! An I/O expander is an external chip (reached over I2C or SPI) that
//! adds a small bank of GPIO bits addressed by register writes instead
//! of native port registers. Drivers implement this trait so a bit on an
//! expander can be used the same way as a local pin.

/// Register-based I/O expander
///
/// Bit numbers are expander-local (0 to chip width - 1), not GPIO
/// numbers. All operations go over the expander's bus and can fail.
pub trait IoExpander {
    /// Error type for expander operations
    type Error;

    /// Configure the given bit as an output
    fn configure_as_output(&mut self, bit: u8) -> Result<(), Self::Error>;

    /// Configure the given bit as an input
    fn configure_as_input(&mut self, bit: u8) -> Result<(), Self::Error>;

    /// Drive an output bit high or low
    fn write_bit(&mut self, bit: u8, high: bool) -> Result<(), Self::Error>;

    /// Read the current level of a bit
    ///
    /// Works for both input and output bits.
    fn read_bit(&mut self, bit: u8) -> Result<bool, Self::Error>;
}
