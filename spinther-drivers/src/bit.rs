//! Named single-bit GPIO wrappers
//!
//! Board wiring is mostly individual bits with meanings: "pump enable",
//! "lid closed", "fault LED". Some sit on local pins, some on an I/O
//! expander. These wrappers attach a short diagnostic name to one bit
//! (the name only ever shows up in log output) and give expander bits
//! the same face as local ones, so application code does not care where
//! a bit physically lives.
//!
//! Expander-backed bits share one expander through a `RefCell`, and
//! their operations go over a bus that can fail. The infallible
//! pin-style methods log the failure and carry on - reads fall back to
//! low - while the `try_` variants report it to callers that care.

use core::cell::RefCell;

use heapless::String;

use spinther_hal::expander::IoExpander;
use spinther_hal::gpio::{InputPin, OutputPin};

/// Maximum length of a bit's diagnostic name
pub const BIT_NAME_LEN: usize = 16;

fn bit_name(name: &str) -> String<BIT_NAME_LEN> {
    let mut owned = String::new();
    let _ = owned.push_str(name);
    owned
}

/// A named output bit on a local pin
///
/// The pin must already be configured as an output by the chip HAL.
pub struct OutputBit<P: OutputPin> {
    pin: P,
    name: String<BIT_NAME_LEN>,
}

impl<P: OutputPin> OutputBit<P> {
    /// Wrap a pin with a diagnostic name
    pub fn new(pin: P, name: &str) -> Self {
        Self {
            pin,
            name: bit_name(name),
        }
    }

    /// Wrap a pin without a name
    pub fn unnamed(pin: P) -> Self {
        Self::new(pin, "")
    }

    /// Drive the bit high
    pub fn set_on(&mut self) {
        info!("output bit {} set HIGH", self.name.as_str());
        self.pin.set_high();
    }

    /// Drive the bit low
    pub fn set_off(&mut self) {
        info!("output bit {} set LOW", self.name.as_str());
        self.pin.set_low();
    }

    /// Drive the bit high or low
    pub fn set(&mut self, on: bool) {
        if on {
            self.set_on();
        } else {
            self.set_off();
        }
    }

    /// Level currently driven on the bit
    pub fn get(&self) -> bool {
        self.pin.is_set_high()
    }

    /// The bit's diagnostic name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl<P: OutputPin> OutputPin for OutputBit<P> {
    fn set_high(&mut self) {
        self.set_on();
    }

    fn set_low(&mut self) {
        self.set_off();
    }

    fn is_set_high(&self) -> bool {
        self.get()
    }
}

impl<P: OutputPin> embedded_hal::digital::ErrorType for OutputBit<P> {
    type Error = core::convert::Infallible;
}

impl<P: OutputPin> embedded_hal::digital::OutputPin for OutputBit<P> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_off();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_on();
        Ok(())
    }
}

/// A named input bit on a local pin
pub struct InputBit<P: InputPin> {
    pin: P,
    name: String<BIT_NAME_LEN>,
}

impl<P: InputPin> InputBit<P> {
    /// Wrap a pin with a diagnostic name
    pub fn new(pin: P, name: &str) -> Self {
        Self {
            pin,
            name: bit_name(name),
        }
    }

    /// Wrap a pin without a name
    pub fn unnamed(pin: P) -> Self {
        Self::new(pin, "")
    }

    /// Read the bit
    pub fn get(&self) -> bool {
        let high = self.pin.is_high();
        debug!("input bit {} reads {}", self.name.as_str(), high);
        high
    }

    /// The bit's diagnostic name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl<P: InputPin> InputPin for InputBit<P> {
    fn is_high(&self) -> bool {
        self.get()
    }
}

impl<P: InputPin> embedded_hal::digital::ErrorType for InputBit<P> {
    type Error = core::convert::Infallible;
}

impl<P: InputPin> embedded_hal::digital::InputPin for InputBit<P> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.get())
    }
}

/// A named output bit on a shared I/O expander
///
/// Configured as an output on construction. The expander is shared with
/// every other bit on the same chip, hence the `RefCell`; all bits of
/// one expander must live in the same execution context.
pub struct ExpanderOutputBit<'a, E: IoExpander> {
    expander: &'a RefCell<E>,
    bit: u8,
    name: String<BIT_NAME_LEN>,
}

impl<'a, E: IoExpander> ExpanderOutputBit<'a, E> {
    /// Configure `bit` as an output and wrap it
    pub fn new(expander: &'a RefCell<E>, bit: u8, name: &str) -> Result<Self, E::Error> {
        expander.borrow_mut().configure_as_output(bit)?;
        Ok(Self {
            expander,
            bit,
            name: bit_name(name),
        })
    }

    /// Drive the bit, reporting bus failures
    pub fn try_set(&self, on: bool) -> Result<(), E::Error> {
        self.expander.borrow_mut().write_bit(self.bit, on)
    }

    /// Read back the bit, reporting bus failures
    pub fn try_get(&self) -> Result<bool, E::Error> {
        self.expander.borrow_mut().read_bit(self.bit)
    }

    /// Drive the bit high
    pub fn set_on(&self) {
        info!("expander output bit {} set HIGH", self.name.as_str());
        if self.try_set(true).is_err() {
            error!("failed to set expander bit {}", self.bit);
        }
    }

    /// Drive the bit low
    pub fn set_off(&self) {
        info!("expander output bit {} set LOW", self.name.as_str());
        if self.try_set(false).is_err() {
            error!("failed to clear expander bit {}", self.bit);
        }
    }

    /// Drive the bit high or low
    pub fn set(&self, on: bool) {
        if on {
            self.set_on();
        } else {
            self.set_off();
        }
    }

    /// Level currently on the bit; reads as low if the bus fails
    pub fn get(&self) -> bool {
        match self.try_get() {
            Ok(high) => high,
            Err(_) => {
                error!("failed to read expander bit {}", self.bit);
                false
            }
        }
    }

    /// The bit's diagnostic name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl<'a, E: IoExpander> OutputPin for ExpanderOutputBit<'a, E> {
    fn set_high(&mut self) {
        self.set_on();
    }

    fn set_low(&mut self) {
        self.set_off();
    }

    fn is_set_high(&self) -> bool {
        self.get()
    }
}

/// A named input bit on a shared I/O expander
///
/// Configured as an input on construction.
pub struct ExpanderInputBit<'a, E: IoExpander> {
    expander: &'a RefCell<E>,
    bit: u8,
    name: String<BIT_NAME_LEN>,
}

impl<'a, E: IoExpander> ExpanderInputBit<'a, E> {
    /// Configure `bit` as an input and wrap it
    pub fn new(expander: &'a RefCell<E>, bit: u8, name: &str) -> Result<Self, E::Error> {
        expander.borrow_mut().configure_as_input(bit)?;
        Ok(Self {
            expander,
            bit,
            name: bit_name(name),
        })
    }

    /// Read the bit, reporting bus failures
    pub fn try_get(&self) -> Result<bool, E::Error> {
        self.expander.borrow_mut().read_bit(self.bit)
    }

    /// Read the bit; reads as low if the bus fails
    pub fn get(&self) -> bool {
        match self.try_get() {
            Ok(high) => {
                debug!("expander input bit {} reads {}", self.name.as_str(), high);
                high
            }
            Err(_) => {
                error!("failed to read expander bit {}", self.bit);
                false
            }
        }
    }

    /// The bit's diagnostic name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl<'a, E: IoExpander> InputPin for ExpanderInputBit<'a, E> {
    fn is_high(&self) -> bool {
        self.get()
    }
}
