//! PCA9557 I2C I/O expander
//!
//! The PCA9557 is an 8-bit I/O expander controlled through four
//! registers over I2C (datasheet: <https://www.ti.com/lit/ds/symlink/pca9557.pdf>).
//! The same register map drives the TCA9534, which additionally has an
//! interrupt output this driver does not use.
//!
//! The chip's polarity-inversion feature is not exposed: the register
//! powers up with the odd value 0xF0 (upper nibble inverted), so the
//! constructor clears it and nothing ever sets it again.

use spinther_hal::expander::IoExpander;
use spinther_hal::i2c::I2cBus;

/// PCA9557 register addresses
pub mod reg {
    /// Input port (live pin levels)
    pub const INPUT: u8 = 0x00;
    /// Output port latches
    pub const OUTPUT: u8 = 0x01;
    /// Input polarity inversion
    pub const POLARITY: u8 = 0x02;
    /// Pin direction (1 = input, 0 = output)
    pub const CONFIG: u8 = 0x03;
}

/// Number of I/O bits on the chip
pub const BIT_COUNT: u8 = 8;

/// 7-bit I2C address with all three address pins tied low
pub const BASE_ADDRESS: u8 = 0x18;

/// PCA9557 driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pca9557Error<E> {
    /// Bit number outside 0..8
    InvalidBit,
    /// The underlying bus transfer failed
    Bus(E),
}

/// PCA9557 I/O expander on an I2C bus
pub struct Pca9557<B: I2cBus> {
    bus: B,
    address: u8,
}

impl<B: I2cBus> Pca9557<B> {
    /// Create the driver and initialize the chip
    ///
    /// Clears the polarity register so input reads are never inverted,
    /// whatever the power-on state was.
    pub fn new(bus: B, address: u8) -> Result<Self, Pca9557Error<B::Error>> {
        let mut expander = Self { bus, address };
        debug!("initializing PCA9557 at address {:#x}", address);
        expander.write_register(reg::POLARITY, 0x00)?;
        Ok(expander)
    }

    /// Create the driver at [`BASE_ADDRESS`]
    pub fn with_base_address(bus: B) -> Result<Self, Pca9557Error<B::Error>> {
        Self::new(bus, BASE_ADDRESS)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Pca9557Error<B::Error>> {
        let mut value = [0u8; 1];
        self.bus
            .write_read(self.address, &[register], &mut value)
            .map_err(Pca9557Error::Bus)?;
        Ok(value[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Pca9557Error<B::Error>> {
        self.bus
            .write(self.address, &[register, value])
            .map_err(Pca9557Error::Bus)
    }

    /// Read-modify-write one bit of a register
    fn update_register(
        &mut self,
        register: u8,
        mask: u8,
        set: bool,
    ) -> Result<(), Pca9557Error<B::Error>> {
        let current = self.read_register(register)?;
        let updated = if set { current | mask } else { current & !mask };
        self.write_register(register, updated)
    }

    fn bit_mask(bit: u8) -> Result<u8, Pca9557Error<B::Error>> {
        if bit >= BIT_COUNT {
            return Err(Pca9557Error::InvalidBit);
        }
        Ok(1 << bit)
    }
}

impl<B: I2cBus> IoExpander for Pca9557<B> {
    type Error = Pca9557Error<B::Error>;

    /// Clear the config bit: 0 means output
    fn configure_as_output(&mut self, bit: u8) -> Result<(), Self::Error> {
        let mask = Self::bit_mask(bit)?;
        debug!("PCA9557 bit {} configured as output", bit);
        self.update_register(reg::CONFIG, mask, false)
    }

    /// Set the config bit: 1 means input
    fn configure_as_input(&mut self, bit: u8) -> Result<(), Self::Error> {
        let mask = Self::bit_mask(bit)?;
        debug!("PCA9557 bit {} configured as input", bit);
        self.update_register(reg::CONFIG, mask, true)
    }

    fn write_bit(&mut self, bit: u8, high: bool) -> Result<(), Self::Error> {
        let mask = Self::bit_mask(bit)?;
        self.update_register(reg::OUTPUT, mask, high)
    }

    fn read_bit(&mut self, bit: u8) -> Result<bool, Self::Error> {
        let mask = Self::bit_mask(bit)?;
        let value = self.read_register(reg::INPUT)?;
        Ok(value & mask != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct MockBusError;

    /// I2C bus with an 8-bit register file behind it.
    #[derive(Default)]
    struct MockBus {
        registers: [u8; 4],
        writes: Vec<(u8, u8), 16>,
        fail: bool,
    }

    impl I2cBus for MockBus {
        type Error = MockBusError;

        fn write(&mut self, _address: u8, data: &[u8]) -> Result<(), MockBusError> {
            if self.fail {
                return Err(MockBusError);
            }
            let register = data[0];
            let value = data[1];
            self.registers[usize::from(register)] = value;
            self.writes.push((register, value)).unwrap();
            Ok(())
        }

        fn read(&mut self, _address: u8, _buf: &mut [u8]) -> Result<(), MockBusError> {
            unimplemented!("driver always uses write_read");
        }

        fn write_read(
            &mut self,
            _address: u8,
            write_data: &[u8],
            read_buf: &mut [u8],
        ) -> Result<(), MockBusError> {
            if self.fail {
                return Err(MockBusError);
            }
            read_buf[0] = self.registers[usize::from(write_data[0])];
            Ok(())
        }
    }

    fn powered_on_bus() -> MockBus {
        MockBus {
            // Hardware power-on defaults: inputs everywhere, polarity
            // inversion on the upper nibble
            registers: [0x00, 0x00, 0xF0, 0xFF],
            ..Default::default()
        }
    }

    #[test]
    fn test_new_clears_polarity() {
        let expander = Pca9557::with_base_address(powered_on_bus()).unwrap();
        assert_eq!(expander.bus.registers[usize::from(reg::POLARITY)], 0x00);
        assert_eq!(expander.bus.writes.as_slice(), &[(reg::POLARITY, 0x00)]);
    }

    #[test]
    fn test_configure_as_output_clears_config_bit() {
        let mut expander = Pca9557::with_base_address(powered_on_bus()).unwrap();

        expander.configure_as_output(3).unwrap();
        assert_eq!(expander.bus.registers[usize::from(reg::CONFIG)], 0xF7);

        // Other direction bits untouched by a second configuration
        expander.configure_as_output(0).unwrap();
        assert_eq!(expander.bus.registers[usize::from(reg::CONFIG)], 0xF6);

        expander.configure_as_input(3).unwrap();
        assert_eq!(expander.bus.registers[usize::from(reg::CONFIG)], 0xFE);
    }

    #[test]
    fn test_write_bit_preserves_others() {
        let mut expander = Pca9557::with_base_address(powered_on_bus()).unwrap();

        expander.write_bit(0, true).unwrap();
        expander.write_bit(5, true).unwrap();
        assert_eq!(expander.bus.registers[usize::from(reg::OUTPUT)], 0x21);

        expander.write_bit(0, false).unwrap();
        assert_eq!(expander.bus.registers[usize::from(reg::OUTPUT)], 0x20);
    }

    #[test]
    fn test_read_bit() {
        let mut bus = powered_on_bus();
        bus.registers[usize::from(reg::INPUT)] = 0b0100_0010;
        let mut expander = Pca9557::with_base_address(bus).unwrap();

        assert!(expander.read_bit(1).unwrap());
        assert!(expander.read_bit(6).unwrap());
        assert!(!expander.read_bit(0).unwrap());
    }

    #[test]
    fn test_invalid_bit_rejected() {
        let mut expander = Pca9557::with_base_address(powered_on_bus()).unwrap();

        assert_eq!(
            expander.configure_as_output(8),
            Err(Pca9557Error::InvalidBit)
        );
        assert_eq!(expander.write_bit(8, true), Err(Pca9557Error::InvalidBit));
        assert_eq!(expander.read_bit(8), Err(Pca9557Error::InvalidBit));
    }

    #[test]
    fn test_bus_errors_propagate() {
        let mut expander = Pca9557::with_base_address(powered_on_bus()).unwrap();
        expander.bus.fail = true;

        assert_eq!(
            expander.write_bit(1, true),
            Err(Pca9557Error::Bus(MockBusError))
        );
        assert_eq!(expander.read_bit(1), Err(Pca9557Error::Bus(MockBusError)));
    }
}
