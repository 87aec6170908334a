//! Spinther Hardware Abstraction Layer
//!
//! This crate defines the traits that separate the Spinther peripheral
//! services from chip-specific register code. The core crate talks only
//! to these traits, which keeps the interrupt routing and PWM pooling
//! logic testable on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / board support            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  spinther-core, spinther-drivers        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  spinther-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  Vendor peripheral drivers (per chip)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`i2c::I2cBus`] - I2C bus operations
//! - [`expander::IoExpander`] - Register-based I/O expander chips
//! - [`pwm::PwmPlatform`] - PWM timer and channel hardware
//! - [`interrupt::InterruptPlatform`] - GPIO interrupt hardware

#![no_std]
#![deny(unsafe_code)]

pub mod expander;
pub mod gpio;
pub mod i2c;
pub mod interrupt;
pub mod pwm;

// Re-export key traits at crate root for convenience
pub use expander::IoExpander;
pub use gpio::{InputPin, Level, OutputPin};
pub use i2c::I2cBus;
pub use interrupt::{InterruptPlatform, PullConfig, Trigger};
pub use pwm::{ChannelConfig, PwmPlatform};
