//! I/O expander drivers
//!
//! Register-level drivers for external chips that add GPIO bits over a
//! bus. Each driver implements [`spinther_hal::expander::IoExpander`]
//! so expander bits can stand in for local pins.

pub mod pca9557;

pub use pca9557::Pca9557;
