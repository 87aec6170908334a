//! Hardware driver implementations
//!
//! This crate provides the concrete pieces that sit next to the
//! spinther-core services:
//!
//! - PCA9557 I2C I/O expander (register-level driver)
//! - Named single-bit GPIO wrappers, backed by a local pin or by a bit
//!   on an expander

#![no_std]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod bit;
pub mod expander;
