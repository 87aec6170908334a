//! Board-agnostic peripheral services for Spinther
//!
//! This crate contains the two coordination-heavy pieces of the Spinther
//! stack, written against the traits in spinther-hal so they run the
//! same on hardware and in host tests:
//!
//! - Deferred GPIO interrupt dispatch: a pin-to-callback routing table,
//!   an interrupt-context bridge that hands events off through a bounded
//!   queue, and a single worker that invokes callbacks outside interrupt
//!   context
//! - PWM resource pooling: reference-counted sharing of the hardware
//!   timer bank and exclusive allocation of the channel bank, with
//!   frequency and duty management on top

#![no_std]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod interrupt;
pub mod pwm;
pub mod slots;
