//! PWM timer and channel pooling
//!
//! The hardware offers a few timers (frequency sources, shareable) and a
//! few channels (pin bindings, exclusive). [`PwmBank`] owns both pools
//! plus the platform handle and serializes every acquire/release/
//! configure behind one blocking mutex, so outputs can be constructed
//! and torn down from concurrent contexts without corrupting the
//! allocation tables.
//!
//! Timer ownership is expressed as a [`TimerLease`]: cloning a lease
//! adds a sharer, dropping one removes it, and the hardware timer is
//! paused and deconfigured exactly when the last lease goes away.
//!
//! Nothing here ever waits for a slot to become free; exhaustion is an
//! immediate error and retrying is the caller's business.

mod output;

pub use output::{PwmOutput, PwmOutputConfig};

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use spinther_hal::pwm::{ChannelConfig, PwmPlatform, PWM_CHANNEL_COUNT, PWM_TIMER_COUNT};

use crate::slots::{ExclusivePool, SharedPool, SlotError};

/// Errors from PWM resource management
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmError<E> {
    /// No free timer or channel slot
    ResourceExhausted,
    /// Requested index is outside the hardware range
    InvalidIndex,
    /// A slot was released that is not currently held
    DoubleRelease,
    /// The platform rejected a configuration call
    Configuration(E),
}

impl<E> From<SlotError> for PwmError<E> {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NoFreeSlot => PwmError::ResourceExhausted,
            SlotError::InvalidIndex => PwmError::InvalidIndex,
            SlotError::DoubleRelease => PwmError::DoubleRelease,
        }
    }
}

struct BankState<P> {
    platform: P,
    timers: SharedPool<PWM_TIMER_COUNT>,
    /// Frequency currently configured on each in-use timer
    frequencies: [u32; PWM_TIMER_COUNT],
    channels: ExclusivePool<PWM_CHANNEL_COUNT>,
}

/// Shared bank of PWM timers and channels
///
/// One instance exists per PWM peripheral. `M` picks the lock that
/// guards the allocation state; use `CriticalSectionRawMutex` when the
/// bank is reached from more than one execution context.
pub struct PwmBank<M: RawMutex, P: PwmPlatform> {
    state: Mutex<M, RefCell<BankState<P>>>,
}

impl<M: RawMutex, P: PwmPlatform> PwmBank<M, P> {
    /// Create a bank with every timer and channel free
    pub const fn new(platform: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(BankState {
                platform,
                timers: SharedPool::new(),
                frequencies: [0; PWM_TIMER_COUNT],
                channels: ExclusivePool::new(),
            })),
        }
    }

    /// Acquire a timer running at `freq_hz`
    ///
    /// With no preferred index this claims the lowest completely-free
    /// timer and configures it. With a preferred index that is already
    /// in use, the existing timer is shared instead: its reference
    /// count goes up and **the frequency already configured wins** -
    /// `freq_hz` is ignored on that path, because a timer's frequency
    /// is global to every output sharing it.
    pub fn acquire_timer(
        &self,
        preferred: Option<u8>,
        freq_hz: u32,
    ) -> Result<TimerLease<'_, M, P>, PwmError<P::Error>> {
        let index = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let index = state
                .timers
                .acquire(preferred.map(usize::from))
                .map_err(PwmError::from)?;
            if state.timers.ref_count(index) == 1 {
                // Fresh timer: bring the hardware up before anyone can
                // see the slot as allocated.
                if let Err(err) = state.platform.configure_timer(index as u8, freq_hz) {
                    let _ = state.timers.release(index);
                    return Err(PwmError::Configuration(err));
                }
                state.frequencies[index] = freq_hz;
                debug!("PWM timer {} configured at {} Hz", index as u8, freq_hz);
            } else {
                debug!(
                    "sharing PWM timer {}: keeping {} Hz, ignoring requested {} Hz",
                    index as u8,
                    state.frequencies[index],
                    freq_hz
                );
            }
            Ok(index as u8)
        })?;
        Ok(TimerLease { bank: self, index })
    }

    /// Acquire an exclusive channel, returning its index
    ///
    /// With no preferred index this claims the lowest free channel.
    pub fn acquire_channel(&self, preferred: Option<u8>) -> Result<u8, PwmError<P::Error>> {
        self.state.lock(|state| {
            let index = state
                .borrow_mut()
                .channels
                .acquire(preferred.map(usize::from))
                .map_err(PwmError::from)?;
            debug!("PWM channel {} acquired", index as u8);
            Ok(index as u8)
        })
    }

    /// Release a channel acquired with [`PwmBank::acquire_channel`]
    pub fn release_channel(&self, channel: u8) -> Result<(), PwmError<P::Error>> {
        self.state.lock(|state| {
            state
                .borrow_mut()
                .channels
                .release(usize::from(channel))
                .map_err(PwmError::from)?;
            debug!("PWM channel {} released", channel);
            Ok(())
        })
    }

    /// Reference count currently held on a timer (0 if free)
    pub fn timer_ref_count(&self, timer: u8) -> u8 {
        self.state
            .lock(|state| state.borrow().timers.ref_count(usize::from(timer)))
    }

    /// Frequency configured on a timer, or `None` if the timer is free
    pub fn timer_frequency_hz(&self, timer: u8) -> Option<u32> {
        self.state.lock(|state| {
            let state = state.borrow();
            let index = usize::from(timer);
            state.timers.in_use(index).then(|| state.frequencies[index])
        })
    }

    /// Number of timers currently in use
    pub fn timers_in_use(&self) -> usize {
        self.state.lock(|state| state.borrow().timers.used())
    }

    /// Number of channels currently in use
    pub fn channels_in_use(&self) -> usize {
        self.state.lock(|state| state.borrow().channels.used())
    }

    /// Run a closure against the underlying platform
    ///
    /// Escape hatch for vendor-specific calls that are not part of the
    /// [`PwmPlatform`] trait. Runs with the bank lock held; keep it
    /// short.
    pub fn with_platform<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut().platform))
    }

    /// Reconfigure a held timer to a new frequency
    fn set_timer_frequency(&self, timer: u8, freq_hz: u32) -> Result<(), PwmError<P::Error>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state
                .platform
                .configure_timer(timer, freq_hz)
                .map_err(PwmError::Configuration)?;
            state.frequencies[usize::from(timer)] = freq_hz;
            Ok(())
        })
    }

    /// Drop one timer reference; quiesce the hardware at zero
    fn release_timer(&self, timer: u8) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match state.timers.release(usize::from(timer)) {
                Ok(true) => {
                    state.platform.pause_timer(timer);
                    state.platform.deconfigure_timer(timer);
                    debug!("PWM timer {} released and deconfigured", timer);
                }
                Ok(false) => {
                    debug!(
                        "PWM timer {} still has {} sharer(s)",
                        timer,
                        state.timers.ref_count(usize::from(timer))
                    );
                }
                // A lease existed, so this cannot normally happen; it
                // would mean the pool state was corrupted elsewhere.
                Err(_) => error!("PWM timer {} released while not held", timer),
            }
        });
    }

    fn configure_channel(&self, config: &ChannelConfig) -> Result<(), P::Error> {
        self.state
            .lock(|state| state.borrow_mut().platform.configure_channel(config))
    }

    fn apply_duty(&self, channel: u8, duty: u16) -> Result<(), P::Error> {
        self.state
            .lock(|state| state.borrow_mut().platform.set_duty(channel, duty))
    }

    fn release_pin(&self, pin: u8) {
        self.state
            .lock(|state| state.borrow_mut().platform.release_pin(pin));
    }
}

/// Shared ownership of one configured hardware timer
///
/// Obtained from [`PwmBank::acquire_timer`]. Cloning via
/// [`TimerLease::try_clone`] adds a sharer; dropping removes one, and
/// the last drop pauses and deconfigures the hardware timer and frees
/// its index.
pub struct TimerLease<'a, M: RawMutex, P: PwmPlatform> {
    bank: &'a PwmBank<M, P>,
    index: u8,
}

impl<'a, M: RawMutex, P: PwmPlatform> TimerLease<'a, M, P> {
    /// Hardware index of the leased timer
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Frequency the timer is currently configured at
    pub fn frequency_hz(&self) -> u32 {
        self.bank.timer_frequency_hz(self.index).unwrap_or(0)
    }

    /// Change the timer's frequency
    ///
    /// The new frequency applies to every output sharing this timer,
    /// and the hardware proportionally rescales their duty as a side
    /// effect. Restoring duty is each output's own responsibility;
    /// [`PwmOutput::set_frequency`] does exactly that.
    pub fn set_frequency(&self, freq_hz: u32) -> Result<(), PwmError<P::Error>> {
        self.bank.set_timer_frequency(self.index, freq_hz)
    }

    /// Take an additional reference to the same timer
    ///
    /// Fails only when the sharer count would exceed the hardware
    /// limit.
    pub fn try_clone(&self) -> Result<Self, PwmError<P::Error>> {
        self.bank
            .state
            .lock(|state| {
                state
                    .borrow_mut()
                    .timers
                    .acquire(Some(usize::from(self.index)))
            })
            .map_err(PwmError::from)?;
        Ok(TimerLease {
            bank: self.bank,
            index: self.index,
        })
    }
}

impl<'a, M: RawMutex, P: PwmPlatform> Drop for TimerLease<'a, M, P> {
    fn drop(&mut self) {
        self.bank.release_timer(self.index);
    }
}
