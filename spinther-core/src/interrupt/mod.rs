//! Deferred GPIO interrupt dispatch
//!
//! Interrupt handlers must not do real work: they run with interrupts
//! masked, on a tiny stack, and cannot block or allocate. This module
//! splits GPIO interrupt handling into three pieces:
//!
//! - a routing table mapping pin numbers to registered callbacks,
//!   written by [`GpioInterrupts::register`] and read from interrupt
//!   context
//! - [`GpioInterrupts::isr`], the interrupt-context bridge: one table
//!   lookup and a non-blocking enqueue of a fixed-size record into the
//!   hand-off queue, nothing else
//! - [`GpioInterrupts::run`], the single dispatch worker that blocks on
//!   the queue and invokes callbacks outside interrupt context
//!
//! The hand-off is deliberately best-effort: when the queue is full the
//! newest event is dropped and counted, never blocked on, because the
//! producer side runs in interrupt context and has no way to report an
//! error to anyone. Per pin, events that do fit are dispatched in the
//! order the hardware raised them.

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use spinther_hal::interrupt::{InterruptPlatform, PullConfig, Trigger, GPIO_PIN_COUNT};

/// Default capacity of the ISR-to-worker hand-off queue
pub const EVENT_QUEUE_DEPTH: usize = 10;

/// Callback invoked by the dispatch worker when its pin raises an
/// interrupt
///
/// Runs in the worker's context, not in interrupt context, so ordinary
/// code is fine - but it shares the one worker with every other pin, so
/// long blocking work here delays all pending dispatches.
pub type PinCallback = fn(u8);

/// Fixed-size record handed from interrupt context to the worker
///
/// Copied by value through the queue; it must stay meaningful after the
/// interrupt that produced it has returned.
#[derive(Debug, Clone, Copy)]
struct DispatchRecord {
    pin: u8,
    callback: PinCallback,
}

/// Errors from interrupt registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntrError<E> {
    /// Pin number outside the GPIO range
    InvalidPin,
    /// The platform rejected a configuration call
    Configuration(E),
}

struct RouterState<P> {
    platform: P,
    /// One entry per pin; `None` until the pin is registered. Indexed
    /// directly by pin number - the range is fixed by the hardware.
    routes: [Option<PinCallback>; GPIO_PIN_COUNT],
    /// One-way latch: set by the first registration, never cleared
    service_installed: bool,
    /// Events lost to a full hand-off queue
    dropped_events: u32,
}

/// GPIO interrupt router, bridge and dispatch worker
///
/// One instance owns the routing table, the hand-off queue and the
/// worker loop. `M` picks the lock guarding the table; it must be
/// `CriticalSectionRawMutex` (or equivalent) whenever [`Self::isr`] is
/// actually wired to an interrupt vector, so registration and
/// interrupt-context lookups cannot tear each other. Entries are also
/// always written *before* the pin's vector is armed.
///
/// Intended to live in a `static`, like the embassy channels it is
/// built from.
pub struct GpioInterrupts<M: RawMutex, P: InterruptPlatform, const DEPTH: usize = EVENT_QUEUE_DEPTH>
{
    state: Mutex<M, RefCell<RouterState<P>>>,
    events: Channel<M, DispatchRecord, DEPTH>,
    shutdown: Signal<M, ()>,
}

impl<M: RawMutex, P: InterruptPlatform, const DEPTH: usize> GpioInterrupts<M, P, DEPTH> {
    /// Create a router with an empty routing table
    pub const fn new(platform: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(RouterState {
                platform,
                routes: [None; GPIO_PIN_COUNT],
                service_installed: false,
                dropped_events: 0,
            })),
            events: Channel::new(),
            shutdown: Signal::new(),
        }
    }

    /// Register `callback` for interrupts on `pin`
    ///
    /// Installs the vendor interrupt service on the first call (a
    /// one-way transition; it is never uninstalled), configures the
    /// pin's trigger and pull resistors, routes the pin to `callback`
    /// and arms the pin's vector. Registering a pin again simply
    /// replaces its callback.
    pub fn register(
        &self,
        pin: u8,
        trigger: Trigger,
        pull: PullConfig,
        callback: PinCallback,
    ) -> Result<(), IntrError<P::Error>> {
        if usize::from(pin) >= GPIO_PIN_COUNT {
            return Err(IntrError::InvalidPin);
        }
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.service_installed {
                state
                    .platform
                    .install_service()
                    .map_err(IntrError::Configuration)?;
                state.service_installed = true;
            }
            state
                .platform
                .configure_pin(pin, trigger, pull)
                .map_err(IntrError::Configuration)?;
            // Route before arming: the vector must never fire for a pin
            // that has no table entry yet.
            state.routes[usize::from(pin)] = Some(callback);
            state
                .platform
                .attach_pin(pin)
                .map_err(IntrError::Configuration)?;
            debug!("interrupt registered for GPIO {}", pin);
            Ok(())
        })
    }

    /// Interrupt-context bridge
    ///
    /// Wire the vendor per-pin vector to this with the pin number.
    /// Bounded work only: a table lookup and a non-blocking enqueue.
    /// The registered callback is never invoked from here, and a full
    /// queue drops the event rather than waiting - interrupt context
    /// has nobody to report an error to, so the loss is only counted.
    pub fn isr(&self, pin: u8) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let callback = match state.routes.get(usize::from(pin)) {
                Some(Some(callback)) => *callback,
                // Armed vector without a route; nothing to dispatch.
                _ => return,
            };
            let record = DispatchRecord { pin, callback };
            if self.events.try_send(record).is_err() {
                state.dropped_events = state.dropped_events.wrapping_add(1);
            }
        });
    }

    /// Run the dispatch worker
    ///
    /// Blocks on the hand-off queue and invokes each record's callback
    /// with its pin number, in arrival order. Returns only after
    /// [`Self::request_shutdown`]; the firmware normally spawns this
    /// once and never stops it. Callbacks run on the worker's stack and
    /// should not block for long, or pending events from other pins sit
    /// in the queue behind them.
    pub async fn run(&self) {
        info!("GPIO dispatch worker running");
        loop {
            match select(self.events.receive(), self.shutdown.wait()).await {
                Either::First(record) => {
                    trace!("dispatching interrupt callback for GPIO {}", record.pin);
                    (record.callback)(record.pin);
                }
                Either::Second(()) => break,
            }
        }
        info!("GPIO dispatch worker stopped");
    }

    /// Dispatch at most one pending record without blocking
    ///
    /// Returns whether a record was dispatched. For polling executors;
    /// async firmware uses [`Self::run`] instead.
    pub fn poll_once(&self) -> bool {
        match self.events.try_receive() {
            Ok(record) => {
                (record.callback)(record.pin);
                true
            }
            Err(_) => false,
        }
    }

    /// Ask the dispatch worker to return
    pub fn request_shutdown(&self) {
        self.shutdown.signal(());
    }

    /// Number of events lost to a full hand-off queue
    pub fn dropped_events(&self) -> u32 {
        self.state.lock(|state| state.borrow().dropped_events)
    }

    /// Whether a callback is currently routed for `pin`
    pub fn is_registered(&self, pin: u8) -> bool {
        self.state.lock(|state| {
            state
                .borrow()
                .routes
                .get(usize::from(pin))
                .map(|entry| entry.is_some())
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::sync::atomic::{AtomicU32, Ordering};

    // Linked for its std critical-section implementation
    use critical_section as _;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct MockIntrError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum MockOp {
        Install,
        Configure(u8),
        Attach(u8),
    }

    /// Records the order of platform calls.
    #[derive(Default)]
    struct MockIntr {
        ops: Vec<MockOp, 16>,
        fail_configure: bool,
    }

    impl InterruptPlatform for MockIntr {
        type Error = MockIntrError;

        fn install_service(&mut self) -> Result<(), MockIntrError> {
            self.ops.push(MockOp::Install).unwrap();
            Ok(())
        }

        fn configure_pin(
            &mut self,
            pin: u8,
            _trigger: Trigger,
            _pull: PullConfig,
        ) -> Result<(), MockIntrError> {
            if self.fail_configure {
                return Err(MockIntrError);
            }
            self.ops.push(MockOp::Configure(pin)).unwrap();
            Ok(())
        }

        fn attach_pin(&mut self, pin: u8) -> Result<(), MockIntrError> {
            self.ops.push(MockOp::Attach(pin)).unwrap();
            Ok(())
        }
    }

    type TestRouter<const DEPTH: usize> = GpioInterrupts<CriticalSectionRawMutex, MockIntr, DEPTH>;

    fn ops<const DEPTH: usize>(router: &TestRouter<DEPTH>) -> Vec<MockOp, 16> {
        router
            .state
            .lock(|state| state.borrow().platform.ops.clone())
    }

    #[test]
    fn test_service_installed_once() {
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(MockIntr::default());

        router
            .register(4, Trigger::RisingEdge, PullConfig::default(), |_| {})
            .unwrap();
        router
            .register(5, Trigger::FallingEdge, PullConfig::NONE, |_| {})
            .unwrap();

        // Install exactly once, and each pin routed before it is armed
        assert_eq!(
            ops(&router).as_slice(),
            &[
                MockOp::Install,
                MockOp::Configure(4),
                MockOp::Attach(4),
                MockOp::Configure(5),
                MockOp::Attach(5),
            ]
        );
        assert!(router.is_registered(4));
        assert!(router.is_registered(5));
    }

    #[test]
    fn test_register_rejects_bad_pin() {
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(MockIntr::default());

        assert_eq!(
            router.register(
                GPIO_PIN_COUNT as u8,
                Trigger::RisingEdge,
                PullConfig::default(),
                |_| {},
            ),
            Err(IntrError::InvalidPin)
        );
        assert!(ops(&router).is_empty());
    }

    #[test]
    fn test_configure_failure_leaves_pin_unarmed() {
        let mut platform = MockIntr::default();
        platform.fail_configure = true;
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(platform);

        assert_eq!(
            router.register(4, Trigger::RisingEdge, PullConfig::default(), |_| {}),
            Err(IntrError::Configuration(MockIntrError))
        );
        assert!(!router.is_registered(4));
        assert_eq!(ops(&router).as_slice(), &[MockOp::Install]);
    }

    static ORDER_LOG: Mutex<CriticalSectionRawMutex, RefCell<Vec<u8, 16>>> =
        Mutex::new(RefCell::new(Vec::new()));

    fn order_callback(pin: u8) {
        ORDER_LOG.lock(|log| log.borrow_mut().push(pin).unwrap());
    }

    #[test]
    fn test_events_dispatch_in_raised_order() {
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(MockIntr::default());

        router
            .register(4, Trigger::RisingEdge, PullConfig::default(), order_callback)
            .unwrap();
        router
            .register(5, Trigger::RisingEdge, PullConfig::default(), order_callback)
            .unwrap();

        router.isr(4);
        router.isr(4);
        router.isr(4);
        router.isr(5);

        while router.poll_once() {}

        ORDER_LOG.lock(|log| {
            assert_eq!(log.borrow().as_slice(), &[4, 4, 4, 5]);
        });
        assert_eq!(router.dropped_events(), 0);
    }

    static OVERFLOW_HITS: AtomicU32 = AtomicU32::new(0);

    fn overflow_callback(_pin: u8) {
        OVERFLOW_HITS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        // Tiny queue: two records fit, the third is lost
        let router = TestRouter::<2>::new(MockIntr::default());

        router
            .register(3, Trigger::RisingEdge, PullConfig::default(), overflow_callback)
            .unwrap();

        router.isr(3);
        router.isr(3);
        router.isr(3);
        assert_eq!(router.dropped_events(), 1);

        let mut dispatched = 0;
        while router.poll_once() {
            dispatched += 1;
        }
        assert_eq!(dispatched, 2);
        assert_eq!(OVERFLOW_HITS.load(Ordering::Relaxed), 2);

        // The queue drained, so new events flow again
        router.isr(3);
        assert!(router.poll_once());
        assert_eq!(router.dropped_events(), 1);
    }

    static FIRST_HITS: AtomicU32 = AtomicU32::new(0);
    static SECOND_HITS: AtomicU32 = AtomicU32::new(0);

    fn first_callback(_pin: u8) {
        FIRST_HITS.fetch_add(1, Ordering::Relaxed);
    }

    fn second_callback(_pin: u8) {
        SECOND_HITS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_reregistration_replaces_callback() {
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(MockIntr::default());

        router
            .register(6, Trigger::RisingEdge, PullConfig::default(), first_callback)
            .unwrap();
        router
            .register(6, Trigger::RisingEdge, PullConfig::default(), second_callback)
            .unwrap();

        router.isr(6);
        while router.poll_once() {}

        assert_eq!(FIRST_HITS.load(Ordering::Relaxed), 0);
        assert_eq!(SECOND_HITS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unrouted_pin_is_ignored() {
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(MockIntr::default());

        router.isr(12);
        assert!(!router.poll_once());
        // Not an overflow: nothing was queued, nothing was dropped
        assert_eq!(router.dropped_events(), 0);
    }

    static WORKER_HITS: AtomicU32 = AtomicU32::new(0);

    fn worker_callback(_pin: u8) {
        WORKER_HITS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_worker_drains_then_observes_shutdown() {
        let router = TestRouter::<EVENT_QUEUE_DEPTH>::new(MockIntr::default());

        router
            .register(7, Trigger::AnyEdge, PullConfig::NONE, worker_callback)
            .unwrap();

        router.isr(7);
        router.isr(7);
        router.request_shutdown();

        // Pending records are dispatched before the shutdown signal is
        // looked at, then run() returns
        block_on(router.run());
        assert_eq!(WORKER_HITS.load(Ordering::Relaxed), 2);
    }
}
