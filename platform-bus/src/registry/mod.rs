//! Protocol slot registry
//!
//! One slot per protocol. A slot is written at most once and then stays
//! immutable for the lifetime of the bus. Consumers that start before the
//! provider either probe (`get`) and fail fast, or block in `wait` until the
//! provider calls `set`.
//!
//! Waiting uses a single registry-wide monitor: every successful `set`
//! broadcasts on the condition variable and each waiter re-checks its own
//! slot. Sets are rare and monotonic, so the extra wakeups are harmless.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use pbus_api::error::{Error, Result};
use pbus_api::protocol::{
    CanvasProtocol, ClockProtocol, GpioProtocol, I2cImplProtocol, MailboxProtocol, ProtocolId,
    ProtocolImpl, ScpiProtocol, UsbModeSwitchProtocol,
};
use pbus_api::sync::{AtomicUsize, Once, Ordering};

/// Set-once storage cell for one protocol implementation
pub struct ProtocolSlot<T: ?Sized> {
    cell: Once<Arc<T>>,
    waiters: AtomicUsize,
}

impl<T: ?Sized> ProtocolSlot<T> {
    pub const fn new() -> Self {
        Self {
            cell: Once::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Stores `imp`. Fails with `AlreadySet` if the slot is populated, leaving it untouched.
    pub fn set(&self, imp: Arc<T>) -> Result<()> {
        let mut stored = false;
        self.cell.call_once(|| {
            stored = true;
            imp
        });
        if stored { Ok(()) } else { Err(Error::AlreadySet) }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_set(&self) -> bool {
        self.cell.is_completed()
    }

    /// Number of threads currently blocked waiting for this slot
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }
}

impl<T: ?Sized> Default for ProtocolSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of all protocol slots of a bus
pub struct ProtocolRegistry {
    clock: ProtocolSlot<dyn ClockProtocol>,
    gpio: ProtocolSlot<dyn GpioProtocol>,
    i2c: ProtocolSlot<dyn I2cImplProtocol>,
    canvas: ProtocolSlot<dyn CanvasProtocol>,
    mailbox: ProtocolSlot<dyn MailboxProtocol>,
    scpi: ProtocolSlot<dyn ScpiProtocol>,
    usb_mode_switch: ProtocolSlot<dyn UsbModeSwitchProtocol>,
    /// Number of successful sets; guards the condition variable
    generation: Mutex<u64>,
    published: Condvar,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            clock: ProtocolSlot::new(),
            gpio: ProtocolSlot::new(),
            i2c: ProtocolSlot::new(),
            canvas: ProtocolSlot::new(),
            mailbox: ProtocolSlot::new(),
            scpi: ProtocolSlot::new(),
            usb_mode_switch: ProtocolSlot::new(),
            generation: Mutex::new(0),
            published: Condvar::new(),
        }
    }

    /// Stores `imp` in its slot and wakes every waiter.
    pub fn set(&self, imp: ProtocolImpl) -> Result<()> {
        let id = imp.id();
        let res = match imp {
            ProtocolImpl::Clock(p) => self.clock.set(p),
            ProtocolImpl::Gpio(p) => self.gpio.set(p),
            ProtocolImpl::I2c(p) => self.i2c.set(p),
            ProtocolImpl::Canvas(p) => self.canvas.set(p),
            ProtocolImpl::Mailbox(p) => self.mailbox.set(p),
            ProtocolImpl::Scpi(p) => self.scpi.set(p),
            ProtocolImpl::UsbModeSwitch(p) => self.usb_mode_switch.set(p),
        };
        if let Err(e) = res {
            log::warn!("registry: {} protocol already registered", id);
            return Err(e);
        }

        // Publishing under the monitor closes the window between a waiter's
        // check and its wait.
        let mut generation = self.lock_generation();
        *generation += 1;
        self.published.notify_all();
        log::info!("registry: {} protocol registered", id);
        Ok(())
    }

    /// Blocks until the slot for `id` is populated.
    pub fn wait(&self, id: ProtocolId) -> Result<()> {
        if self.is_set(id) {
            return Ok(());
        }

        let waiters = self.waiter_counter(id);
        waiters.fetch_add(1, Ordering::AcqRel);
        log::debug!("registry: waiting for {} protocol", id);

        let mut generation = self.lock_generation();
        while !self.is_set(id) {
            generation = self
                .published
                .wait(generation)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(generation);

        waiters.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    /// Returns the implementation in slot `id`, or `NotAvailable`.
    pub fn get(&self, id: ProtocolId) -> Result<ProtocolImpl> {
        let imp = match id {
            ProtocolId::Clock => self.clock.get().map(ProtocolImpl::Clock),
            ProtocolId::Gpio => self.gpio.get().map(ProtocolImpl::Gpio),
            ProtocolId::I2c => self.i2c.get().map(ProtocolImpl::I2c),
            ProtocolId::Canvas => self.canvas.get().map(ProtocolImpl::Canvas),
            ProtocolId::Mailbox => self.mailbox.get().map(ProtocolImpl::Mailbox),
            ProtocolId::Scpi => self.scpi.get().map(ProtocolImpl::Scpi),
            ProtocolId::UsbModeSwitch => self.usb_mode_switch.get().map(ProtocolImpl::UsbModeSwitch),
        };
        imp.ok_or(Error::NotAvailable)
    }

    pub fn is_set(&self, id: ProtocolId) -> bool {
        match id {
            ProtocolId::Clock => self.clock.is_set(),
            ProtocolId::Gpio => self.gpio.is_set(),
            ProtocolId::I2c => self.i2c.is_set(),
            ProtocolId::Canvas => self.canvas.is_set(),
            ProtocolId::Mailbox => self.mailbox.is_set(),
            ProtocolId::Scpi => self.scpi.is_set(),
            ProtocolId::UsbModeSwitch => self.usb_mode_switch.is_set(),
        }
    }

    /// Number of threads blocked in `wait` for `id`
    pub fn waiter_count(&self, id: ProtocolId) -> usize {
        self.waiter_counter(id).load(Ordering::Acquire)
    }

    /// Number of protocols registered so far
    pub fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    pub fn clock(&self) -> Option<Arc<dyn ClockProtocol>> {
        self.clock.get()
    }

    pub fn gpio(&self) -> Option<Arc<dyn GpioProtocol>> {
        self.gpio.get()
    }

    pub fn i2c(&self) -> Option<Arc<dyn I2cImplProtocol>> {
        self.i2c.get()
    }

    pub fn canvas(&self) -> Option<Arc<dyn CanvasProtocol>> {
        self.canvas.get()
    }

    pub fn mailbox(&self) -> Option<Arc<dyn MailboxProtocol>> {
        self.mailbox.get()
    }

    pub fn scpi(&self) -> Option<Arc<dyn ScpiProtocol>> {
        self.scpi.get()
    }

    pub fn usb_mode_switch(&self) -> Option<Arc<dyn UsbModeSwitchProtocol>> {
        self.usb_mode_switch.get()
    }

    fn waiter_counter(&self, id: ProtocolId) -> &AtomicUsize {
        match id {
            ProtocolId::Clock => &self.clock.waiters,
            ProtocolId::Gpio => &self.gpio.waiters,
            ProtocolId::I2c => &self.i2c.waiters,
            ProtocolId::Canvas => &self.canvas.waiters,
            ProtocolId::Mailbox => &self.mailbox.waiters,
            ProtocolId::Scpi => &self.scpi.waiters,
            ProtocolId::UsbModeSwitch => &self.usb_mode_switch.waiters,
        }
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
