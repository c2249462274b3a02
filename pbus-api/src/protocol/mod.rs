//! Protocol identifiers and registered implementations

pub mod interface;
pub mod types;

use core::fmt;
use alloc::sync::Arc;

pub use interface::*;
pub use types::*;

/// Protocol slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolId {
    Clock,
    Gpio,
    I2c,
    Canvas,
    Mailbox,
    Scpi,
    UsbModeSwitch,
}

impl ProtocolId {
    /// Every slot, in registry order
    pub const ALL: [ProtocolId; 7] = [
        ProtocolId::Clock,
        ProtocolId::Gpio,
        ProtocolId::I2c,
        ProtocolId::Canvas,
        ProtocolId::Mailbox,
        ProtocolId::Scpi,
        ProtocolId::UsbModeSwitch,
    ];

    /// Position of the slot in `ALL`
    pub const fn index(self) -> usize {
        match self {
            ProtocolId::Clock => 0,
            ProtocolId::Gpio => 1,
            ProtocolId::I2c => 2,
            ProtocolId::Canvas => 3,
            ProtocolId::Mailbox => 4,
            ProtocolId::Scpi => 5,
            ProtocolId::UsbModeSwitch => 6,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ProtocolId::Clock => "clock",
            ProtocolId::Gpio => "gpio",
            ProtocolId::I2c => "i2c",
            ProtocolId::Canvas => "canvas",
            ProtocolId::Mailbox => "mailbox",
            ProtocolId::Scpi => "scpi",
            ProtocolId::UsbModeSwitch => "usb-mode-switch",
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A protocol implementation, tagged by the slot it belongs to
#[derive(Clone)]
pub enum ProtocolImpl {
    Clock(Arc<dyn ClockProtocol>),
    Gpio(Arc<dyn GpioProtocol>),
    I2c(Arc<dyn I2cImplProtocol>),
    Canvas(Arc<dyn CanvasProtocol>),
    Mailbox(Arc<dyn MailboxProtocol>),
    Scpi(Arc<dyn ScpiProtocol>),
    UsbModeSwitch(Arc<dyn UsbModeSwitchProtocol>),
}

impl ProtocolImpl {
    /// Slot this implementation is stored in
    pub fn id(&self) -> ProtocolId {
        match self {
            ProtocolImpl::Clock(_) => ProtocolId::Clock,
            ProtocolImpl::Gpio(_) => ProtocolId::Gpio,
            ProtocolImpl::I2c(_) => ProtocolId::I2c,
            ProtocolImpl::Canvas(_) => ProtocolId::Canvas,
            ProtocolImpl::Mailbox(_) => ProtocolId::Mailbox,
            ProtocolImpl::Scpi(_) => ProtocolId::Scpi,
            ProtocolImpl::UsbModeSwitch(_) => ProtocolId::UsbModeSwitch,
        }
    }

    /// True if both values hold the very same implementation object
    pub fn same_impl(&self, other: &ProtocolImpl) -> bool {
        match (self, other) {
            (ProtocolImpl::Clock(a), ProtocolImpl::Clock(b)) => Arc::ptr_eq(a, b),
            (ProtocolImpl::Gpio(a), ProtocolImpl::Gpio(b)) => Arc::ptr_eq(a, b),
            (ProtocolImpl::I2c(a), ProtocolImpl::I2c(b)) => Arc::ptr_eq(a, b),
            (ProtocolImpl::Canvas(a), ProtocolImpl::Canvas(b)) => Arc::ptr_eq(a, b),
            (ProtocolImpl::Mailbox(a), ProtocolImpl::Mailbox(b)) => Arc::ptr_eq(a, b),
            (ProtocolImpl::Scpi(a), ProtocolImpl::Scpi(b)) => Arc::ptr_eq(a, b),
            (ProtocolImpl::UsbModeSwitch(a), ProtocolImpl::UsbModeSwitch(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ProtocolImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProtocolImpl").field(&self.id()).finish()
    }
}
