//! Parameter types used by the protocol traits

use alloc::vec::Vec;
use bitflags::bitflags;

bitflags! {
    /// GPIO configuration flags. An empty set configures the line as input.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GpioFlags: u32 {
        /// Configure as output
        const OUT = 0x1;
        /// Enable the internal pull-down
        const PULL_DOWN = 0x2;
        /// Enable the internal pull-up
        const PULL_UP = 0x4;
        /// Disable pull resistors
        const NO_PULL = 0x8;
    }
}

bitflags! {
    /// Flags for interrupts obtained through a GPIO line
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterruptFlags: u32 {
        const EDGE_HIGH = 0x1;
        const EDGE_LOW = 0x2;
        const LEVEL_HIGH = 0x4;
        const LEVEL_LOW = 0x8;
        const EDGE_BOTH = Self::EDGE_HIGH.bits() | Self::EDGE_LOW.bits();
    }
}

/// GPIO interrupt polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioPolarity {
    Low,
    High,
}

/// Canvas layout description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasInfo {
    pub height: u32,
    pub stride_bytes: u32,
    pub wrap: u32,
    pub blkmode: u32,
    pub endianness: u32,
}

/// One operating point of a DVFS power domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingPoint {
    pub freq_hz: u32,
    pub volt_uv: u32,
}

/// DVFS table of a power domain
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DvfsInfo {
    pub opps: Vec<OperatingPoint>,
    pub latency_us: u32,
}

/// USB controller role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbMode {
    None,
    Host,
    Peripheral,
    Otg,
}

/// Mailbox command sent to a co-processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxCommand {
    /// Mailbox (channel) number
    pub mailbox: u32,
    /// Command word
    pub cmd: u32,
    /// Transmit payload
    pub tx: Vec<u8>,
    /// Expected response length in bytes
    pub rx_len: usize,
}
