//! Protocol traits implemented by board drivers
//!
//! The bus stores implementations of these traits in its protocol slots and
//! hands them back to consumers without interpreting them. Line numbers
//! passed here are global (board-wide); the per-device index translation
//! happens in the bus before a call reaches an implementation.

use alloc::vec::Vec;

use crate::core::types::InterruptHandle;
use crate::error::{Error, Result};
use crate::protocol::types::{
    CanvasInfo, DvfsInfo, GpioFlags, GpioPolarity, InterruptFlags, MailboxCommand, UsbMode,
};

/// Clock gate control
pub trait ClockProtocol: Send + Sync {
    /// Ungates a clock
    fn enable(&self, clk: u32) -> Result<()>;

    /// Gates a clock
    fn disable(&self, clk: u32) -> Result<()>;
}

/// GPIO controller
pub trait GpioProtocol: Send + Sync {
    /// Configures direction and pulls
    fn config(&self, gpio: u32, flags: GpioFlags) -> Result<()>;

    /// Reads the line level
    fn read(&self, gpio: u32) -> Result<u8>;

    /// Drives the line level
    fn write(&self, gpio: u32, value: u8) -> Result<()>;

    /// Selects a pin-mux function
    fn set_alt_function(&self, _gpio: u32, _function: u64) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Returns an interrupt object bound to the line
    fn get_interrupt(&self, _gpio: u32, _flags: InterruptFlags) -> Result<InterruptHandle> {
        Err(Error::NotSupported)
    }

    /// Releases the interrupt obtained with `get_interrupt`
    fn release_interrupt(&self, _gpio: u32) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Sets interrupt polarity
    fn set_polarity(&self, _gpio: u32, _polarity: GpioPolarity) -> Result<()> {
        Err(Error::NotSupported)
    }
}

/// Physical I2C transport
///
/// `transact` is called from the bus's per-bus worker thread and may block.
pub trait I2cImplProtocol: Send + Sync {
    /// Number of physical buses
    fn bus_count(&self) -> u32;

    /// Largest single transfer the bus accepts, in bytes
    fn max_transfer_size(&self, bus_id: u32) -> Result<usize>;

    /// Writes `write` to `address` and then reads `read_len` bytes back
    fn transact(&self, bus_id: u32, address: u16, write: &[u8], read_len: usize) -> Result<Vec<u8>>;
}

/// Display canvas allocator
pub trait CanvasProtocol: Send + Sync {
    /// Configures a canvas over `vmo` at `offset` and returns its index
    fn config(&self, vmo: u64, offset: usize, info: &CanvasInfo) -> Result<u8>;

    /// Releases a canvas index
    fn free(&self, canvas_idx: u8) -> Result<()>;
}

/// Co-processor mailbox
pub trait MailboxProtocol: Send + Sync {
    /// Sends a command and returns the response payload
    fn send_command(&self, command: &MailboxCommand) -> Result<Vec<u8>>;
}

/// System control and power interface
pub trait ScpiProtocol: Send + Sync {
    fn get_sensor(&self, name: &str) -> Result<u32>;

    fn get_sensor_value(&self, sensor_id: u32) -> Result<u32>;

    fn get_dvfs_info(&self, power_domain: u8) -> Result<DvfsInfo>;

    fn get_dvfs_idx(&self, power_domain: u8) -> Result<u16>;

    fn set_dvfs_idx(&self, power_domain: u8, idx: u16) -> Result<()>;
}

/// USB role switch
pub trait UsbModeSwitchProtocol: Send + Sync {
    fn set_mode(&self, mode: UsbMode) -> Result<()>;
}
