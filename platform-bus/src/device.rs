//! Per-device handle
//!
//! The handle given to the device host for each node. It resolves
//! device-local resource indices through the device's descriptor and forwards
//! to the bus, the root resource or the registered protocols. Protocol
//! forwarding never blocks: a protocol that is not registered yet yields
//! `NotAvailable`.

use std::fmt;
use std::sync::Arc;

use pbus_api::core::types::{BtiHandle, CachePolicy, DeviceInfo, InterruptHandle, IrqMode, MmioMapping};
use pbus_api::error::{Error, Result};
use pbus_api::protocol::{
    CanvasInfo, DvfsInfo, GpioFlags, GpioPolarity, InterruptFlags, MailboxCommand, UsbMode,
};

use crate::bus::{Access, Bus};
use crate::catalog::{DeviceId, PlatformDevice};
use crate::i2c::{I2cPending, I2cResult};

/// Driver-facing view of one platform device
#[derive(Clone)]
pub struct PlatformDeviceHandle {
    bus: Bus,
    id: DeviceId,
}

static_assertions::assert_impl_all!(PlatformDeviceHandle: Send, Sync, Clone);

impl fmt::Debug for PlatformDeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDeviceHandle")
            .field("board", &self.bus.board_name())
            .field("id", &self.id)
            .finish()
    }
}

impl PlatformDeviceHandle {
    pub(crate) fn new(bus: Bus, id: DeviceId) -> Self {
        Self { bus, id }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// The bus the device lives on
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    fn device(&self) -> Result<Arc<PlatformDevice>> {
        self.bus.device(self.id)
    }

    pub fn device_info(&self) -> Result<DeviceInfo> {
        Ok(self.device()?.info())
    }

    /// Maps MMIO range `index`.
    ///
    /// The range is widened to whole pages for the root resource; the
    /// returned address points at the first byte of the range itself.
    pub fn map_mmio(&self, index: usize, cache_policy: CachePolicy) -> Result<MmioMapping> {
        let mmio = self.device()?.mmio(index)?;
        let span = mmio
            .page_span()
            .ok_or_else(|| Error::InvalidArgument(format!("mmio {} overflows", index)))?;
        let region = self
            .bus
            .root_resource()
            .map_physical(mmio.page_base(), span, cache_policy)?;
        log::debug!(
            "device {:?}: mapped mmio {} at {:#x} ({:#x} bytes, {:?})",
            self.id,
            index,
            mmio.base,
            mmio.length,
            cache_policy
        );
        Ok(MmioMapping {
            vaddr: region.vaddr + mmio.page_offset(),
            paddr: mmio.base,
            size: mmio.length,
            handle_id: region.handle_id,
        })
    }

    /// Creates the interrupt object for IRQ `index`.
    ///
    /// `mode` overrides the declared trigger mode when given.
    pub fn map_interrupt(&self, index: usize, mode: Option<IrqMode>) -> Result<InterruptHandle> {
        let irq = self.device()?.irq(index)?;
        self.bus
            .root_resource()
            .create_interrupt(irq.irq, mode.unwrap_or(irq.mode))
    }

    /// Mints a DMA handle for BTI `index` of the device.
    pub fn get_bti(&self, index: usize) -> Result<BtiHandle> {
        let bti = self.device()?.bti(index)?;
        self.bus.get_bti(bti.iommu_index, bti.bti_id)
    }

    pub fn get_metadata(&self, type_tag: u32) -> Result<Vec<u8>> {
        self.bus.get_metadata(self.id, type_tag)
    }

    // ---- i2c ----

    pub fn i2c_transact<F>(&self, channel: u32, write: &[u8], read_len: usize, completion: F)
    where
        F: FnOnce(I2cResult) + Send + 'static,
    {
        self.bus.transact(self.id, channel, write, read_len, completion);
    }

    /// Blocking convenience over [`PlatformDeviceHandle::i2c_transact`]
    pub fn i2c_transact_sync(&self, channel: u32, write: &[u8], read_len: usize) -> I2cResult {
        self.i2c_pending(channel, write, read_len).wait()
    }

    pub fn i2c_pending(&self, channel: u32, write: &[u8], read_len: usize) -> I2cPending {
        self.bus.transact_pending(self.id, channel, write, read_len)
    }

    pub fn i2c_max_transfer_size(&self, channel: u32) -> Result<usize> {
        self.bus.max_transfer_size(self.id, channel)
    }

    // ---- gpio ----

    fn gpio_line(&self, index: usize) -> Result<u32> {
        Ok(self.device()?.gpio(index)?.gpio)
    }

    pub fn gpio_config(&self, index: usize, flags: GpioFlags) -> Result<()> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.config(gpio, flags)
    }

    pub fn gpio_set_alt_function(&self, index: usize, function: u64) -> Result<()> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.set_alt_function(gpio, function)
    }

    pub fn gpio_read(&self, index: usize) -> Result<u8> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.read(gpio)
    }

    pub fn gpio_write(&self, index: usize, value: u8) -> Result<()> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.write(gpio, value)
    }

    pub fn gpio_get_interrupt(&self, index: usize, flags: InterruptFlags) -> Result<InterruptHandle> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.get_interrupt(gpio, flags)
    }

    pub fn gpio_release_interrupt(&self, index: usize) -> Result<()> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.release_interrupt(gpio)
    }

    pub fn gpio_set_polarity(&self, index: usize, polarity: GpioPolarity) -> Result<()> {
        let gpio = self.gpio_line(index)?;
        self.bus.gpio(Access::Probe)?.set_polarity(gpio, polarity)
    }

    // ---- clock ----

    pub fn clk_enable(&self, index: usize) -> Result<()> {
        let clk = self.device()?.clk(index)?.clk;
        self.bus.clock(Access::Probe)?.enable(clk)
    }

    pub fn clk_disable(&self, index: usize) -> Result<()> {
        let clk = self.device()?.clk(index)?.clk;
        self.bus.clock(Access::Probe)?.disable(clk)
    }

    // ---- canvas, mailbox, scpi, usb ----

    pub fn canvas_config(&self, vmo: u64, offset: usize, info: &CanvasInfo) -> Result<u8> {
        self.device()?;
        self.bus.canvas(Access::Probe)?.config(vmo, offset, info)
    }

    pub fn canvas_free(&self, canvas_idx: u8) -> Result<()> {
        self.device()?;
        self.bus.canvas(Access::Probe)?.free(canvas_idx)
    }

    pub fn mailbox_send_command(&self, command: &MailboxCommand) -> Result<Vec<u8>> {
        self.device()?;
        self.bus.mailbox(Access::Probe)?.send_command(command)
    }

    pub fn scpi_get_sensor(&self, name: &str) -> Result<u32> {
        self.device()?;
        self.bus.scpi(Access::Probe)?.get_sensor(name)
    }

    pub fn scpi_get_sensor_value(&self, sensor_id: u32) -> Result<u32> {
        self.device()?;
        self.bus.scpi(Access::Probe)?.get_sensor_value(sensor_id)
    }

    pub fn scpi_get_dvfs_info(&self, power_domain: u8) -> Result<DvfsInfo> {
        self.device()?;
        self.bus.scpi(Access::Probe)?.get_dvfs_info(power_domain)
    }

    pub fn scpi_get_dvfs_idx(&self, power_domain: u8) -> Result<u16> {
        self.device()?;
        self.bus.scpi(Access::Probe)?.get_dvfs_idx(power_domain)
    }

    /// Forwards the operating-point index verbatim to the SCPI implementation.
    pub fn scpi_set_dvfs_idx(&self, power_domain: u8, idx: u16) -> Result<()> {
        self.device()?;
        self.bus.scpi(Access::Probe)?.set_dvfs_idx(power_domain, idx)
    }

    pub fn set_usb_mode(&self, mode: UsbMode) -> Result<()> {
        self.device()?;
        self.bus.usb_mode_switch(Access::Probe)?.set_mode(mode)
    }
}
