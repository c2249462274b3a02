//! Device descriptors submitted to the platform bus
//!
//! A descriptor mirrors the boot-image representation of a device: every
//! resource collection travels with a declared count. The builder methods
//! keep the two in step; descriptors assembled from raw board tables can set
//! the declared counts explicitly and rely on [`DeviceDescriptor::validate`]
//! to catch disagreements before anything reaches the catalog.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::core::types::{
    BtiDesc, ClockLine, DeviceIdentity, GpioLine, I2cChannelDesc, IrqLine, MmioRange,
    DEVICE_NAME_MAX, I2C_ADDRESS_MAX,
};
use crate::error::{invalid_descriptor, Error, Result};

/// Per-collection resource counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    pub mmio: u32,
    pub irq: u32,
    pub gpio: u32,
    pub i2c_channel: u32,
    pub clk: u32,
    pub bti: u32,
    pub metadata: u32,
}

/// Where the bytes of a metadata record come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    /// Bytes supplied with the descriptor
    Inline(Vec<u8>),
    /// Boot-image metadata item with the record's type tag and this `extra` value
    Boot { extra: u32 },
}

/// Metadata record as declared in a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub type_tag: u32,
    pub source: MetadataSource,
}

/// Description of one child platform device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub identity: DeviceIdentity,
    pub mmios: Vec<MmioRange>,
    pub irqs: Vec<IrqLine>,
    pub gpios: Vec<GpioLine>,
    pub i2c_channels: Vec<I2cChannelDesc>,
    pub clks: Vec<ClockLine>,
    pub btis: Vec<BtiDesc>,
    pub metadata: Vec<DeviceMetadata>,
    /// Counts as declared by the producer of the descriptor
    pub declared: ResourceCounts,
}

impl DeviceDescriptor {
    /// Creates an empty descriptor
    pub fn new(name: &str, identity: DeviceIdentity) -> Self {
        Self {
            name: name.into(),
            identity,
            mmios: Vec::new(),
            irqs: Vec::new(),
            gpios: Vec::new(),
            i2c_channels: Vec::new(),
            clks: Vec::new(),
            btis: Vec::new(),
            metadata: Vec::new(),
            declared: ResourceCounts::default(),
        }
    }

    pub fn with_mmio(mut self, mmio: MmioRange) -> Self {
        self.mmios.push(mmio);
        self.declared.mmio += 1;
        self
    }

    pub fn with_irq(mut self, irq: IrqLine) -> Self {
        self.irqs.push(irq);
        self.declared.irq += 1;
        self
    }

    pub fn with_gpio(mut self, gpio: u32) -> Self {
        self.gpios.push(GpioLine { gpio });
        self.declared.gpio += 1;
        self
    }

    pub fn with_i2c_channel(mut self, channel: I2cChannelDesc) -> Self {
        self.i2c_channels.push(channel);
        self.declared.i2c_channel += 1;
        self
    }

    pub fn with_clk(mut self, clk: u32) -> Self {
        self.clks.push(ClockLine { clk });
        self.declared.clk += 1;
        self
    }

    pub fn with_bti(mut self, bti: BtiDesc) -> Self {
        self.btis.push(bti);
        self.declared.bti += 1;
        self
    }

    /// Attaches inline metadata bytes
    pub fn with_metadata(mut self, type_tag: u32, data: &[u8]) -> Self {
        self.metadata.push(DeviceMetadata {
            type_tag,
            source: MetadataSource::Inline(data.to_vec()),
        });
        self.declared.metadata += 1;
        self
    }

    /// Attaches a reference to a boot-image metadata item
    pub fn with_boot_metadata(mut self, type_tag: u32, extra: u32) -> Self {
        self.metadata.push(DeviceMetadata {
            type_tag,
            source: MetadataSource::Boot { extra },
        });
        self.declared.metadata += 1;
        self
    }

    /// Overrides the declared counts
    pub fn with_declared_counts(mut self, declared: ResourceCounts) -> Self {
        self.declared = declared;
        self
    }

    /// Counts derived from the collections themselves
    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            mmio: self.mmios.len() as u32,
            irq: self.irqs.len() as u32,
            gpio: self.gpios.len() as u32,
            i2c_channel: self.i2c_channels.len() as u32,
            clk: self.clks.len() as u32,
            bti: self.btis.len() as u32,
            metadata: self.metadata.len() as u32,
        }
    }

    /// Checks the descriptor for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(invalid_descriptor("empty device name"));
        }
        if self.name.len() > DEVICE_NAME_MAX {
            return Err(Error::InvalidDescriptor(format!(
                "device name \"{}\" longer than {} bytes",
                self.name, DEVICE_NAME_MAX
            )));
        }

        let actual = self.counts();
        let checks = [
            ("mmio", self.declared.mmio, actual.mmio),
            ("irq", self.declared.irq, actual.irq),
            ("gpio", self.declared.gpio, actual.gpio),
            ("i2c channel", self.declared.i2c_channel, actual.i2c_channel),
            ("clk", self.declared.clk, actual.clk),
            ("bti", self.declared.bti, actual.bti),
            ("metadata", self.declared.metadata, actual.metadata),
        ];
        for (what, declared, supplied) in checks {
            if declared != supplied {
                return Err(Error::InvalidDescriptor(format!(
                    "{} count {} does not match {} supplied entries",
                    what, declared, supplied
                )));
            }
        }

        for (i, mmio) in self.mmios.iter().enumerate() {
            if mmio.length == 0 {
                return Err(Error::InvalidDescriptor(format!("mmio {} has zero length", i)));
            }
            if mmio.base.checked_add(mmio.length).is_none() {
                return Err(Error::InvalidDescriptor(format!("mmio {} wraps the address space", i)));
            }
        }

        for (i, channel) in self.i2c_channels.iter().enumerate() {
            if channel.address > I2C_ADDRESS_MAX {
                return Err(Error::InvalidDescriptor(format!(
                    "i2c channel {} address {:#x} out of range",
                    i, channel.address
                )));
            }
        }

        Ok(())
    }
}
