//! Core types used throughout the platform bus

use core::fmt;
use alloc::string::String;
use alloc::vec::Vec;

use crate::core::descriptor::ResourceCounts;

/// Physical address type
pub type PhysAddr = u64;

/// Virtual address type
pub type VirtAddr = u64;

/// Page size used when mapping MMIO ranges
pub const PAGE_SIZE: u64 = 4096;

/// Maximum length of a device name in bytes
pub const DEVICE_NAME_MAX: usize = 31;

/// Largest valid I2C target address (10-bit addressing)
pub const I2C_ADDRESS_MAX: u16 = 0x3ff;

/// Identity triple of a platform device
///
/// Not unique: several devices may share an identity, e.g. two instances of
/// the same chip. The catalog disambiguates by insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIdentity {
    /// Vendor ID
    pub vid: u32,
    /// Product ID
    pub pid: u32,
    /// Device ID
    pub did: u32,
}

impl DeviceIdentity {
    pub const fn new(vid: u32, pid: u32, did: u32) -> Self {
        Self { vid, pid, did }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.vid, self.pid, self.did)
    }
}

/// Platform identity record read from the boot image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformId {
    /// Board vendor ID
    pub vid: u32,
    /// Board product ID
    pub pid: u32,
    /// Board name
    pub board_name: String,
}

impl PlatformId {
    pub fn new(vid: u32, pid: u32, board_name: &str) -> Self {
        Self { vid, pid, board_name: board_name.into() }
    }
}

/// Identifier of a child node created by the device host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Physical MMIO range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioRange {
    /// Physical base address
    pub base: PhysAddr,
    /// Length in bytes
    pub length: u64,
}

impl MmioRange {
    pub const fn new(base: PhysAddr, length: u64) -> Self {
        Self { base, length }
    }

    /// Page-aligned base of the range
    pub fn page_base(&self) -> PhysAddr {
        self.base & !(PAGE_SIZE - 1)
    }

    /// Offset of `base` within its first page
    pub fn page_offset(&self) -> u64 {
        self.base & (PAGE_SIZE - 1)
    }

    /// Length of the page-aligned span covering the range, or None on overflow
    pub fn page_span(&self) -> Option<u64> {
        let end = self.page_offset().checked_add(self.length)?;
        end.checked_add(PAGE_SIZE - 1).map(|v| v & !(PAGE_SIZE - 1))
    }
}

/// Interrupt trigger mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrqMode {
    /// Whatever the interrupt controller defaults to
    #[default]
    Default,
    EdgeLow,
    EdgeHigh,
    LevelLow,
    LevelHigh,
    EdgeBoth,
}

/// Interrupt line owned by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqLine {
    pub irq: u32,
    pub mode: IrqMode,
}

impl IrqLine {
    pub const fn new(irq: u32, mode: IrqMode) -> Self {
        Self { irq, mode }
    }
}

/// Global GPIO line referenced by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioLine {
    pub gpio: u32,
}

/// Global clock line referenced by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockLine {
    pub clk: u32,
}

/// Physical I2C binding of one logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct I2cChannelDesc {
    /// Physical bus number
    pub bus_id: u32,
    /// Target address on that bus
    pub address: u16,
}

impl I2cChannelDesc {
    pub const fn new(bus_id: u32, address: u16) -> Self {
        Self { bus_id, address }
    }
}

/// BTI declared by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtiDesc {
    pub iommu_index: u32,
    pub bti_id: u32,
}

impl BtiDesc {
    pub const fn new(iommu_index: u32, bti_id: u32) -> Self {
        Self { iommu_index, bti_id }
    }
}

/// Metadata record attached to a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Type tag
    pub type_tag: u32,
    /// Opaque payload
    pub data: Vec<u8>,
}

/// DMA bus transaction handle issued through an IOMMU
///
/// Caller-owned. Two handles for the same `(iommu_index, bti_id)` share a
/// scope but are distinct handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BtiHandle {
    iommu_index: u32,
    bti_id: u32,
    handle_id: u64,
}

impl BtiHandle {
    pub const fn new(iommu_index: u32, bti_id: u32, handle_id: u64) -> Self {
        Self { iommu_index, bti_id, handle_id }
    }

    pub fn iommu_index(&self) -> u32 {
        self.iommu_index
    }

    pub fn bti_id(&self) -> u32 {
        self.bti_id
    }

    pub fn handle_id(&self) -> u64 {
        self.handle_id
    }

    /// True if both handles address the same DMA scope
    pub fn same_scope(&self, other: &BtiHandle) -> bool {
        self.iommu_index == other.iommu_index && self.bti_id == other.bti_id
    }
}

/// Interrupt object handed to a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptHandle {
    pub irq: u32,
    pub mode: IrqMode,
    pub handle_id: u64,
}

/// Cache policy requested when mapping MMIO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    Cached,
    Uncached,
    #[default]
    UncachedDevice,
    WriteCombining,
}

/// Region mapped by the root resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    /// Virtual address of the first mapped page
    pub vaddr: VirtAddr,
    /// Handle keeping the mapping alive
    pub handle_id: u64,
}

/// MMIO mapping returned to a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioMapping {
    /// Virtual address of the first byte of the range
    pub vaddr: VirtAddr,
    /// Physical address of the first byte of the range
    pub paddr: PhysAddr,
    /// Size of the range in bytes
    pub size: u64,
    /// Handle keeping the mapping alive
    pub handle_id: u64,
}

/// Snapshot of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identity: DeviceIdentity,
    pub name: String,
    pub enabled: bool,
    pub counts: ResourceCounts,
}
