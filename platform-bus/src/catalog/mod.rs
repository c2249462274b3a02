//! Device catalog
//!
//! Insertion-ordered list of the platform devices added to the bus. Entries
//! are appended in a pending state while the device host creates the child
//! node, and become live once it succeeds. Pending entries are reachable
//! through their [`DeviceId`] (the driver bound to the new node may call back
//! before node creation returns) but never through identity or position
//! lookups.
//!
//! The catalog does not serialize adds by itself; the bus holds its host lock
//! across `insert_pending` .. `commit`/`rollback`, which keeps a pending entry
//! at the tail of the list.

use std::sync::Arc;

use bitflags::bitflags;
use pbus_api::core::descriptor::{DeviceDescriptor, ResourceCounts};
use pbus_api::core::types::{
    BtiDesc, ClockLine, DeviceIdentity, DeviceInfo, GpioLine, IrqLine, MmioRange, NodeId,
};
use pbus_api::error::{bad_state, Error, Result};
use pbus_api::sync::{AtomicBool, AtomicU64, Once, Ordering, RwLock};

bitflags! {
    /// Flags accepted by `DeviceAdd`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceAddFlags: u32 {
        /// Create the node hidden; `DeviceEnable` makes it visible
        const DISABLED = 0x1;
    }
}

/// Handle-safe reference to a catalog entry
///
/// `serial` is unique per add, so a reference to a rolled-back entry never
/// resolves to a device added later at the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    index: usize,
    serial: u64,
}

impl DeviceId {
    /// Position in the catalog
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Logical I2C channel resolved to a physical bus and address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct I2cChannelBinding {
    pub channel: u32,
    pub bus_id: u32,
    pub address: u16,
}

/// One child peripheral of the bus
#[derive(Debug)]
pub struct PlatformDevice {
    id: DeviceId,
    identity: DeviceIdentity,
    name: String,
    enabled: AtomicBool,
    node: Once<NodeId>,
    mmios: Vec<MmioRange>,
    irqs: Vec<IrqLine>,
    gpios: Vec<GpioLine>,
    i2c_channels: Vec<I2cChannelBinding>,
    clks: Vec<ClockLine>,
    btis: Vec<BtiDesc>,
    metadata_count: u32,
}

impl PlatformDevice {
    fn from_descriptor(id: DeviceId, desc: &DeviceDescriptor, enabled: bool) -> Self {
        let i2c_channels = desc
            .i2c_channels
            .iter()
            .enumerate()
            .map(|(channel, c)| I2cChannelBinding {
                channel: channel as u32,
                bus_id: c.bus_id,
                address: c.address,
            })
            .collect();

        Self {
            id,
            identity: desc.identity,
            name: desc.name.clone(),
            enabled: AtomicBool::new(enabled),
            node: Once::new(),
            mmios: desc.mmios.clone(),
            irqs: desc.irqs.clone(),
            gpios: desc.gpios.clone(),
            i2c_channels,
            clks: desc.clks.clone(),
            btis: desc.btis.clone(),
            metadata_count: desc.metadata.len() as u32,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Host node backing the device, once created
    pub fn node(&self) -> Option<NodeId> {
        self.node.get().copied()
    }

    pub(crate) fn set_node(&self, node: NodeId) {
        self.node.call_once(|| node);
    }

    pub fn mmio(&self, index: usize) -> Result<MmioRange> {
        self.mmios.get(index).copied().ok_or(Error::InvalidIndex)
    }

    pub fn irq(&self, index: usize) -> Result<IrqLine> {
        self.irqs.get(index).copied().ok_or(Error::InvalidIndex)
    }

    pub fn gpio(&self, index: usize) -> Result<GpioLine> {
        self.gpios.get(index).copied().ok_or(Error::InvalidIndex)
    }

    pub fn clk(&self, index: usize) -> Result<ClockLine> {
        self.clks.get(index).copied().ok_or(Error::InvalidIndex)
    }

    pub fn bti(&self, index: usize) -> Result<BtiDesc> {
        self.btis.get(index).copied().ok_or(Error::InvalidIndex)
    }

    /// Binding of logical I2C channel `channel`
    pub fn i2c_channel(&self, channel: u32) -> Result<I2cChannelBinding> {
        self.i2c_channels
            .get(channel as usize)
            .copied()
            .ok_or(Error::InvalidChannel)
    }

    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            mmio: self.mmios.len() as u32,
            irq: self.irqs.len() as u32,
            gpio: self.gpios.len() as u32,
            i2c_channel: self.i2c_channels.len() as u32,
            clk: self.clks.len() as u32,
            bti: self.btis.len() as u32,
            metadata: self.metadata_count,
        }
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            identity: self.identity,
            name: self.name.clone(),
            enabled: self.is_enabled(),
            counts: self.counts(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Live,
}

struct CatalogEntry {
    device: Arc<PlatformDevice>,
    state: EntryState,
}

/// Insertion-ordered collection of platform devices
pub struct DeviceCatalog {
    entries: RwLock<Vec<CatalogEntry>>,
    next_serial: AtomicU64,
    capacity: usize,
}

impl DeviceCatalog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_serial: AtomicU64::new(1),
            capacity,
        }
    }

    /// Appends a pending entry built from an already validated descriptor.
    pub(crate) fn insert_pending(&self, desc: &DeviceDescriptor, flags: DeviceAddFlags) -> Result<Arc<PlatformDevice>> {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            return Err(Error::ResourceExhausted);
        }
        if entries.last().is_some_and(|e| e.state == EntryState::Pending) {
            return Err(bad_state("another device add is in progress"));
        }

        let id = DeviceId {
            index: entries.len(),
            serial: self.next_serial.fetch_add(1, Ordering::Relaxed),
        };
        let enabled = !flags.contains(DeviceAddFlags::DISABLED);
        let device = Arc::new(PlatformDevice::from_descriptor(id, desc, enabled));
        entries.push(CatalogEntry {
            device: device.clone(),
            state: EntryState::Pending,
        });
        Ok(device)
    }

    /// Marks a pending entry live
    pub(crate) fn commit(&self, id: DeviceId) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.get_mut(id.index) {
            Some(entry) if entry.device.id == id && entry.state == EntryState::Pending => {
                entry.state = EntryState::Live;
                Ok(())
            }
            _ => Err(bad_state("no pending device to commit")),
        }
    }

    /// Removes a pending entry; it must be the last one
    pub(crate) fn rollback(&self, id: DeviceId) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.last() {
            Some(entry) if entry.device.id == id && entry.state == EntryState::Pending => {
                entries.pop();
                Ok(())
            }
            _ => Err(bad_state("no pending device to roll back")),
        }
    }

    /// Resolves a device reference, pending or live
    pub fn get(&self, id: DeviceId) -> Option<Arc<PlatformDevice>> {
        let entries = self.entries.read();
        entries
            .get(id.index)
            .filter(|e| e.device.id == id)
            .map(|e| e.device.clone())
    }

    /// First live device with `identity`, in insertion order
    pub fn find_first(&self, identity: DeviceIdentity) -> Option<Arc<PlatformDevice>> {
        let entries = self.entries.read();
        entries
            .iter()
            .find(|e| e.state == EntryState::Live && e.device.identity == identity)
            .map(|e| e.device.clone())
    }

    /// Every live device with `identity`, in insertion order
    pub fn find_all(&self, identity: DeviceIdentity) -> Vec<Arc<PlatformDevice>> {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|e| e.state == EntryState::Live && e.device.identity == identity)
            .map(|e| e.device.clone())
            .collect()
    }

    /// Live device at `position`
    pub fn at(&self, position: usize) -> Option<Arc<PlatformDevice>> {
        let entries = self.entries.read();
        entries
            .get(position)
            .filter(|e| e.state == EntryState::Live)
            .map(|e| e.device.clone())
    }

    /// Every live device, in insertion order
    pub fn live_devices(&self) -> Vec<Arc<PlatformDevice>> {
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|e| e.state == EntryState::Live)
            .map(|e| e.device.clone())
            .collect()
    }

    /// Number of live devices
    pub fn len(&self) -> usize {
        let entries = self.entries.read();
        entries.iter().filter(|e| e.state == EntryState::Live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
