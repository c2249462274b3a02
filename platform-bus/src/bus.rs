//! Bus facade
//!
//! [`Bus`] is the single entry point of the platform bus. It is built once
//! per board from a boot image, owns every other component, and is cloned
//! into each [`PlatformDeviceHandle`] handed to the device host.
//!
//! # Lifecycle
//!
//! 1. [`Bus::builder`] reads the platform identity and metadata from the boot
//!    image.
//! 2. Board drivers register protocols with [`Bus::set_protocol`]; consumers
//!    probe or wait for them.
//! 3. Devices are added with [`Bus::device_add`] and toggled with
//!    [`Bus::device_enable`].
//! 4. [`Bus::teardown`] stops the I2C workers and releases every node. The
//!    host is expected to drop the handles it holds when a node is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pbus_api::boot::BootImage;
use pbus_api::core::descriptor::DeviceDescriptor;
use pbus_api::core::types::{BtiHandle, DeviceIdentity, DeviceInfo, PlatformId};
use pbus_api::error::{bad_state, not_found, Error, ErrorContext, Result};
use pbus_api::protocol::{
    CanvasProtocol, ClockProtocol, GpioProtocol, I2cImplProtocol, MailboxProtocol, ProtocolId,
    ProtocolImpl, ScpiProtocol, UsbModeSwitchProtocol,
};
use pbus_api::resource::{Iommu, RootResource};
use pbus_api::sync::{AtomicBool, Once, Ordering};

use crate::catalog::{DeviceAddFlags, DeviceCatalog, DeviceId, PlatformDevice};
use crate::config::BusConfig;
use crate::device::PlatformDeviceHandle;
use crate::host::{self, DeviceHost};
use crate::i2c::{I2cCoordinator, I2cPending, I2cResult};
use crate::iommu::{BtiBroker, DummyIommu};
use crate::metadata::MetadataStore;
use crate::registry::ProtocolRegistry;

/// How a protocol accessor behaves when the slot is still empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    /// Fail with `NotAvailable`
    #[default]
    Probe,
    /// Block until a provider registers the protocol
    Wait,
}

struct BusInner {
    config: BusConfig,
    platform_id: PlatformId,
    registry: ProtocolRegistry,
    broker: BtiBroker,
    catalog: DeviceCatalog,
    metadata: MetadataStore,
    i2c: Once<I2cCoordinator>,
    /// Serializes I2C registration with coordinator start-up
    i2c_init: Mutex<()>,
    host: Arc<dyn DeviceHost>,
    resource: Arc<dyn RootResource>,
    /// Held across node creation
    add_lock: Mutex<()>,
    /// Held across visibility changes
    enable_lock: Mutex<()>,
    torn_down: AtomicBool,
}

/// Builder for [`Bus`]
pub struct BusBuilder {
    host: Arc<dyn DeviceHost>,
    resource: Arc<dyn RootResource>,
    config: BusConfig,
    iommus: Vec<Arc<dyn Iommu>>,
}

impl BusBuilder {
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an IOMMU context. Without one the bus uses a [`DummyIommu`].
    pub fn iommu(mut self, iommu: Arc<dyn Iommu>) -> Self {
        self.iommus.push(iommu);
        self
    }

    /// Reads the boot image and creates the bus.
    pub fn build(self, boot: &dyn BootImage) -> Result<Bus> {
        self.config.validate()?;

        let platform_id = boot.read_identity()?;
        let blob = boot.read_metadata_blob()?;
        let items = boot.read_metadata_items()?;

        let mut iommus = self.iommus;
        if iommus.is_empty() {
            log::debug!("bus: no IOMMU supplied, using dummy IOMMU");
            iommus.push(Arc::new(DummyIommu::new(self.config.bti_capacity)));
        }

        log::info!(
            "bus: board '{}' (vid {:#x}, pid {:#x}), {} metadata bytes, {} item(s)",
            platform_id.board_name,
            platform_id.vid,
            platform_id.pid,
            blob.len(),
            items.len()
        );

        let catalog = DeviceCatalog::new(self.config.max_devices);
        Ok(Bus {
            inner: Arc::new(BusInner {
                platform_id,
                registry: ProtocolRegistry::new(),
                broker: BtiBroker::new(iommus),
                catalog,
                metadata: MetadataStore::new(blob, items),
                i2c: Once::new(),
                i2c_init: Mutex::new(()),
                host: self.host,
                resource: self.resource,
                add_lock: Mutex::new(()),
                enable_lock: Mutex::new(()),
                torn_down: AtomicBool::new(false),
                config: self.config,
            }),
        })
    }
}

/// The platform bus
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

static_assertions::assert_impl_all!(Bus: Send, Sync, Clone);

impl Bus {
    pub fn builder(host: Arc<dyn DeviceHost>, resource: Arc<dyn RootResource>) -> BusBuilder {
        BusBuilder {
            host,
            resource,
            config: BusConfig::default(),
            iommus: Vec::new(),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    pub fn board_name(&self) -> &str {
        &self.inner.platform_id.board_name
    }

    pub fn platform_id(&self) -> &PlatformId {
        &self.inner.platform_id
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::Acquire)
    }

    // ---- protocols ----

    /// Registers a protocol implementation.
    ///
    /// Registering the I2C transport also starts the I2C coordinator; the
    /// slot only becomes visible once the workers are running.
    pub fn set_protocol(&self, imp: ProtocolImpl) -> Result<()> {
        self.ensure_running()?;
        match imp {
            ProtocolImpl::I2c(transport) => self.register_i2c(transport),
            other => self.inner.registry.set(other),
        }
    }

    fn register_i2c(&self, transport: Arc<dyn I2cImplProtocol>) -> Result<()> {
        let _guard = lock(&self.inner.i2c_init);
        if self.inner.registry.is_set(ProtocolId::I2c) {
            log::warn!("bus: i2c protocol already registered");
            return Err(Error::AlreadySet);
        }
        let coordinator = I2cCoordinator::start(transport.clone(), &self.inner.config.i2c_thread_prefix)?;
        self.inner.i2c.call_once(|| coordinator);
        self.inner.registry.set(ProtocolImpl::I2c(transport))
    }

    /// Blocks until protocol `id` is registered and returns it.
    pub fn wait_protocol(&self, id: ProtocolId) -> Result<ProtocolImpl> {
        self.inner.registry.wait(id)?;
        self.inner.registry.get(id)
    }

    /// Returns protocol `id` or `NotAvailable`.
    pub fn get_protocol(&self, id: ProtocolId) -> Result<ProtocolImpl> {
        self.inner.registry.get(id)
    }

    /// Number of threads blocked waiting for protocol `id`
    pub fn protocol_waiters(&self, id: ProtocolId) -> usize {
        self.inner.registry.waiter_count(id)
    }

    pub fn clock(&self, access: Access) -> Result<Arc<dyn ClockProtocol>> {
        self.ready(ProtocolId::Clock, access)?;
        self.inner.registry.clock().ok_or(Error::NotAvailable)
    }

    pub fn gpio(&self, access: Access) -> Result<Arc<dyn GpioProtocol>> {
        self.ready(ProtocolId::Gpio, access)?;
        self.inner.registry.gpio().ok_or(Error::NotAvailable)
    }

    pub fn i2c(&self, access: Access) -> Result<Arc<dyn I2cImplProtocol>> {
        self.ready(ProtocolId::I2c, access)?;
        self.inner.registry.i2c().ok_or(Error::NotAvailable)
    }

    pub fn canvas(&self, access: Access) -> Result<Arc<dyn CanvasProtocol>> {
        self.ready(ProtocolId::Canvas, access)?;
        self.inner.registry.canvas().ok_or(Error::NotAvailable)
    }

    pub fn mailbox(&self, access: Access) -> Result<Arc<dyn MailboxProtocol>> {
        self.ready(ProtocolId::Mailbox, access)?;
        self.inner.registry.mailbox().ok_or(Error::NotAvailable)
    }

    pub fn scpi(&self, access: Access) -> Result<Arc<dyn ScpiProtocol>> {
        self.ready(ProtocolId::Scpi, access)?;
        self.inner.registry.scpi().ok_or(Error::NotAvailable)
    }

    pub fn usb_mode_switch(&self, access: Access) -> Result<Arc<dyn UsbModeSwitchProtocol>> {
        self.ready(ProtocolId::UsbModeSwitch, access)?;
        self.inner.registry.usb_mode_switch().ok_or(Error::NotAvailable)
    }

    fn ready(&self, id: ProtocolId, access: Access) -> Result<()> {
        match access {
            Access::Probe => Ok(()),
            Access::Wait => self.inner.registry.wait(id),
        }
    }

    // ---- devices ----

    /// Adds a platform device and asks the host to create its node.
    ///
    /// If the host refuses, the catalog entry and its metadata are removed
    /// again and `HostRejected` is returned.
    pub fn device_add(&self, desc: &DeviceDescriptor, flags: DeviceAddFlags) -> Result<DeviceId> {
        self.ensure_running()?;
        desc.validate().context(&desc.name)?;
        let records = self.inner.metadata.resolve(&desc.metadata).context(&desc.name)?;

        let _guard = lock(&self.inner.add_lock);
        self.ensure_running()?;

        let device = self.inner.catalog.insert_pending(desc, flags)?;
        let id = device.id();
        self.inner.metadata.attach(id, records);

        let handle = PlatformDeviceHandle::new(self.clone(), id);
        match self.inner.host.create_child_node(&desc.name, handle, device.is_enabled()) {
            Ok(node) => {
                device.set_node(node);
                self.inner.catalog.commit(id)?;
                log::info!(
                    "bus: added device '{}' ({}) at position {}{}",
                    desc.name,
                    desc.identity,
                    id.index(),
                    if device.is_enabled() { "" } else { ", disabled" }
                );
                Ok(id)
            }
            Err(e) => {
                let err = host::rejected(e);
                self.inner.metadata.detach(id);
                self.inner.catalog.rollback(id)?;
                log::warn!("bus: host rejected device '{}' ({}): {}", desc.name, desc.identity, err);
                Err(err)
            }
        }
    }

    /// Enables or disables the first live device matching the identity.
    ///
    /// Every call forwards the requested visibility to the host, whether or
    /// not the flag changes. On host failure the flag keeps its value.
    pub fn device_enable(&self, vid: u32, pid: u32, did: u32, enable: bool) -> Result<()> {
        self.ensure_running()?;
        let identity = DeviceIdentity::new(vid, pid, did);

        let _guard = lock(&self.inner.enable_lock);
        self.ensure_running()?;
        let device = self
            .inner
            .catalog
            .find_first(identity)
            .ok_or_else(|| Error::NotFound(format!("device {}", identity)))?;
        let node = device
            .node()
            .ok_or_else(|| bad_state("device has no host node"))?;

        self.inner
            .host
            .set_child_visibility(node, enable)
            .map_err(host::rejected)
            .inspect_err(|e| log::warn!("bus: visibility change of '{}' failed: {}", device.name(), e))?;
        device.set_enabled(enable);
        log::info!(
            "bus: device '{}' ({}) {}",
            device.name(),
            identity,
            if enable { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Number of live devices
    pub fn device_count(&self) -> usize {
        self.inner.catalog.len()
    }

    /// Snapshot of the live device at `position`
    pub fn device_at(&self, position: usize) -> Option<DeviceInfo> {
        self.inner.catalog.at(position).map(|d| d.info())
    }

    /// Ids of every live device with the identity, in insertion order
    pub fn find_devices(&self, vid: u32, pid: u32, did: u32) -> Vec<DeviceId> {
        self.inner
            .catalog
            .find_all(DeviceIdentity::new(vid, pid, did))
            .iter()
            .map(|d| d.id())
            .collect()
    }

    /// Handle for a device previously returned by `device_add`
    pub fn device_handle(&self, id: DeviceId) -> Result<PlatformDeviceHandle> {
        self.device(id)?;
        Ok(PlatformDeviceHandle::new(self.clone(), id))
    }

    pub(crate) fn device(&self, id: DeviceId) -> Result<Arc<PlatformDevice>> {
        self.ensure_running()?;
        self.inner
            .catalog
            .get(id)
            .ok_or_else(|| bad_state("device no longer exists"))
    }

    pub(crate) fn root_resource(&self) -> &Arc<dyn RootResource> {
        &self.inner.resource
    }

    // ---- resources ----

    /// Mints a DMA handle for `bti_id` through IOMMU `iommu_index`.
    pub fn get_bti(&self, iommu_index: u32, bti_id: u32) -> Result<BtiHandle> {
        self.inner.broker.get_bti(iommu_index, bti_id)
    }

    /// First metadata record of `type_tag` attached to the device
    pub fn get_metadata(&self, id: DeviceId, type_tag: u32) -> Result<Vec<u8>> {
        self.device(id)?;
        self.inner.metadata.get(id, type_tag)
    }

    /// Raw boot metadata blob
    pub fn metadata_blob(&self) -> &[u8] {
        self.inner.metadata.raw_blob()
    }

    /// Payload of the boot metadata item `(type_tag, extra)`
    pub fn boot_metadata(&self, type_tag: u32, extra: u32) -> Result<Vec<u8>> {
        self.inner
            .metadata
            .boot_item(type_tag, extra)
            .map(|item| item.data.clone())
            .ok_or_else(|| not_found(&format!("boot item {:#x}/{}", type_tag, extra)))
    }

    /// Queues an I2C transaction on one of the device's logical channels.
    ///
    /// Returns at once; `completion` runs exactly once with the read bytes
    /// or the failure, including failures detected before queueing.
    pub fn transact<F>(&self, id: DeviceId, channel: u32, write: &[u8], read_len: usize, completion: F)
    where
        F: FnOnce(I2cResult) + Send + 'static,
    {
        let binding = match self.device(id).and_then(|d| d.i2c_channel(channel)) {
            Ok(binding) => binding,
            Err(e) => return completion(Err(e)),
        };
        let Some(coordinator) = self.inner.i2c.get() else {
            return completion(Err(Error::NotAvailable));
        };
        log::trace!(
            "bus: i2c channel {} -> bus {} addr {:#x}, {} out / {} in",
            channel,
            binding.bus_id,
            binding.address,
            write.len(),
            read_len
        );
        coordinator.submit(binding.bus_id, binding.address, write.to_vec(), read_len, Box::new(completion));
    }

    /// Like [`Bus::transact`], with the result delivered through an [`I2cPending`].
    pub fn transact_pending(&self, id: DeviceId, channel: u32, write: &[u8], read_len: usize) -> I2cPending {
        let (pending, completion) = I2cPending::new();
        self.transact(id, channel, write, read_len, completion);
        pending
    }

    /// Largest single transfer on the bus behind the device's channel
    pub fn max_transfer_size(&self, id: DeviceId, channel: u32) -> Result<usize> {
        let binding = self.device(id)?.i2c_channel(channel)?;
        self.inner
            .i2c
            .get()
            .ok_or(Error::NotAvailable)?
            .max_transfer_size(binding.bus_id)
    }

    // ---- shutdown ----

    /// Stops the I2C workers and releases every node in reverse insertion order.
    ///
    /// Later device operations fail with `BadState`. Returns the first host
    /// failure, after attempting every release.
    pub fn teardown(&self) -> Result<()> {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            log::debug!("bus: already torn down");
            return Ok(());
        }

        if let Some(coordinator) = self.inner.i2c.get() {
            coordinator.shutdown();
        }

        let _add = lock(&self.inner.add_lock);
        let _enable = lock(&self.inner.enable_lock);
        let devices = self.inner.catalog.live_devices();
        let mut first_err = None;
        for device in devices.iter().rev() {
            let Some(node) = device.node() else { continue };
            if let Err(e) = self.inner.host.release_child_node(node) {
                log::warn!("bus: releasing node of '{}' failed: {}", device.name(), e);
                if first_err.is_none() {
                    first_err = Some(host::rejected(e));
                }
            }
        }

        log::info!("bus: torn down, {} node(s) released", devices.len());
        first_err.map_or(Ok(()), Err)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_torn_down() {
            return Err(bad_state("bus torn down"));
        }
        Ok(())
    }
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbus_api::boot::StaticBootImage;
    use pbus_api::core::types::{
        CachePolicy, I2cChannelDesc, InterruptHandle, IrqMode, MappedRegion, MmioRange, NodeId, PhysAddr,
    };
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingHost {
        next: StdMutex<u64>,
        reject: AtomicBool,
        calls: StdMutex<Vec<String>>,
    }

    impl DeviceHost for RecordingHost {
        fn create_child_node(&self, name: &str, _device: PlatformDeviceHandle, visible: bool) -> Result<NodeId> {
            if self.reject.load(Ordering::Acquire) {
                return Err(Error::ResourceExhausted);
            }
            self.calls.lock().unwrap().push(format!("create {} {}", name, visible));
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Ok(NodeId(*next))
        }

        fn set_child_visibility(&self, node: NodeId, visible: bool) -> Result<()> {
            self.calls.lock().unwrap().push(format!("visible {} {}", node.0, visible));
            Ok(())
        }

        fn release_child_node(&self, node: NodeId) -> Result<()> {
            self.calls.lock().unwrap().push(format!("release {}", node.0));
            Ok(())
        }
    }

    struct NullResource;

    impl RootResource for NullResource {
        fn map_physical(&self, page_base: PhysAddr, _page_len: u64, _policy: CachePolicy) -> Result<MappedRegion> {
            Ok(MappedRegion { vaddr: page_base, handle_id: 1 })
        }

        fn create_interrupt(&self, irq: u32, mode: IrqMode) -> Result<InterruptHandle> {
            Ok(InterruptHandle { irq, mode, handle_id: 1 })
        }
    }

    fn bus(host: Arc<RecordingHost>) -> Bus {
        let boot = StaticBootImage::new(PlatformId::new(2, 5, "vim2"));
        Bus::builder(host, Arc::new(NullResource))
            .config(BusConfig::default().with_max_devices(4))
            .build(&boot)
            .unwrap()
    }

    #[test]
    fn test_rejected_add_rolls_back() {
        let host = Arc::new(RecordingHost::default());
        let bus = bus(host.clone());
        let desc = DeviceDescriptor::new("eth", DeviceIdentity::new(1, 2, 3)).with_metadata(7, b"x");

        host.reject.store(true, Ordering::Release);
        assert!(matches!(bus.device_add(&desc, DeviceAddFlags::empty()), Err(Error::HostRejected(_))));
        assert_eq!(bus.device_count(), 0);

        host.reject.store(false, Ordering::Release);
        let id = bus.device_add(&desc, DeviceAddFlags::empty()).unwrap();
        assert_eq!(id.index(), 0);
        assert_eq!(bus.get_metadata(id, 7).unwrap(), b"x".to_vec());
    }

    #[test]
    fn test_teardown_releases_in_reverse() {
        let host = Arc::new(RecordingHost::default());
        let bus = bus(host.clone());
        for name in ["a", "b"] {
            bus.device_add(&DeviceDescriptor::new(name, DeviceIdentity::new(1, 1, 1)), DeviceAddFlags::empty())
                .unwrap();
        }
        bus.teardown().unwrap();

        let calls = host.calls.lock().unwrap().clone();
        assert_eq!(calls[calls.len() - 2..], ["release 2".to_string(), "release 1".to_string()]);
        assert!(matches!(
            bus.device_enable(1, 1, 1, false),
            Err(Error::BadState(_))
        ));
        assert!(bus.teardown().is_ok());
    }

    #[test]
    fn test_transact_without_i2c_protocol() {
        let bus = bus(Arc::new(RecordingHost::default()));
        let desc = DeviceDescriptor::new("pmic", DeviceIdentity::new(1, 1, 9))
            .with_mmio(MmioRange::new(0x1000, 0x100))
            .with_i2c_channel(I2cChannelDesc::new(0, 0x32));
        let id = bus.device_add(&desc, DeviceAddFlags::empty()).unwrap();

        assert_eq!(bus.transact_pending(id, 0, &[1], 1).wait(), Err(Error::NotAvailable));
        assert_eq!(bus.transact_pending(id, 1, &[1], 1).wait(), Err(Error::InvalidChannel));
        assert_eq!(bus.max_transfer_size(id, 0), Err(Error::NotAvailable));
    }

    #[test]
    fn test_access_probe_fails_fast() {
        let bus = bus(Arc::new(RecordingHost::default()));
        assert_eq!(bus.clock(Access::Probe).err(), Some(Error::NotAvailable));
        assert_eq!(bus.board_name(), "vim2");
    }
}
