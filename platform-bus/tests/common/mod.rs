//! Fakes shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pbus_api::protocol::{
    ClockProtocol, GpioFlags, GpioProtocol, I2cImplProtocol, InterruptFlags, ScpiProtocol,
};
use pbus_api::protocol::{DvfsInfo, OperatingPoint};
use pbus_api::{
    CachePolicy, Error, InterruptHandle, IrqMode, MappedRegion, NodeId, PhysAddr, PlatformId, Result,
    RootResource, StaticBootImage,
};
use platform_bus::{Bus, BusConfig, DeviceHost, PlatformDeviceHandle};

/// Virtual base the fake root resource maps every region at
pub const MAP_BASE: u64 = 0xffff_8000_0000_0000;

/// Host that records its calls and keeps no handles
#[derive(Default)]
pub struct FakeHost {
    next_node: AtomicU64,
    pub reject_create: AtomicBool,
    pub reject_visibility: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DeviceHost for FakeHost {
    fn create_child_node(&self, name: &str, device: PlatformDeviceHandle, visible: bool) -> Result<NodeId> {
        if self.reject_create.load(Ordering::SeqCst) {
            return Err(Error::HostRejected(format!("no room for {}", name)));
        }
        // The handle must already resolve while the node is being created.
        let info = device.device_info()?;
        let node = NodeId(self.next_node.fetch_add(1, Ordering::SeqCst) + 1);
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {} {} {}", info.name, node.0, visible));
        Ok(node)
    }

    fn set_child_visibility(&self, node: NodeId, visible: bool) -> Result<()> {
        if self.reject_visibility.load(Ordering::SeqCst) {
            return Err(Error::BadState("node busy".to_string()));
        }
        self.calls.lock().unwrap().push(format!("visible {} {}", node.0, visible));
        Ok(())
    }

    fn release_child_node(&self, node: NodeId) -> Result<()> {
        self.calls.lock().unwrap().push(format!("release {}", node.0));
        Ok(())
    }
}

/// Root resource mapping every page range at `MAP_BASE + page_base`
#[derive(Default)]
pub struct FakeResource {
    next_handle: AtomicU64,
    pub mapped: Mutex<Vec<(PhysAddr, u64, CachePolicy)>>,
}

impl RootResource for FakeResource {
    fn map_physical(&self, page_base: PhysAddr, page_len: u64, cache_policy: CachePolicy) -> Result<MappedRegion> {
        self.mapped.lock().unwrap().push((page_base, page_len, cache_policy));
        Ok(MappedRegion {
            vaddr: MAP_BASE + page_base,
            handle_id: self.next_handle.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    fn create_interrupt(&self, irq: u32, mode: IrqMode) -> Result<InterruptHandle> {
        Ok(InterruptHandle {
            irq,
            mode,
            handle_id: self.next_handle.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

/// Clock controller that records enabled clocks
#[derive(Default)]
pub struct FakeClock {
    pub enabled: Mutex<Vec<u32>>,
}

impl ClockProtocol for FakeClock {
    fn enable(&self, clk: u32) -> Result<()> {
        self.enabled.lock().unwrap().push(clk);
        Ok(())
    }

    fn disable(&self, clk: u32) -> Result<()> {
        self.enabled.lock().unwrap().retain(|c| *c != clk);
        Ok(())
    }
}

/// GPIO controller with 64 lines; reads return the last written value
pub struct FakeGpio {
    pub levels: Mutex<[u8; 64]>,
    pub configured: Mutex<Vec<(u32, GpioFlags)>>,
}

impl Default for FakeGpio {
    fn default() -> Self {
        Self {
            levels: Mutex::new([0; 64]),
            configured: Mutex::new(Vec::new()),
        }
    }
}

impl GpioProtocol for FakeGpio {
    fn config(&self, gpio: u32, flags: GpioFlags) -> Result<()> {
        self.configured.lock().unwrap().push((gpio, flags));
        Ok(())
    }

    fn read(&self, gpio: u32) -> Result<u8> {
        self.levels
            .lock()
            .unwrap()
            .get(gpio as usize)
            .copied()
            .ok_or(Error::InvalidIndex)
    }

    fn write(&self, gpio: u32, value: u8) -> Result<()> {
        let mut levels = self.levels.lock().unwrap();
        let level = levels.get_mut(gpio as usize).ok_or(Error::InvalidIndex)?;
        *level = value;
        Ok(())
    }

    fn get_interrupt(&self, gpio: u32, _flags: InterruptFlags) -> Result<InterruptHandle> {
        Ok(InterruptHandle {
            irq: 1000 + gpio,
            mode: IrqMode::EdgeHigh,
            handle_id: 1,
        })
    }
}

/// SCPI controller with one sensor and a two-point DVFS table
#[derive(Default)]
pub struct FakeScpi {
    pub dvfs_idx: Mutex<u16>,
}

impl ScpiProtocol for FakeScpi {
    fn get_sensor(&self, name: &str) -> Result<u32> {
        match name {
            "aml_thermal" => Ok(0),
            other => Err(Error::NotFound(other.to_string())),
        }
    }

    fn get_sensor_value(&self, sensor_id: u32) -> Result<u32> {
        if sensor_id == 0 { Ok(47_000) } else { Err(Error::InvalidIndex) }
    }

    fn get_dvfs_info(&self, _power_domain: u8) -> Result<DvfsInfo> {
        Ok(DvfsInfo {
            opps: vec![
                OperatingPoint { freq_hz: 100_000_000, volt_uv: 900_000 },
                OperatingPoint { freq_hz: 1_000_000_000, volt_uv: 1_100_000 },
            ],
            latency_us: 200,
        })
    }

    fn get_dvfs_idx(&self, _power_domain: u8) -> Result<u16> {
        Ok(*self.dvfs_idx.lock().unwrap())
    }

    fn set_dvfs_idx(&self, _power_domain: u8, idx: u16) -> Result<()> {
        *self.dvfs_idx.lock().unwrap() = idx;
        Ok(())
    }
}

/// I2C transport with `buses` buses of `max_transfer` bytes
///
/// Reads echo the first written byte. Address 0x7e fails on the wire and
/// address 0x7f times out.
pub struct FakeI2c {
    pub buses: u32,
    pub max_transfer: usize,
    pub log: Mutex<Vec<(u32, u16, Vec<u8>)>>,
}

impl FakeI2c {
    pub fn new(buses: u32, max_transfer: usize) -> Self {
        Self {
            buses,
            max_transfer,
            log: Mutex::new(Vec::new()),
        }
    }
}

impl I2cImplProtocol for FakeI2c {
    fn bus_count(&self) -> u32 {
        self.buses
    }

    fn max_transfer_size(&self, _bus_id: u32) -> Result<usize> {
        Ok(self.max_transfer)
    }

    fn transact(&self, bus_id: u32, address: u16, write: &[u8], read_len: usize) -> Result<Vec<u8>> {
        match address {
            0x7e => return Err(Error::NotSupported),
            0x7f => return Err(Error::Timeout),
            _ => {}
        }
        self.log.lock().unwrap().push((bus_id, address, write.to_vec()));
        Ok(vec![write.first().copied().unwrap_or(0); read_len])
    }
}

/// The "vim2" boot image used throughout the tests
pub fn vim2_boot() -> StaticBootImage {
    StaticBootImage::new(PlatformId::new(2, 5, "vim2"))
        .with_blob(&[0x5a, 0x42, 0x49, 0x01])
        .with_item(0x4e4c_4d43, 0, &[0x00, 0x15, 0x18, 0x01, 0x81, 0x31])
}

pub fn new_bus(host: Arc<dyn DeviceHost>) -> Bus {
    new_bus_with(host, BusConfig::default())
}

pub fn new_bus_with(host: Arc<dyn DeviceHost>, config: BusConfig) -> Bus {
    Bus::builder(host, Arc::new(FakeResource::default()))
        .config(config)
        .build(&vim2_boot())
        .unwrap()
}
