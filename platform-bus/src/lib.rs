//! Platform Bus
//!
//! This crate provides the board-support broker that sits between a boot
//! image and the peripheral drivers of a board. It owns the bus-wide
//! resources and hands them out to device instances.
//!
//! # Architecture
//!
//! The bus is organized into several functional components:
//!
//! - **Registry**: Set-once protocol slots with blocking waits
//! - **IOMMU**: BTI broker over the bus's IOMMU contexts
//! - **Catalog**: Insertion-ordered platform device records
//! - **Metadata**: Boot metadata and per-device metadata records
//! - **I2C**: Per-bus transaction queues with exactly-once completion
//! - **Bus**: The facade composing all of the above
//! - **Device**: The per-device handle given to the device host
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use platform_bus::{Bus, BusConfig, DeviceAddFlags};
//! use pbus_api::{DeviceDescriptor, DeviceIdentity, MmioRange, PlatformId, StaticBootImage};
//!
//! let boot = StaticBootImage::new(PlatformId::new(2, 5, "vim2"));
//! let bus = Bus::builder(host, root_resource)
//!     .config(BusConfig::default())
//!     .build(&boot)?;
//!
//! let uart = DeviceDescriptor::new("uart", DeviceIdentity::new(3, 1, 7))
//!     .with_mmio(MmioRange::new(0xc81004c0, 0x18));
//! let id = bus.device_add(&uart, DeviceAddFlags::empty())?;
//! bus.device_enable(3, 1, 7, true)?;
//! ```

pub mod bus;
pub mod catalog;
pub mod config;
pub mod device;
pub mod host;
pub mod i2c;
pub mod iommu;
pub mod metadata;
pub mod registry;

// Re-export commonly used items
pub use bus::{Access, Bus, BusBuilder};
pub use catalog::{DeviceAddFlags, DeviceId, I2cChannelBinding};
pub use config::BusConfig;
pub use device::PlatformDeviceHandle;
pub use host::DeviceHost;
pub use i2c::{I2cCompletion, I2cPending, I2cResult};
pub use iommu::DummyIommu;
pub use pbus_api::error::{Error, Result};
