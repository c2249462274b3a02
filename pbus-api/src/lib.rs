//! PBUS API - Core interfaces and types for the platform bus
//!
//! This crate provides the vocabulary shared between the platform bus, the
//! board drivers that register protocols with it, and the peripheral drivers
//! that consume devices from it. It carries no behavior of its own beyond
//! descriptor validation; the broker itself lives in `platform_bus`.
//!
//! # Architecture
//!
//! The API is organized into several key modules:
//!
//! - **Core**: Identity, handle and resource-descriptor types
//! - **Error**: The error type shared by every bus operation
//! - **Protocol**: Protocol identifiers and the traits board drivers implement
//! - **Boot**: The boot-image accessor consumed at bus construction
//! - **Resource**: IOMMU and root-resource collaborator interfaces
//!
//! # Usage
//!
//! ```rust
//! use pbus_api::core::{DeviceDescriptor, DeviceIdentity, MmioRange};
//! use pbus_api::error::Result;
//!
//! fn describe() -> Result<DeviceDescriptor> {
//!     let desc = DeviceDescriptor::new("uart", DeviceIdentity::new(3, 1, 7))
//!         .with_mmio(MmioRange::new(0xc81004c0, 0x18));
//!     desc.validate()?;
//!     Ok(desc)
//! }
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// Core modules
pub mod core;
pub mod error;
pub mod protocol;
pub mod boot;
pub mod resource;
pub mod sync;

// Re-export commonly used types
pub use crate::core::types::*;
pub use crate::core::descriptor::{DeviceDescriptor, MetadataSource, ResourceCounts};
pub use crate::error::{Error, Result};
pub use crate::protocol::{ProtocolId, ProtocolImpl};
pub use crate::boot::{BootImage, BootMetadataItem, StaticBootImage};
pub use crate::resource::{Iommu, RootResource};
