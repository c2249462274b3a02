//! Boot-image accessor
//!
//! The platform bus is constructed from a boot image that carries the
//! platform identity and a metadata blob. How the container is walked is the
//! business of the implementor; the bus only consumes the accessor below.

use alloc::vec::Vec;

use crate::core::types::PlatformId;
use crate::error::Result;

/// Metadata item found in the boot image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootMetadataItem {
    /// Item type tag
    pub type_tag: u32,
    /// Type-specific discriminator (e.g. which MAC address)
    pub extra: u32,
    /// Item payload
    pub data: Vec<u8>,
}

/// Boot-image accessor consumed at bus construction
pub trait BootImage {
    /// Reads the platform identity record
    fn read_identity(&self) -> Result<PlatformId>;

    /// Reads the raw metadata blob
    fn read_metadata_blob(&self) -> Result<Vec<u8>>;

    /// Reads the individual metadata items contained in the blob
    fn read_metadata_items(&self) -> Result<Vec<BootMetadataItem>> {
        Ok(Vec::new())
    }
}

/// Boot image held in memory
///
/// Used for boards whose description is compiled in, and in tests.
#[derive(Debug, Clone)]
pub struct StaticBootImage {
    identity: PlatformId,
    blob: Vec<u8>,
    items: Vec<BootMetadataItem>,
}

impl StaticBootImage {
    pub fn new(identity: PlatformId) -> Self {
        Self {
            identity,
            blob: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Sets the raw blob
    pub fn with_blob(mut self, blob: &[u8]) -> Self {
        self.blob = blob.to_vec();
        self
    }

    /// Adds a metadata item
    pub fn with_item(mut self, type_tag: u32, extra: u32, data: &[u8]) -> Self {
        self.items.push(BootMetadataItem {
            type_tag,
            extra,
            data: data.to_vec(),
        });
        self
    }
}

impl BootImage for StaticBootImage {
    fn read_identity(&self) -> Result<PlatformId> {
        Ok(self.identity.clone())
    }

    fn read_metadata_blob(&self) -> Result<Vec<u8>> {
        Ok(self.blob.clone())
    }

    fn read_metadata_items(&self) -> Result<Vec<BootMetadataItem>> {
        Ok(self.items.clone())
    }
}
