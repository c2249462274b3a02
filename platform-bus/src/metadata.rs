//! Metadata store
//!
//! Holds the boot-image metadata blob (opaque to the bus), the individual
//! boot metadata items, and the records attached to each device when it is
//! added. Boot data never changes after construction; device records are
//! only attached during `DeviceAdd` and detached when that add is rolled back.

use hashbrown::HashMap;
use pbus_api::boot::BootMetadataItem;
use pbus_api::core::descriptor::{DeviceMetadata, MetadataSource};
use pbus_api::core::types::MetadataRecord;
use pbus_api::error::{Error, Result};
use pbus_api::sync::RwLock;

use crate::catalog::DeviceId;

pub struct MetadataStore {
    blob: Vec<u8>,
    boot_items: Vec<BootMetadataItem>,
    /// Device records keyed by device serial
    records: RwLock<HashMap<u64, Vec<MetadataRecord>>>,
}

impl MetadataStore {
    pub fn new(blob: Vec<u8>, boot_items: Vec<BootMetadataItem>) -> Self {
        Self {
            blob,
            boot_items,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Raw boot metadata blob
    pub fn raw_blob(&self) -> &[u8] {
        &self.blob
    }

    /// Boot metadata item with the given type and discriminator
    pub fn boot_item(&self, type_tag: u32, extra: u32) -> Option<&BootMetadataItem> {
        self.boot_items
            .iter()
            .find(|item| item.type_tag == type_tag && item.extra == extra)
    }

    /// Turns descriptor metadata into records, copying referenced boot items.
    pub fn resolve(&self, metadata: &[DeviceMetadata]) -> Result<Vec<MetadataRecord>> {
        metadata
            .iter()
            .map(|m| {
                let data = match &m.source {
                    MetadataSource::Inline(data) => data.clone(),
                    MetadataSource::Boot { extra } => self
                        .boot_item(m.type_tag, *extra)
                        .map(|item| item.data.clone())
                        .ok_or_else(|| {
                            Error::NotFound(format!(
                                "boot metadata type {:#x} extra {}",
                                m.type_tag, extra
                            ))
                        })?,
                };
                Ok(MetadataRecord {
                    type_tag: m.type_tag,
                    data,
                })
            })
            .collect()
    }

    pub(crate) fn attach(&self, device: DeviceId, records: Vec<MetadataRecord>) {
        if records.is_empty() {
            return;
        }
        self.records.write().insert(device.serial(), records);
    }

    pub(crate) fn detach(&self, device: DeviceId) {
        self.records.write().remove(&device.serial());
    }

    /// First record of `type_tag` attached to `device`
    pub fn get(&self, device: DeviceId, type_tag: u32) -> Result<Vec<u8>> {
        let records = self.records.read();
        records
            .get(&device.serial())
            .and_then(|list| list.iter().find(|r| r.type_tag == type_tag))
            .map(|r| r.data.clone())
            .ok_or_else(|| Error::NotFound(format!("metadata type {:#x}", type_tag)))
    }

    /// Number of records attached to `device`
    pub fn record_count(&self, device: DeviceId) -> usize {
        self.records
            .read()
            .get(&device.serial())
            .map_or(0, |list| list.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DeviceAddFlags, DeviceCatalog};
    use pbus_api::core::descriptor::DeviceDescriptor;
    use pbus_api::core::types::DeviceIdentity;

    const MAC_ADDRESS: u32 = 0x4e4c_4d43;
    const BOARD_PRIVATE: u32 = 0x5250_4244;

    fn store() -> MetadataStore {
        let items = vec![
            BootMetadataItem { type_tag: MAC_ADDRESS, extra: 0, data: vec![0, 1, 2, 3, 4, 5] },
            BootMetadataItem { type_tag: MAC_ADDRESS, extra: 1, data: vec![6, 7, 8, 9, 10, 11] },
        ];
        MetadataStore::new(vec![0xde, 0xad], items)
    }

    fn device_id(catalog: &DeviceCatalog) -> DeviceId {
        let desc = DeviceDescriptor::new("eth", DeviceIdentity::new(1, 2, 3));
        catalog.insert_pending(&desc, DeviceAddFlags::empty()).unwrap().id()
    }

    #[test]
    fn test_resolve_boot_reference() {
        let store = store();
        let desc = DeviceDescriptor::new("eth", DeviceIdentity::new(1, 2, 3))
            .with_boot_metadata(MAC_ADDRESS, 1)
            .with_metadata(BOARD_PRIVATE, b"abc");
        let records = store.resolve(&desc.metadata).unwrap();
        assert_eq!(records[0].data, vec![6, 7, 8, 9, 10, 11]);
        assert_eq!(records[1].data, b"abc".to_vec());
    }

    #[test]
    fn test_missing_boot_reference() {
        let store = store();
        let desc = DeviceDescriptor::new("eth", DeviceIdentity::new(1, 2, 3))
            .with_boot_metadata(MAC_ADDRESS, 7);
        assert!(matches!(store.resolve(&desc.metadata), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_get_first_record_of_type() {
        let store = store();
        let catalog = DeviceCatalog::new(4);
        let id = device_id(&catalog);
        store.attach(
            id,
            vec![
                MetadataRecord { type_tag: BOARD_PRIVATE, data: vec![1] },
                MetadataRecord { type_tag: BOARD_PRIVATE, data: vec![2] },
            ],
        );
        assert_eq!(store.get(id, BOARD_PRIVATE).unwrap(), vec![1]);
        assert!(matches!(store.get(id, MAC_ADDRESS), Err(Error::NotFound(_))));
        assert_eq!(store.record_count(id), 2);

        store.detach(id);
        assert_eq!(store.record_count(id), 0);
        assert_eq!(store.raw_blob(), &[0xde, 0xad]);
    }
}
