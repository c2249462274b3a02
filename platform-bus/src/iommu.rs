//! IOMMU and BTI broker
//!
//! The broker owns the IOMMU contexts of the bus and turns `(iommu index,
//! bti id)` pairs into caller-owned [`BtiHandle`]s. It keeps no record of the
//! handles it issues.

use std::sync::Arc;

use pbus_api::core::types::BtiHandle;
use pbus_api::error::{Error, Result};
use pbus_api::resource::Iommu;
use hashbrown::HashSet;
use pbus_api::sync::{AtomicU64, Mutex, Ordering};

/// Software IOMMU used when the board provides no hardware IOMMU
///
/// Every scope is an identity mapping. It remembers which `(iommu, bti)`
/// scopes exist; asking for a known scope again always succeeds.
pub struct DummyIommu {
    capacity: usize,
    scopes: Mutex<HashSet<(u32, u32)>>,
    next_handle: AtomicU64,
}

impl DummyIommu {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            scopes: Mutex::new(HashSet::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Number of distinct scopes created so far
    pub fn scope_count(&self) -> usize {
        self.scopes.lock().len()
    }
}

impl Iommu for DummyIommu {
    fn create_bti(&self, iommu_index: u32, bti_id: u32) -> Result<BtiHandle> {
        {
            let mut scopes = self.scopes.lock();
            if !scopes.contains(&(iommu_index, bti_id)) {
                if scopes.len() >= self.capacity {
                    return Err(Error::ResourceExhausted);
                }
                scopes.insert((iommu_index, bti_id));
            }
        }
        let handle_id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        Ok(BtiHandle::new(iommu_index, bti_id, handle_id))
    }
}

/// Issues BTI handles scoped to the bus's IOMMU contexts
pub struct BtiBroker {
    iommus: Vec<Arc<dyn Iommu>>,
}

impl BtiBroker {
    pub fn new(iommus: Vec<Arc<dyn Iommu>>) -> Self {
        Self { iommus }
    }

    /// Number of IOMMU contexts
    pub fn iommu_count(&self) -> usize {
        self.iommus.len()
    }

    /// Mints a handle for `bti_id` through IOMMU `iommu_index`.
    pub fn get_bti(&self, iommu_index: u32, bti_id: u32) -> Result<BtiHandle> {
        let iommu = self
            .iommus
            .get(iommu_index as usize)
            .ok_or(Error::InvalidIndex)?;
        iommu.create_bti(iommu_index, bti_id).inspect_err(|e| {
            log::warn!("iommu: bti {} on iommu {} failed: {}", bti_id, iommu_index, e);
        })
    }
}
