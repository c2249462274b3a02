//! Privileged collaborators of the bus
//!
//! The IOMMU mints DMA scopes; the root resource authorizes MMIO mappings and
//! interrupt objects. Both are supplied by the board when the bus is built.

use crate::core::types::{BtiHandle, CachePolicy, InterruptHandle, IrqMode, MappedRegion, PhysAddr};
use crate::error::Result;

/// IOMMU context able to mint bus transaction identifiers
pub trait Iommu: Send + Sync {
    /// Mints a handle for `bti_id`.
    ///
    /// `iommu_index` is recorded in the returned handle. Fails with
    /// `ResourceExhausted` when no further scope can be created.
    fn create_bti(&self, iommu_index: u32, bti_id: u32) -> Result<BtiHandle>;
}

/// Root system resource
pub trait RootResource: Send + Sync {
    /// Maps `page_len` bytes of physical memory starting at the page-aligned `page_base`
    fn map_physical(&self, page_base: PhysAddr, page_len: u64, cache_policy: CachePolicy) -> Result<MappedRegion>;

    /// Creates an interrupt object for `irq`
    fn create_interrupt(&self, irq: u32, mode: IrqMode) -> Result<InterruptHandle>;
}
