//! Device host collaborator
//!
//! The surrounding driver host owns the device tree. The bus only asks it to
//! create a child node per platform device, to toggle a node's visibility,
//! and to release nodes at teardown.

use pbus_api::core::types::NodeId;
use pbus_api::error::{host_rejected, Error, Result};

use crate::device::PlatformDeviceHandle;

/// Node plumbing of the driver host
///
/// Implementations must not call back into `device_add` or `device_enable`
/// from these methods; the bus holds its add/enable lock across them.
pub trait DeviceHost: Send + Sync {
    /// Creates the child node for a platform device.
    ///
    /// `device` is the handle the driver bound to the node talks to the bus
    /// through. Hidden nodes (`visible == false`) are not offered to drivers
    /// until made visible.
    fn create_child_node(&self, name: &str, device: PlatformDeviceHandle, visible: bool) -> Result<NodeId>;

    /// Makes a node visible or hides it again
    fn set_child_visibility(&self, node: NodeId, visible: bool) -> Result<()>;

    /// Releases a node at bus teardown
    fn release_child_node(&self, node: NodeId) -> Result<()>;
}

/// Maps a host failure onto `HostRejected`, keeping the original message.
pub(crate) fn rejected(err: Error) -> Error {
    match err {
        Error::HostRejected(_) => err,
        other => host_rejected(&other.to_string()),
    }
}
