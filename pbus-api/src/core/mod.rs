//! Core module containing identity, handle and descriptor types

pub mod descriptor;
pub mod types;

// Re-export commonly used items
pub use descriptor::*;
pub use types::*;
