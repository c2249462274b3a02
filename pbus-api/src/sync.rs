//! Synchronization primitives shared by the platform bus crates
//!
//! Spin-based locks only guard short critical sections; anything that may
//! wait for another driver uses the blocking primitives of `std`.

pub use spin::Mutex;
pub use spin::Once;
pub use spin::RwLock;
pub use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
