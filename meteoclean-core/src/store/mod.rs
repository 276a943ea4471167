//! Store backends shipped with the core
//!
//! Network-backed stores live in `meteoclean-connectors`; the core only
//! carries what is needed for tests and dry runs:
//! - `memory` - in-memory store with failure injection

#[cfg(feature = "store-memory")]
pub mod memory;

#[cfg(feature = "store-memory")]
pub use memory::MemoryStore;
