//! Event store interface, in-memory store and request snapshots

pub mod memory;
pub mod snapshot;
pub mod store;

pub use memory::*;
pub use snapshot::*;
pub use store::*;
