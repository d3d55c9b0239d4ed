//! Interval arithmetic and time indexing

pub mod segment;
pub mod temporal;

pub use segment::*;
pub use temporal::*;
