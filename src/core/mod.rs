//! Core data types and models

pub mod attributes;
pub mod event;
pub mod temporal;

pub use attributes::*;
pub use event::*;
pub use temporal::*;
