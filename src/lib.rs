//! Completeness-Engine: event correlation and completeness classification
//!
//! Classifies satellite mission events (playbacks, datastrips, datatakes,
//! published tiles, housekeeping telemetry) by following the typed links
//! between planned and observed events and by intersecting them with
//! independent time segments.
//!
//! # Core Concepts
//!
//! - **Events**: Immutable, time-bounded records read from an external store
//! - **Links**: Named, directed edges from one event to another
//! - **Snapshot**: The working set of one request, fetched once and shared
//! - **Classifiers**: Pure per-domain status functions over a snapshot
//! - **Aggregates**: Volume, timeliness and macro-step roll-ups
//!
//! # Example
//!
//! ```no_run
//! use completeness_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> completeness_engine::error::Result<()> {
//! let store = InMemoryStore::load_json(std::path::Path::new("dump.json"))?;
//! let engine = CorrelationEngine::new(Arc::new(store), EngineConfig::default());
//!
//! let records = engine.report(Domain::Acquisition, &ReportScope::default()).await?;
//! for record in records {
//!     println!("{} {}", record.id, record.classification);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod index;
pub mod navigator;
pub mod project;
pub mod storage;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::classify::{Classification, Classifier, Status, Tag};
    pub use crate::config::{Domain, EngineConfig};
    pub use crate::core::*;
    pub use crate::engine::{CorrelationEngine, ReportScope};
    pub use crate::error::{Error, Result};
    pub use crate::navigator::{Hop, Navigator};
    pub use crate::project::Record;
    pub use crate::storage::*;
}
