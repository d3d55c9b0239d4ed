//! Read-only query interface to the event store

use crate::core::event::{Annotation, Event, EventId, Link, RefLink};
use crate::core::temporal::TimeWindow;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Trait for event store implementations.
///
/// Every query may return an empty collection; "not found" is never an
/// error. Errors are reserved for the collaborator itself failing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Get events matching a filter, ordered by start time
    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Get links where the event is either the source or the target
    async fn get_links(&self, event_id: EventId) -> Result<Vec<Link>>;

    /// Get annotations of an explicit reference, optionally restricted to one name
    async fn get_annotations(
        &self,
        explicit_ref: &str,
        name: Option<String>,
    ) -> Result<Vec<Annotation>>;

    /// Get links whose source is the explicit reference
    async fn get_ref_links(&self, explicit_ref: &str) -> Result<Vec<RefLink>>;
}

/// Conjunctive event filter. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub ids: Option<HashSet<EventId>>,
    /// Kind names; an entry ending in `*` matches by prefix
    pub kinds: Option<Vec<String>>,
    /// Events overlapping the window
    pub window: Option<TimeWindow>,
    pub satellite: Option<String>,
    pub explicit_refs: Option<HashSet<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_ids(ids: Vec<EventId>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    pub fn window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn satellite(mut self, satellite: Option<String>) -> Self {
        self.satellite = satellite;
        self
    }

    pub fn explicit_refs(mut self, refs: Vec<String>) -> Self {
        self.explicit_refs = Some(refs.into_iter().collect());
        self
    }

    /// Check a single event against every set criterion
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.iter().any(|k| kind_matches(k, &event.kind)) {
                return false;
            }
        }
        if let Some(window) = &self.window {
            if !window.overlaps(event.start, event.stop) {
                return false;
            }
        }
        if let Some(satellite) = &self.satellite {
            if &event.satellite != satellite {
                return false;
            }
        }
        if let Some(refs) = &self.explicit_refs {
            match &event.explicit_ref {
                Some(r) if refs.contains(r) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Exact match, or prefix match when the pattern ends in `*`
pub fn kind_matches(pattern: &str, kind: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => kind.starts_with(prefix),
        None => pattern == kind,
    }
}
