//! Events, links, annotations and explicit-reference links

use crate::core::attributes::{AttributeValue, Attributes};
use crate::core::temporal::Timestamp;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Gauge/category name of an event, e.g. `PLAYBACK_VALIDITY_3`
pub type EventKind = String;

/// Unique event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId {
    /// UUID of the event
    pub id: Uuid,
}

impl EventId {
    /// Generate a new event ID
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self { id: uuid }
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Opaque geometry passed through to map projections (WKT text)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Geometry(pub String);

/// A typed, time-bounded record produced upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub satellite: String,
    pub attributes: Attributes,
    pub geometries: Vec<Geometry>,
    /// Name of the physical product this event describes, if any
    pub explicit_ref: Option<String>,
    /// Origin of the event, e.g. the plan file it was ingested from
    pub source: Option<String>,
}

impl Event {
    /// Create a new event, rejecting `stop < start`
    pub fn new(
        kind: impl Into<EventKind>,
        start: Timestamp,
        stop: Timestamp,
        satellite: impl Into<String>,
    ) -> Result<Self> {
        Self::builder(kind, start, stop, satellite).build()
    }

    /// Create event with builder pattern
    pub fn builder(
        kind: impl Into<EventKind>,
        start: Timestamp,
        stop: Timestamp,
        satellite: impl Into<String>,
    ) -> EventBuilder {
        EventBuilder {
            event: RawEvent {
                id: EventId::new(),
                kind: kind.into(),
                start,
                stop,
                satellite: satellite.into(),
                attributes: Attributes::new(),
                geometries: Vec::new(),
                explicit_ref: None,
                source: None,
            },
        }
    }

    /// Duration in minutes
    pub fn duration_minutes(&self) -> f64 {
        self.stop.minutes_since(self.start)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.attributes.get_text(name)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.attributes.get_number(name)
    }

    pub fn get_timestamp(&self, name: &str) -> Option<Timestamp> {
        self.attributes.get_timestamp(name)
    }
}

/// Unvalidated event shape, checked on conversion into [`Event`]
#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: EventId,
    kind: EventKind,
    start: Timestamp,
    stop: Timestamp,
    satellite: String,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    geometries: Vec<Geometry>,
    #[serde(default)]
    explicit_ref: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl TryFrom<RawEvent> for Event {
    type Error = Error;

    fn try_from(raw: RawEvent) -> Result<Self> {
        if raw.stop < raw.start {
            return Err(Error::Temporal(format!(
                "event {} ({}) stops at {} before it starts at {}",
                raw.id, raw.kind, raw.stop, raw.start
            )));
        }
        Ok(Event {
            id: raw.id,
            kind: raw.kind,
            start: raw.start,
            stop: raw.stop,
            satellite: raw.satellite,
            attributes: raw.attributes,
            geometries: raw.geometries,
            explicit_ref: raw.explicit_ref,
            source: raw.source,
        })
    }
}

/// Builder for events
pub struct EventBuilder {
    event: RawEvent,
}

impl EventBuilder {
    /// Use a known ID instead of a fresh one
    pub fn id(mut self, id: EventId) -> Self {
        self.event.id = id;
        self
    }

    /// Add a named attribute
    pub fn attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.event.attributes.insert(name, value);
        self
    }

    /// Add a geometry
    pub fn geometry(mut self, wkt: impl Into<String>) -> Self {
        self.event.geometries.push(Geometry(wkt.into()));
        self
    }

    /// Set the explicit reference
    pub fn explicit_ref(mut self, name: impl Into<String>) -> Self {
        self.event.explicit_ref = Some(name.into());
        self
    }

    /// Set the source
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.event.source = Some(name.into());
        self
    }

    /// Build the event, rejecting `stop < start`
    pub fn build(self) -> Result<Event> {
        Event::try_from(self.event)
    }
}

/// Directed, named edge between two events
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub source: EventId,
    pub target: EventId,
}

impl Link {
    pub fn new(name: impl Into<String>, source: EventId, target: EventId) -> Self {
        Self {
            name: name.into(),
            source,
            target,
        }
    }
}

/// Directed, named edge between two explicit references (e.g. datastrip -> `TILE`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefLink {
    pub name: String,
    pub source_ref: String,
    pub target_ref: String,
}

impl RefLink {
    pub fn new(
        name: impl Into<String>,
        source_ref: impl Into<String>,
        target_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_ref: source_ref.into(),
            target_ref: target_ref.into(),
        }
    }
}

/// Named fact attached to an explicit reference rather than an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub explicit_ref: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub geometries: Vec<Geometry>,
}

impl Annotation {
    pub fn new(explicit_ref: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            explicit_ref: explicit_ref.into(),
            name: name.into(),
            attributes: Attributes::new(),
            geometries: Vec::new(),
        }
    }

    /// Builder-style attribute
    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name, value);
        self
    }

    /// Builder-style geometry
    pub fn with_geometry(mut self, wkt: impl Into<String>) -> Self {
        self.geometries.push(Geometry(wkt.into()));
        self
    }

    /// Whether the `status` attribute, when present, differs from `missing_marker`
    pub fn is_successful(&self, missing_marker: &str) -> bool {
        self.attributes.get_text("status") != Some(missing_marker)
    }
}
