//! In-memory event store

use crate::core::event::{Annotation, Event, EventId, Link, RefLink};
use crate::error::{Error, Result};
use crate::index::TemporalIndex;
use crate::storage::store::{kind_matches, EventFilter, EventStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Serialized content of a store, as exported by the ingestion layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDump {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub ref_links: Vec<RefLink>,
}

/// In-memory implementation of the event store
pub struct InMemoryStore {
    events: Vec<Event>,
    by_id: HashMap<EventId, usize>,
    /// Map from event kind to offsets
    by_kind: HashMap<String, Vec<usize>>,
    time_index: TemporalIndex,
    links: Vec<Link>,
    /// Map from event ID to offsets of links touching it
    links_by_event: HashMap<EventId, Vec<usize>>,
    annotations: HashMap<String, Vec<Annotation>>,
    ref_links: HashMap<String, Vec<RefLink>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            by_id: HashMap::new(),
            by_kind: HashMap::new(),
            time_index: TemporalIndex::new(),
            links: Vec::new(),
            links_by_event: HashMap::new(),
            annotations: HashMap::new(),
            ref_links: HashMap::new(),
        }
    }

    /// Build a store from a dump
    pub fn from_dump(dump: StoreDump) -> Self {
        let mut store = Self::new();
        dump.events.into_iter().for_each(|e| store.insert_event(e));
        dump.links.into_iter().for_each(|l| store.insert_link(l));
        dump.annotations
            .into_iter()
            .for_each(|a| store.insert_annotation(a));
        dump.ref_links.into_iter().for_each(|l| store.insert_ref_link(l));
        store
    }

    /// Load a JSON dump from disk. Malformed events (`stop < start`) are rejected here.
    pub fn load_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Store(format!("cannot read {}: {}", path.display(), e)))?;
        let dump: StoreDump = serde_json::from_str(&text)
            .map_err(|e| Error::Store(format!("malformed dump {}: {}", path.display(), e)))?;
        tracing::debug!(
            path = %path.display(),
            events = dump.events.len(),
            links = dump.links.len(),
            annotations = dump.annotations.len(),
            "loaded store dump"
        );
        Ok(Self::from_dump(dump))
    }

    /// Add an event. A second event with the same ID replaces the first.
    pub fn insert_event(&mut self, event: Event) {
        if let Some(&offset) = self.by_id.get(&event.id) {
            tracing::warn!(event_id = %event.id, "replacing duplicate event");
            self.events[offset] = event;
            self.rebuild_event_indexes();
            return;
        }
        let offset = self.events.len();
        self.by_kind
            .entry(event.kind.clone())
            .or_insert_with(Vec::new)
            .push(offset);
        self.time_index.add_event(&event, offset);
        self.by_id.insert(event.id, offset);
        self.events.push(event);
    }

    pub fn insert_link(&mut self, link: Link) {
        let offset = self.links.len();
        self.links_by_event
            .entry(link.source)
            .or_insert_with(Vec::new)
            .push(offset);
        if link.target != link.source {
            self.links_by_event
                .entry(link.target)
                .or_insert_with(Vec::new)
                .push(offset);
        }
        self.links.push(link);
    }

    pub fn insert_annotation(&mut self, annotation: Annotation) {
        self.annotations
            .entry(annotation.explicit_ref.clone())
            .or_insert_with(Vec::new)
            .push(annotation);
    }

    pub fn insert_ref_link(&mut self, link: RefLink) {
        self.ref_links
            .entry(link.source_ref.clone())
            .or_insert_with(Vec::new)
            .push(link);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn rebuild_event_indexes(&mut self) {
        self.by_kind.clear();
        self.time_index = TemporalIndex::new();
        for (offset, event) in self.events.iter().enumerate() {
            self.by_kind
                .entry(event.kind.clone())
                .or_insert_with(Vec::new)
                .push(offset);
            self.time_index.add_event(event, offset);
        }
    }

    /// Narrow the scan with the most selective index available
    fn candidate_offsets(&self, filter: &EventFilter) -> Vec<usize> {
        if let Some(ids) = &filter.ids {
            return ids.iter().filter_map(|id| self.by_id.get(id).copied()).collect();
        }
        if let Some(kinds) = &filter.kinds {
            if kinds.iter().all(|k| !k.ends_with('*')) {
                return kinds
                    .iter()
                    .filter_map(|k| self.by_kind.get(k))
                    .flatten()
                    .copied()
                    .collect();
            }
            return self
                .by_kind
                .iter()
                .filter(|(kind, _)| kinds.iter().any(|k| kind_matches(k, kind)))
                .flat_map(|(_, offsets)| offsets.iter().copied())
                .collect();
        }
        if let Some(window) = &filter.window {
            return self.time_index.candidates(window);
        }
        (0..self.events.len()).collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn get_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut offsets = self.candidate_offsets(filter);
        offsets.sort_unstable();
        offsets.dedup();

        let mut events: Vec<Event> = offsets
            .into_iter()
            .map(|offset| &self.events[offset])
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);

        Ok(events)
    }

    async fn get_links(&self, event_id: EventId) -> Result<Vec<Link>> {
        Ok(self
            .links_by_event
            .get(&event_id)
            .map(|offsets| offsets.iter().map(|&o| self.links[o].clone()).collect())
            .unwrap_or_default())
    }

    async fn get_annotations(
        &self,
        explicit_ref: &str,
        name: Option<String>,
    ) -> Result<Vec<Annotation>> {
        Ok(self
            .annotations
            .get(explicit_ref)
            .map(|annotations| {
                annotations
                    .iter()
                    .filter(|a| name.as_deref().map_or(true, |n| a.name == n))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_ref_links(&self, explicit_ref: &str) -> Result<Vec<RefLink>> {
        Ok(self.ref_links.get(explicit_ref).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temporal::{TimeWindow, Timestamp};

    fn event(kind: &str, start: i64, stop: i64) -> Event {
        Event::new(kind, Timestamp::from_secs(start), Timestamp::from_secs(stop), "S2A").unwrap()
    }

    #[tokio::test]
    async fn test_get_events_by_kind_and_window() {
        let mut store = InMemoryStore::new();
        store.insert_event(event("PLAYBACK_VALIDITY_3", 300, 400));
        store.insert_event(event("PLAYBACK_VALIDITY_2", 100, 200));
        store.insert_event(event("ORBPRE", 0, 6000));

        let window = TimeWindow::new(Timestamp::from_secs(150), Timestamp::from_secs(350)).unwrap();
        let found = store
            .get_events(&EventFilter::new().kinds(["PLAYBACK_VALIDITY_*"]).window(window))
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, "PLAYBACK_VALIDITY_2");

        let orbits = store
            .get_events(&EventFilter::new().window(window))
            .await
            .unwrap();
        assert_eq!(orbits.len(), 3);
    }

    #[tokio::test]
    async fn test_links_are_visible_from_both_ends() {
        let mut store = InMemoryStore::new();
        let a = event("A", 0, 1);
        let b = event("B", 0, 1);
        store.insert_link(Link::new("PLANNED_PLAYBACK", a.id, b.id));
        store.insert_event(a.clone());
        store.insert_event(b.clone());

        assert_eq!(store.get_links(a.id).await.unwrap().len(), 1);
        assert_eq!(store.get_links(b.id).await.unwrap().len(), 1);
        assert!(store.get_links(EventId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_annotations_filtered_by_name() {
        let mut store = InMemoryStore::new();
        store.insert_annotation(Annotation::new("DS", "SIZE").with("aggregated_size", 10.0));
        store.insert_annotation(Annotation::new("DS", "DATATAKE").with("datatake_identifier", "GS2A"));

        assert_eq!(store.get_annotations("DS", None).await.unwrap().len(), 2);
        assert_eq!(
            store.get_annotations("DS", Some("SIZE".into())).await.unwrap().len(),
            1
        );
        assert!(store.get_annotations("OTHER", None).await.unwrap().is_empty());
    }

    #[test]
    fn test_dump_round_trip_rejects_malformed_events() {
        let json = r#"{"events": [{"kind": "X", "start": "2020-01-01T00:00:10Z",
                        "stop": "2020-01-01T00:00:00Z", "satellite": "S2A"}]}"#;
        assert!(serde_json::from_str::<StoreDump>(json).is_err());
    }

    #[test]
    fn test_load_json_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let dump = StoreDump {
            events: vec![event("A", 0, 10)],
            ..StoreDump::default()
        };
        std::fs::write(&path, serde_json::to_string(&dump).unwrap()).unwrap();

        let store = InMemoryStore::load_json(&path).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_json_failures_name_the_dump() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.json");
        assert!(matches!(InMemoryStore::load_json(&absent), Err(Error::Store(_))));

        let malformed = dir.path().join("malformed.json");
        std::fs::write(&malformed, "{\"events\": [").unwrap();
        match InMemoryStore::load_json(&malformed) {
            Err(Error::Store(message)) => assert!(message.contains("malformed.json")),
            other => panic!("expected store error, got {:?}", other.map(|s| s.len())),
        }
    }
}
