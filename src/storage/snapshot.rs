//! Immutable working set fetched once per reporting request

use crate::core::event::{Annotation, Event, EventId, Link, RefLink};
use crate::error::Result;
use crate::index::segment::{segments_of, Segment};
use crate::storage::store::{kind_matches, EventFilter, EventStore};
use dashmap::DashMap;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What to fetch for one report
#[derive(Debug, Clone, Default)]
pub struct SnapshotRequest {
    /// Events to classify
    pub primary: EventFilter,
    /// Independent datasets (orbit predictions, gap events, ...) fetched by kind
    pub auxiliary: Vec<EventFilter>,
    /// Number of link hops followed from the primary events
    pub max_link_depth: usize,
}

/// Read-only view over events, links and annotations.
///
/// Built once, then shared between classification workers. The only
/// interior mutability is a cache of derived segment lists, which is
/// deterministic and never changes results.
#[derive(Default)]
pub struct Snapshot {
    events: Vec<Event>,
    by_id: HashMap<EventId, usize>,
    primary: Vec<EventId>,
    links_out: HashMap<EventId, Vec<Link>>,
    links_in: HashMap<EventId, Vec<Link>>,
    seen_links: HashSet<Link>,
    annotations: HashMap<String, Vec<Annotation>>,
    ref_links: HashMap<String, Vec<RefLink>>,
    segment_cache: DashMap<(String, String), Arc<Vec<Segment>>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the working set for a request from the store.
    pub async fn fetch(store: &dyn EventStore, request: &SnapshotRequest) -> Result<Self> {
        let mut snapshot = Self::new();

        let primary = store.get_events(&request.primary).await?;
        for event in primary {
            snapshot.primary.push(event.id);
            snapshot.insert_event(event);
        }
        let auxiliary = try_join_all(request.auxiliary.iter().map(|f| store.get_events(f))).await?;
        for event in auxiliary.into_iter().flatten() {
            snapshot.insert_event(event);
        }

        let mut expanded: HashSet<EventId> = HashSet::new();
        let mut frontier: Vec<EventId> = snapshot.primary.clone();
        for depth in 0..request.max_link_depth {
            if frontier.is_empty() {
                break;
            }
            expanded.extend(frontier.iter().copied());
            let links = try_join_all(frontier.iter().map(|id| store.get_links(*id))).await?;

            let mut next: Vec<EventId> = Vec::new();
            let mut queued: HashSet<EventId> = HashSet::new();
            for link in links.into_iter().flatten() {
                for id in [link.source, link.target] {
                    if !expanded.contains(&id) && queued.insert(id) {
                        next.push(id);
                    }
                }
                snapshot.insert_link(link);
            }

            let missing: Vec<EventId> = next
                .iter()
                .filter(|id| !snapshot.contains(id))
                .copied()
                .collect();
            if !missing.is_empty() {
                let fetched = store.get_events(&EventFilter::by_ids(missing.clone())).await?;
                tracing::debug!(
                    depth,
                    requested = missing.len(),
                    fetched = fetched.len(),
                    "followed link hop"
                );
                for event in fetched {
                    snapshot.insert_event(event);
                }
            }
            // Dangling targets stay out of the snapshot and surface later as
            // unresolved references; they cannot be expanded further.
            frontier = next.into_iter().filter(|id| snapshot.contains(id)).collect();
        }

        let mut refs: Vec<String> = snapshot.explicit_refs();
        let mut known: HashSet<String> = refs.iter().cloned().collect();
        let ref_links = try_join_all(refs.iter().map(|r| store.get_ref_links(r))).await?;
        for link in ref_links.into_iter().flatten() {
            if known.insert(link.target_ref.clone()) {
                refs.push(link.target_ref.clone());
            }
            snapshot.insert_ref_link(link);
        }
        let annotations = try_join_all(refs.iter().map(|r| store.get_annotations(r, None))).await?;
        for annotation in annotations.into_iter().flatten() {
            snapshot.insert_annotation(annotation);
        }

        tracing::debug!(
            primary = snapshot.primary.len(),
            events = snapshot.events.len(),
            links = snapshot.seen_links.len(),
            refs = refs.len(),
            "snapshot fetched"
        );
        Ok(snapshot)
    }

    /// Add an event; the first copy of an ID wins
    pub fn insert_event(&mut self, event: Event) {
        if self.by_id.contains_key(&event.id) {
            return;
        }
        self.by_id.insert(event.id, self.events.len());
        self.events.push(event);
    }

    /// Add an event and mark it as a candidate for classification
    pub fn insert_primary(&mut self, event: Event) {
        if !self.primary.contains(&event.id) {
            self.primary.push(event.id);
        }
        self.insert_event(event);
    }

    pub fn insert_link(&mut self, link: Link) {
        if !self.seen_links.insert(link.clone()) {
            return;
        }
        self.links_in
            .entry(link.target)
            .or_insert_with(Vec::new)
            .push(link.clone());
        self.links_out
            .entry(link.source)
            .or_insert_with(Vec::new)
            .push(link);
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

    pub fn contains(&self, id: &EventId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn event(&self, id: &EventId) -> Option<&Event> {
        self.by_id.get(id).map(|&offset| &self.events[offset])
    }

    /// Candidate events, in fetch order
    pub fn primary_events(&self) -> impl Iterator<Item = &Event> {
        self.primary.iter().filter_map(|id| self.event(id))
    }

    pub fn primary_ids(&self) -> &[EventId] {
        &self.primary
    }

    /// All events matching a filter, in fetch order
    pub fn events_matching<'a>(&'a self, filter: &'a EventFilter) -> impl Iterator<Item = &'a Event> {
        self.events.iter().filter(move |e| filter.matches(e))
    }

    pub fn links_from(&self, id: &EventId) -> &[Link] {
        self.links_out.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn links_to(&self, id: &EventId) -> &[Link] {
        self.links_in.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn annotations(&self, explicit_ref: &str) -> &[Annotation] {
        self.annotations
            .get(explicit_ref)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ref_links(&self, explicit_ref: &str) -> &[RefLink] {
        self.ref_links
            .get(explicit_ref)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Segments of events of a kind for one satellite, in start order.
    ///
    /// Computed on first use and cached for the life of the snapshot.
    pub fn segments(&self, kind_pattern: &str, satellite: &str) -> Arc<Vec<Segment>> {
        let key = (kind_pattern.to_string(), satellite.to_string());
        if let Some(cached) = self.segment_cache.get(&key) {
            return Arc::clone(cached.value());
        }
        let mut events: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.satellite == satellite && kind_matches(kind_pattern, &e.kind))
            .collect();
        events.sort_by_key(|e| (e.start, e.stop));
        let segments = Arc::new(segments_of(events));
        self.segment_cache
            .entry(key)
            .or_insert_with(|| Arc::clone(&segments))
            .value()
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn explicit_refs(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        self.events
            .iter()
            .filter_map(|e| e.explicit_ref.as_deref())
            .filter(|r| seen.insert(*r))
            .map(str::to_string)
            .collect()
    }
}
