//! Temporal index for window queries over event intervals

use crate::core::event::Event;
use crate::core::temporal::{TimeWindow, Timestamp};
use std::collections::BTreeMap;

/// Index of event offsets keyed by start time.
///
/// Also tracks the longest indexed interval so a window query only has to
/// scan starts in `[window.start - longest, window.stop]`.
pub struct TemporalIndex {
    /// Map from start timestamp to event offsets
    time_index: BTreeMap<Timestamp, Vec<usize>>,
    longest_nanos: i64,
}

impl TemporalIndex {
    pub fn new() -> Self {
        Self {
            time_index: BTreeMap::new(),
            longest_nanos: 0,
        }
    }

    pub fn add_event(&mut self, event: &Event, offset: usize) {
        self.longest_nanos = self
            .longest_nanos
            .max(event.stop.as_nanos() - event.start.as_nanos());
        self.time_index
            .entry(event.start)
            .or_insert_with(Vec::new)
            .push(offset);
    }

    /// Offsets of events whose start could place them inside `window`.
    ///
    /// Callers still check the exact overlap; this only prunes by start time.
    pub fn candidates(&self, window: &TimeWindow) -> Vec<usize> {
        let lower = window.start.add_nanos(-self.longest_nanos);
        self.time_index
            .range(lower..=window.stop)
            .flat_map(|(_, offsets)| offsets.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.time_index.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.time_index.is_empty()
    }
}

impl Default for TemporalIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(start: i64, stop: i64) -> Event {
        Event::new("X", Timestamp::from_secs(start), Timestamp::from_secs(stop), "S2A").unwrap()
    }

    #[test]
    fn test_candidates_include_long_events_started_before_window() {
        let mut index = TemporalIndex::new();
        index.add_event(&event(0, 1000), 0);
        index.add_event(&event(500, 510), 1);
        index.add_event(&event(3000, 3010), 2);

        let window = TimeWindow::new(Timestamp::from_secs(900), Timestamp::from_secs(950)).unwrap();
        let mut found = index.candidates(&window);
        found.sort();
        assert_eq!(found, vec![0, 1]);
        assert_eq!(index.len(), 3);
    }
}
