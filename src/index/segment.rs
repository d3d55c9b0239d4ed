//! Segment intersection over time ranges
//!
//! Segments are transient `(start, stop, owner)` triples derived from events
//! on demand. Overlap is strict: `a.start < b.stop && b.start < a.stop`, so
//! touching segments never intersect.

use crate::core::event::{Event, EventId};
use crate::core::temporal::Timestamp;
use serde::{Deserialize, Serialize};

/// Time range owned by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start: Timestamp,
    pub stop: Timestamp,
    pub owner: EventId,
}

impl Segment {
    pub fn new(start: Timestamp, stop: Timestamp, owner: EventId) -> Self {
        Self { start, stop, owner }
    }

    pub fn from_event(event: &Event) -> Self {
        Self::new(event.start, event.stop, event.id)
    }

    /// Length in nanoseconds
    pub fn len_nanos(&self) -> i64 {
        self.stop.as_nanos() - self.start.as_nanos()
    }

    pub fn overlaps(&self, other: &Segment) -> bool {
        self.start < other.stop && other.start < self.stop
    }
}

/// Convert a list of events into segments, keeping their order
pub fn segments_of<'a, I>(events: I) -> Vec<Segment>
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().map(Segment::from_event).collect()
}

/// One overlapping pair produced by [`intersect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlap {
    /// Owner of the segment taken from the first set
    pub first: EventId,
    /// Owner of the segment taken from the second set
    pub second: EventId,
    pub start: Timestamp,
    pub stop: Timestamp,
}

/// Pairs of overlapping segments, in the order `a` is iterated, then `b`.
pub fn intersect(a: &[Segment], b: &[Segment]) -> Vec<Overlap> {
    a.iter()
        .flat_map(|sa| {
            b.iter().filter(|sb| sa.overlaps(sb)).map(move |sb| Overlap {
                first: sa.owner,
                second: sb.owner,
                start: sa.start.max(sb.start),
                stop: sa.stop.min(sb.stop),
            })
        })
        .collect()
}

/// Whether any segment of `a` overlaps any segment of `b`
pub fn intersects(a: &[Segment], b: &[Segment]) -> bool {
    a.iter().any(|sa| b.iter().any(|sb| sa.overlaps(sb)))
}

/// Nanoseconds of `target` covered by the union of `covers`
pub fn covered_nanos(target: &Segment, covers: &[Segment]) -> i64 {
    let mut clipped: Vec<(Timestamp, Timestamp)> = covers
        .iter()
        .filter(|c| c.overlaps(target))
        .map(|c| (c.start.max(target.start), c.stop.min(target.stop)))
        .collect();
    clipped.sort();

    let (total, last) = clipped.into_iter().fold(
        (0i64, None::<(Timestamp, Timestamp)>),
        |(total, current), (start, stop)| match current {
            Some((cur_start, cur_stop)) if start <= cur_stop => {
                (total, Some((cur_start, cur_stop.max(stop))))
            }
            Some((cur_start, cur_stop)) => (
                total + (cur_stop.as_nanos() - cur_start.as_nanos()),
                Some((start, stop)),
            ),
            None => (total, Some((start, stop))),
        },
    );

    total + last.map_or(0, |(start, stop)| stop.as_nanos() - start.as_nanos())
}
