//! Flat, serializable records handed to the rendering layer
//!
//! Projection never changes a result: it copies the status label and
//! severity out of the typed classification, rounds minute-denominated
//! numbers to 3 decimals and passes geometries through untouched.

use crate::aggregate::MacroStepSegment;
use crate::classify::{Classification, Diagnostic, Status, Tag};
use crate::core::event::{Event, Geometry};
use crate::core::temporal::{round3, Timestamp};
use crate::storage::snapshot::Snapshot;
use serde::Serialize;
use std::collections::BTreeMap;

/// Generic record shape consumed by tables, timelines and maps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub kind: String,
    pub satellite: String,
    pub classification: String,
    pub severity: u8,
    /// Most relevant secondary flag, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_tag: Option<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub duration_minutes: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub geometries: Vec<Geometry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Record {
    /// Project one classification of `event`
    pub fn from_classification<S: Status>(event: &Event, classification: &Classification<S>) -> Self {
        let metrics = classification
            .metrics
            .iter()
            .map(|(name, value)| {
                let value = if name.ends_with("_minutes") { round3(*value) } else { *value };
                (name.clone(), value)
            })
            .collect();

        Self {
            id: event.id.to_string(),
            kind: event.kind.clone(),
            satellite: event.satellite.clone(),
            classification: classification.status.to_string(),
            severity: classification.status.severity(),
            severity_tag: classification.tags.iter().copied().max(),
            tags: classification.tags.clone(),
            start: event.start,
            stop: event.stop,
            duration_minutes: round3(event.duration_minutes()),
            metrics,
            details: classification.details.clone(),
            geometries: event.geometries.clone(),
            diagnostics: classification.diagnostics.clone(),
        }
    }

    /// Replace the event geometries, e.g. with product footprints
    pub fn with_geometries(mut self, geometries: Vec<Geometry>) -> Self {
        self.geometries = geometries;
        self
    }
}

/// Project classifications in order; results whose event left the snapshot are dropped.
pub fn project<S: Status>(snapshot: &Snapshot, classifications: &[Classification<S>]) -> Vec<Record> {
    classifications
        .iter()
        .filter_map(|c| {
            let event = snapshot.event(&c.event_id);
            if event.is_none() {
                tracing::warn!(event_id = %c.event_id, "classified event not in snapshot");
            }
            event.map(|e| Record::from_classification(e, c))
        })
        .collect()
}

/// Macro-step row with its merged duration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroStepRecord {
    pub product: String,
    pub level: String,
    pub macro_step: String,
    pub workflow: Option<String>,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub duration_minutes: f64,
    pub micro_steps: usize,
    pub unknown: bool,
}

impl From<&MacroStepSegment> for MacroStepRecord {
    fn from(segment: &MacroStepSegment) -> Self {
        Self {
            product: segment.product.clone(),
            level: segment.level.clone(),
            macro_step: segment.macro_step.clone(),
            workflow: segment.workflow.clone(),
            start: segment.start,
            stop: segment.stop,
            duration_minutes: round3(segment.duration_minutes()),
            micro_steps: segment.micro_steps,
            unknown: segment.unknown,
        }
    }
}

pub fn project_macro_steps(segments: &[MacroStepSegment]) -> Vec<MacroStepRecord> {
    segments.iter().map(MacroStepRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{AcquisitionStatus, HktmStatus};
    use crate::core::event::EventId;

    fn event() -> Event {
        Event::builder("PLANNED_PLAYBACK", Timestamp::from_secs(0), Timestamp::from_secs(100), "S2A")
            .geometry("POLYGON ((10 10, 20 10, 20 20, 10 10))")
            .build()
            .unwrap()
    }

    #[test]
    fn test_record_carries_label_and_severity() {
        let event = event();
        let mut classification = Classification::new(event.id, AcquisitionStatus::Incomplete);
        classification.tag(Tag::Gaps);
        let record = Record::from_classification(&event, &classification);

        assert_eq!(record.classification, "INCOMPLETE");
        assert_eq!(record.severity, 1);
        assert_eq!(record.severity_tag, Some(Tag::Gaps));
        assert_eq!(record.duration_minutes, 1.667);
        assert_eq!(record.geometries, event.geometries);
    }

    #[test]
    fn test_minute_metrics_are_rounded() {
        let event = event();
        let mut classification = Classification::new(event.id, HktmStatus::Ok);
        classification.metric("delta_to_fos_minutes", 12.345_678);
        classification.metric("product_size", 1234.5678);
        let record = Record::from_classification(&event, &classification);

        assert_eq!(record.metrics["delta_to_fos_minutes"], 12.346);
        assert_eq!(record.metrics["product_size"], 1234.5678);
    }

    #[test]
    fn test_project_keeps_order_and_skips_unknown_events() {
        let mut snapshot = Snapshot::new();
        let first = event();
        let second = event();
        snapshot.insert_event(first.clone());
        snapshot.insert_event(second.clone());

        let classifications = vec![
            Classification::new(second.id, AcquisitionStatus::Missing),
            Classification::new(EventId::new(), AcquisitionStatus::Missing),
            Classification::new(first.id, AcquisitionStatus::Received),
        ];
        let records = project(&snapshot, &classifications);
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![second.id.to_string(), first.id.to_string()]);
    }

    #[test]
    fn test_empty_fields_are_omitted_from_json() {
        let event = Event::new("X", Timestamp::from_secs(0), Timestamp::from_secs(60), "S2B").unwrap();
        let record = Record::from_classification(&event, &Classification::new(event.id, HktmStatus::Ok));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["classification"], "OK");
        assert!(json.get("severity_tag").is_none());
        assert!(json.get("geometries").is_none());
    }
}
