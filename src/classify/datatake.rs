//! Datatake completeness across sibling processing events

use super::{planned, reduce_children, status_enum, ChildReduction, Classification, Classifier, Status};
use crate::config::DatatakePolicy;
use crate::core::event::Event;
use crate::navigator::Navigator;

status_enum! {
    /// Completeness of one datatake at one processing level
    DatatakeStatus {
        Complete => "COMPLETE",
        Incomplete => "INCOMPLETE",
        Missing => "MISSING",
    }
    ok: Complete
}

pub struct DatatakeClassifier {
    policy: DatatakePolicy,
}

impl DatatakeClassifier {
    pub fn new(policy: DatatakePolicy) -> Self {
        Self { policy }
    }

    fn sibling_status(&self, sibling: &Event) -> DatatakeStatus {
        let status = sibling.get_text(&self.policy.status.attribute);
        if self.policy.status.is_missing(status) {
            DatatakeStatus::Missing
        } else if self.policy.status.is_incomplete(status) {
            DatatakeStatus::Incomplete
        } else {
            DatatakeStatus::Complete
        }
    }
}

impl Classifier for DatatakeClassifier {
    type Status = DatatakeStatus;

    fn classify(&self, event: &Event, nav: &Navigator<'_>) -> Classification<DatatakeStatus> {
        let mut classification = Classification::new(event.id, DatatakeStatus::Missing);
        classification.detail("satellite", event.satellite.as_str());

        let Some(imaging) = planned(nav, event, &self.policy.planned_links, &mut classification) else {
            return classification;
        };
        classification.detail("plan_file", imaging.source.as_deref().unwrap_or("N/A"));
        if let Some(datatake) = imaging.get_text("datatake_id") {
            classification.detail("datatake", datatake);
        }

        // Siblings may point at the plan through any of the fallback names.
        let mut siblings: Vec<&Event> = Vec::new();
        for name in &self.policy.planned_links {
            for sibling in nav.linking(imaging, name) {
                if sibling.kind == event.kind && !siblings.iter().any(|s| s.id == sibling.id) {
                    siblings.push(sibling);
                }
            }
        }
        if !siblings.iter().any(|s| s.id == event.id) {
            siblings.push(event);
        }
        siblings.sort_by_key(|s| (s.start, s.id));

        let statuses: Vec<DatatakeStatus> = siblings.iter().map(|s| self.sibling_status(s)).collect();
        classification.status = match reduce_children(&statuses, |s| s.is_ok()) {
            ChildReduction::NoChildren => DatatakeStatus::Missing,
            ChildReduction::AllOk => DatatakeStatus::Complete,
            ChildReduction::AllFailed(status) => status,
            ChildReduction::Partial => DatatakeStatus::Incomplete,
        };
        classification.metric("segments", siblings.len() as f64);
        classification.metric(
            "segments_complete",
            statuses.iter().filter(|s| s.is_ok()).count() as f64,
        );

        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Link;
    use crate::core::temporal::Timestamp;
    use crate::storage::snapshot::Snapshot;

    const KIND: &str = "PLANNED_IMAGING_PROCESSING_COMPLETENESS_L1C";

    fn build(statuses: &[&str]) -> (Snapshot, Vec<Event>) {
        let mut snapshot = Snapshot::new();
        let imaging = Event::builder("PLANNED_CUT_IMAGING", Timestamp::from_secs(0), Timestamp::from_secs(300), "S2A")
            .attr("datatake_id", "GS2A_20180721T085229_016077_N02.06")
            .build()
            .unwrap();
        let mut segments = Vec::new();
        for (i, status) in statuses.iter().enumerate() {
            let start = i as i64 * 100;
            let segment = Event::builder(KIND, Timestamp::from_secs(start), Timestamp::from_secs(start + 100), "S2A")
                .attr("status", *status)
                .build()
                .unwrap();
            // Missing segments are linked by the generic name.
            let link = if *status == "MISSING" { "PLANNED_EVENT" } else { "PLANNED_IMAGING" };
            snapshot.insert_link(Link::new(link, segment.id, imaging.id));
            snapshot.insert_primary(segment.clone());
            segments.push(segment);
        }
        let other_level = Event::builder(
            "PLANNED_IMAGING_PROCESSING_COMPLETENESS_L2A",
            Timestamp::from_secs(0),
            Timestamp::from_secs(300),
            "S2A",
        )
        .attr("status", "MISSING")
        .build()
        .unwrap();
        snapshot.insert_link(Link::new("PLANNED_IMAGING", other_level.id, imaging.id));
        snapshot.insert_event(other_level);
        snapshot.insert_event(imaging);
        (snapshot, segments)
    }

    fn classify(snapshot: &Snapshot, event: &Event) -> Classification<DatatakeStatus> {
        DatatakeClassifier::new(DatatakePolicy::default()).classify(event, &Navigator::new(snapshot))
    }

    #[test]
    fn test_all_segments_complete() {
        let (snapshot, segments) = build(&["COMPLETE", "COMPLETE", "COMPLETE"]);
        let result = classify(&snapshot, &segments[1]);
        assert_eq!(result.status, DatatakeStatus::Complete);
        assert_eq!(result.metrics["segments"], 3.0);
        assert_eq!(result.details["datatake"], "GS2A_20180721T085229_016077_N02.06");
    }

    #[test]
    fn test_mixed_segments_are_incomplete_for_every_sibling() {
        let (snapshot, segments) = build(&["COMPLETE", "MISSING", "COMPLETE"]);
        for segment in &segments {
            assert_eq!(classify(&snapshot, segment).status, DatatakeStatus::Incomplete);
        }
    }

    #[test]
    fn test_all_missing() {
        let (snapshot, segments) = build(&["MISSING", "MISSING"]);
        assert_eq!(classify(&snapshot, &segments[0]).status, DatatakeStatus::Missing);
    }

    #[test]
    fn test_unplanned_segment() {
        let mut snapshot = Snapshot::new();
        let orphan = Event::new(KIND, Timestamp::from_secs(0), Timestamp::from_secs(1), "S2A").unwrap();
        snapshot.insert_primary(orphan.clone());
        assert_eq!(classify(&snapshot, &orphan).status, DatatakeStatus::Missing);
    }
}
