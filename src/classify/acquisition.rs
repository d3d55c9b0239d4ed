//! Playback acquisition classification

use super::{planned, reduce_children, status_enum, text_or_na, ChildReduction, Classification, Classifier, Status, Tag};
use crate::config::AcquisitionPolicy;
use crate::core::event::Event;
use crate::index::segment::{intersects, segments_of};
use crate::navigator::{Hop, Navigator};

status_enum! {
    /// Reception state of a planned playback
    AcquisitionStatus {
        Received => "RECEIVED",
        Incomplete => "INCOMPLETE",
        Missing => "MISSING",
    }
    ok: Received
}

/// Classifies playbacks from the per-channel validity events pointing at them
pub struct AcquisitionClassifier {
    policy: AcquisitionPolicy,
}

impl AcquisitionClassifier {
    pub fn new(policy: AcquisitionPolicy) -> Self {
        Self { policy }
    }

    fn channel_status(&self, channel: &Event) -> AcquisitionStatus {
        let status = channel.get_text(&self.policy.status.attribute);
        if self.policy.status.is_missing(status) {
            AcquisitionStatus::Missing
        } else if self.policy.status.is_incomplete(status) {
            AcquisitionStatus::Incomplete
        } else {
            AcquisitionStatus::Received
        }
    }

    fn station(&self, nav: &Navigator<'_>, planned: &Event, classification: &mut Classification<AcquisitionStatus>) -> String {
        match nav.resolve_first(planned, &self.policy.station_links) {
            Hop::Found(schedule) => schedule.attributes.text_or_na(&self.policy.station_attribute),
            Hop::Absent => "N/A".to_string(),
            Hop::Unresolved(reference) => {
                classification.unresolved(reference);
                "N/A".to_string()
            }
        }
    }
}

impl Classifier for AcquisitionClassifier {
    type Status = AcquisitionStatus;

    fn classify(&self, event: &Event, nav: &Navigator<'_>) -> Classification<AcquisitionStatus> {
        let mut classification = Classification::new(event.id, AcquisitionStatus::Missing);
        classification.detail("satellite", event.satellite.as_str());

        let Some(planned) = planned(nav, event, &self.policy.planned_links, &mut classification) else {
            classification.detail("station", "N/A");
            return classification;
        };

        let station = self.station(nav, planned, &mut classification);
        classification.detail("station", station);
        classification.detail("playback_type", text_or_na(planned, "playback_type"));
        classification.detail("playback_mean", text_or_na(planned, "playback_mean"));
        classification.detail("plan_file", planned.source.as_deref().unwrap_or("N/A"));
        if let Some(orbit) = planned.get_number("downlink_orbit").or_else(|| planned.get_number("start_orbit")) {
            classification.detail("orbit", format!("{}", orbit as i64));
        }
        if let Hop::Found(corrected) = nav.resolve_first(planned, &[self.policy.correction_link.as_str()]) {
            classification.detail("corrected_playback", corrected.id.to_string());
        }

        let channels = nav.linking(planned, &self.policy.child_link);
        let statuses: Vec<AcquisitionStatus> = channels.iter().map(|c| self.channel_status(c)).collect();
        classification.status = match reduce_children(&statuses, |s| s.is_ok()) {
            ChildReduction::NoChildren => AcquisitionStatus::Missing,
            ChildReduction::AllOk => AcquisitionStatus::Received,
            ChildReduction::AllFailed(status) => status,
            ChildReduction::Partial => AcquisitionStatus::Incomplete,
        };
        classification.metric("channels", channels.len() as f64);
        classification.metric(
            "channels_received",
            statuses.iter().filter(|s| s.is_ok()).count() as f64,
        );

        let channel_segments = segments_of(channels.iter().copied());
        let gapped = self
            .policy
            .gap_kinds
            .iter()
            .any(|kind| intersects(&channel_segments, &nav.snapshot().segments(kind, &event.satellite)));
        if gapped {
            classification.tag(Tag::Gaps);
        }

        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{EventId, Link};
    use crate::core::temporal::Timestamp;
    use crate::storage::snapshot::Snapshot;

    struct Scenario {
        snapshot: Snapshot,
        acquisition: Event,
    }

    fn event(kind: &str, start: i64, stop: i64) -> Event {
        Event::new(kind, Timestamp::from_secs(start), Timestamp::from_secs(stop), "S2A").unwrap()
    }

    /// A corrected playback linked to its plan, with one validity event per channel status
    fn scenario(channel_statuses: &[&str]) -> Scenario {
        let mut snapshot = Snapshot::new();
        let acquisition = event("PLANNED_PLAYBACK_CORRECTION", 0, 600);
        let planned = Event::builder("PLANNED_PLAYBACK", Timestamp::from_secs(0), Timestamp::from_secs(600), "S2A")
            .attr("playback_type", "NOMINAL")
            .attr("downlink_orbit", 16077.0)
            .source("S2A_NPPF.EOF")
            .build()
            .unwrap();
        let schedule = Event::builder("STATION_SCHEDULE", Timestamp::from_secs(0), Timestamp::from_secs(600), "S2A")
            .attr("station", "SGS_")
            .build()
            .unwrap();
        snapshot.insert_link(Link::new("PLANNED_PLAYBACK", acquisition.id, planned.id));
        snapshot.insert_link(Link::new("STATION_SCHEDULE", planned.id, schedule.id));

        for (channel, status) in channel_statuses.iter().enumerate() {
            let validity = Event::builder(
                &format!("PLAYBACK_VALIDITY_{}", channel + 2),
                Timestamp::from_secs(10),
                Timestamp::from_secs(590),
                "S2A",
            )
            .attr("status", *status)
            .build()
            .unwrap();
            snapshot.insert_link(Link::new("PLAYBACK_VALIDITY", validity.id, planned.id));
            snapshot.insert_event(validity);
        }
        snapshot.insert_primary(acquisition.clone());
        snapshot.insert_event(planned);
        snapshot.insert_event(schedule);

        Scenario { snapshot, acquisition }
    }

    fn classify(scenario: &Scenario) -> Classification<AcquisitionStatus> {
        let classifier = AcquisitionClassifier::new(AcquisitionPolicy::default());
        classifier.classify(&scenario.acquisition, &Navigator::new(&scenario.snapshot))
    }

    #[test]
    fn test_received_when_every_channel_is_ok() {
        let scenario = scenario(&["COMPLETE"]);
        let result = classify(&scenario);

        assert_eq!(result.status, AcquisitionStatus::Received);
        assert!(result.diagnostics.is_empty());
        assert!(result.tags.is_empty());
        assert_eq!(result.details["station"], "SGS_");
        assert_eq!(result.details["orbit"], "16077");
        assert_eq!(result.details["plan_file"], "S2A_NPPF.EOF");
        assert_eq!(result.metrics["channels"], 1.0);
    }

    #[test]
    fn test_missing_when_artifact_removed() {
        let result = classify(&scenario(&[]));
        assert_eq!(result.status, AcquisitionStatus::Missing);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_incomplete_when_one_of_two_channels_missing() {
        let result = classify(&scenario(&["COMPLETE", "MISSING"]));
        assert_eq!(result.status, AcquisitionStatus::Incomplete);
        assert_eq!(result.metrics["channels_received"], 1.0);
    }

    #[test]
    fn test_all_channels_failing_identically() {
        assert_eq!(classify(&scenario(&["MISSING", "MISSING"])).status, AcquisitionStatus::Missing);
        assert_eq!(
            classify(&scenario(&["INCOMPLETE", "INCOMPLETE"])).status,
            AcquisitionStatus::Incomplete
        );
    }

    #[test]
    fn test_unplanned_event_is_missing() {
        let mut snapshot = Snapshot::new();
        let orphan = event("PLANNED_PLAYBACK_CORRECTION", 0, 10);
        snapshot.insert_primary(orphan.clone());

        let classifier = AcquisitionClassifier::new(AcquisitionPolicy::default());
        let result = classifier.classify(&orphan, &Navigator::new(&snapshot));
        assert_eq!(result.status, AcquisitionStatus::Missing);
        assert_eq!(result.details["station"], "N/A");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_dangling_plan_is_a_diagnostic_not_a_status() {
        let mut snapshot = Snapshot::new();
        let orphan = event("PLANNED_PLAYBACK_CORRECTION", 0, 10);
        let ghost = EventId::new();
        snapshot.insert_link(Link::new("PLANNED_PLAYBACK", orphan.id, ghost));
        snapshot.insert_primary(orphan.clone());

        let classifier = AcquisitionClassifier::new(AcquisitionPolicy::default());
        let result = classifier.classify(&orphan, &Navigator::new(&snapshot));
        assert_eq!(result.status, AcquisitionStatus::Missing);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn test_gaps_tag_is_orthogonal() {
        let mut scenario = scenario(&["COMPLETE"]);
        scenario.snapshot.insert_event(event("PLAYBACK_GAP", 100, 110));
        let mut elsewhere = event("PLAYBACK_GAP", 100, 110);
        elsewhere.satellite = "S2B".to_string();
        scenario.snapshot.insert_event(elsewhere);

        let result = classify(&scenario);
        assert_eq!(result.status, AcquisitionStatus::Received);
        assert!(result.has_tag(Tag::Gaps));
    }

    #[test]
    fn test_gap_touching_channel_is_not_a_gap() {
        let mut scenario = scenario(&["COMPLETE"]);
        scenario.snapshot.insert_event(event("ISP_GAP", 590, 600));
        assert!(!classify(&scenario).has_tag(Tag::Gaps));
    }

    #[test]
    fn test_classification_is_idempotent() {
        let scenario = scenario(&["COMPLETE", "MISSING"]);
        assert_eq!(classify(&scenario), classify(&scenario));
    }
}
