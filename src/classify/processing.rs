//! Datastrip processing classification with SAD coverage

use super::{planned, status_enum, Classification, Classifier};
use crate::config::ProcessingPolicy;
use crate::core::event::Event;
use crate::index::segment::{covered_nanos, segments_of, Segment};
use crate::navigator::Navigator;

status_enum! {
    /// Processing state of one datastrip
    ProcessingStatus {
        Complete => "COMPLETE",
        MissingSad => "MISSING-SAD",
        PartialSad => "PARTIAL-SAD",
        Incomplete => "INCOMPLETE",
        Missing => "MISSING",
    }
    ok: Complete
}

pub struct ProcessingClassifier {
    policy: ProcessingPolicy,
}

impl ProcessingClassifier {
    pub fn new(policy: ProcessingPolicy) -> Self {
        Self { policy }
    }
}

/// Fraction of `target` covered by `covers`.
///
/// A zero-length target counts as covered when any cover contains it.
fn coverage(target: &Segment, covers: &[Segment]) -> f64 {
    let len = target.len_nanos();
    if len == 0 {
        let contained = covers
            .iter()
            .any(|c| c.start <= target.start && target.stop <= c.stop);
        return if contained { 1.0 } else { 0.0 };
    }
    covered_nanos(target, covers) as f64 / len as f64
}

impl Classifier for ProcessingClassifier {
    type Status = ProcessingStatus;

    fn classify(&self, event: &Event, nav: &Navigator<'_>) -> Classification<ProcessingStatus> {
        let mut classification = Classification::new(event.id, ProcessingStatus::Missing);
        classification.detail("satellite", event.satellite.as_str());
        if let Some(datastrip) = &event.explicit_ref {
            classification.detail("datastrip", datastrip.as_str());
        }

        let Some(isp_validity) = planned(nav, event, &self.policy.parent_links, &mut classification) else {
            return classification;
        };

        let own = event.get_text(&self.policy.status.attribute);
        if self.policy.status.is_missing(own) {
            return classification;
        }
        if self.policy.status.is_incomplete(own) {
            classification.status = ProcessingStatus::Incomplete;
            return classification;
        }

        let sad = nav.resolve_all(isp_validity, &[self.policy.sad_link.as_str()]);
        for reference in sad.unresolved {
            classification.unresolved(reference);
        }
        let covered = coverage(&Segment::from_event(event), &segments_of(sad.found.iter().copied()));
        classification.metric("sad_coverage", covered);
        classification.status = if covered <= 0.0 {
            ProcessingStatus::MissingSad
        } else if covered >= 1.0 {
            ProcessingStatus::Complete
        } else {
            ProcessingStatus::PartialSad
        };

        classification
    }
}
