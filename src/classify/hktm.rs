//! Housekeeping telemetry circulation and timeliness

use super::{status_enum, Classification, Classifier, Tag};
use crate::config::HktmPolicy;
use crate::core::event::Event;
use crate::core::temporal::{round3, Timestamp};
use crate::index::segment::{intersect, Segment};
use crate::navigator::{Hop, Navigator};
use crate::storage::store::EventFilter;

status_enum! {
    /// Circulation state of one HKTM playback
    HktmStatus {
        Ok => "OK",
        PendingAcquisition => "PENDING_ACQUISITION",
        MissingCirculation => "MISSING_CIRCULATION",
        MissingProduction => "MISSING_PRODUCTION",
        PlaybackNotPlanned => "PLAYBACK_NOT_PLANNED",
    }
    ok: Ok
}

pub struct HktmClassifier {
    policy: HktmPolicy,
}

impl HktmClassifier {
    pub fn new(policy: HktmPolicy) -> Self {
        Self { policy }
    }

    /// Orbit whose ascending node crossing precedes the playback
    fn anx_orbit<'a>(&self, event: &Event, nav: &Navigator<'a>) -> Option<&'a Event> {
        let playback = [Segment::from_event(event)];
        self.policy.orbit_kinds.iter().find_map(|kind| {
            let orbits = nav.snapshot().segments(kind, &event.satellite);
            intersect(&playback, &orbits)
                .first()
                .and_then(|overlap| nav.event(&overlap.second))
        })
    }

    /// OK, MISSING or N/A over the acquisition evidence of a playback
    fn completeness(&self, evidence: &[&Event]) -> &'static str {
        if evidence.is_empty() {
            "N/A"
        } else if evidence
            .iter()
            .any(|e| self.policy.status.is_missing(e.get_text(&self.policy.status.attribute)))
        {
            "MISSING"
        } else {
            "OK"
        }
    }

    /// Orbits of the snapshot that no HKTM playback overlaps
    pub fn unplanned_orbits(&self, nav: &Navigator<'_>) -> Vec<Classification<HktmStatus>> {
        let snapshot = nav.snapshot();
        let playbacks: Vec<&Event> = snapshot.primary_events().filter(|e| self.accepts(e)).collect();
        let filter = EventFilter::new().kinds(self.policy.orbit_kinds.iter());

        let mut orbits: Vec<&Event> = snapshot.events_matching(&filter).collect();
        orbits.sort_by(|a, b| (&a.satellite, a.start, a.id).cmp(&(&b.satellite, b.start, b.id)));
        orbits
            .into_iter()
            .filter(|orbit| {
                let segment = Segment::from_event(orbit);
                !playbacks
                    .iter()
                    .any(|p| p.satellite == orbit.satellite && segment.overlaps(&Segment::from_event(p)))
            })
            .map(|orbit| {
                let mut classification = Classification::new(orbit.id, HktmStatus::PlaybackNotPlanned);
                classification.detail("satellite", orbit.satellite.as_str());
                classification.detail("anx", orbit.start.to_string());
                if let Some(number) = orbit.get_number("orbit") {
                    classification.detail("orbit", format!("{}", number as i64));
                }
                classification
            })
            .collect()
    }
}

impl Classifier for HktmClassifier {
    type Status = HktmStatus;

    fn accepts(&self, event: &Event) -> bool {
        event
            .get_text(&self.policy.playback_type_attribute)
            .map_or(false, |t| self.policy.playback_types.iter().any(|p| p == t))
    }

    fn classify(&self, event: &Event, nav: &Navigator<'_>) -> Classification<HktmStatus> {
        let mut classification = Classification::new(event.id, HktmStatus::PendingAcquisition);
        classification.detail("satellite", event.satellite.as_str());
        classification.detail(
            "playback_type",
            event.attributes.text_or_na(&self.policy.playback_type_attribute),
        );
        let station = match nav.resolve_first(event, &self.policy.station_links) {
            Hop::Found(schedule) => schedule.attributes.text_or_na(&self.policy.station_attribute),
            Hop::Absent => "N/A".to_string(),
            Hop::Unresolved(reference) => {
                classification.unresolved(reference);
                "N/A".to_string()
            }
        };
        classification.detail("station", station);

        let anx = self.anx_orbit(event, nav).map(|orbit| orbit.start);
        if let Some(anx) = anx {
            classification.detail("anx", anx.to_string());
        }

        let mut evidence: Vec<&Event> = Vec::new();
        for name in &self.policy.acquisition_links {
            evidence.extend(nav.linking(event, name));
        }
        classification.detail("completeness", self.completeness(&evidence));

        let production = nav.resolve_all(event, &[self.policy.production_link.as_str()]);
        for reference in production.unresolved {
            classification.unresolved(reference);
        }
        if production.found.is_empty() {
            classification.status = if evidence.is_empty() {
                HktmStatus::PendingAcquisition
            } else {
                HktmStatus::MissingProduction
            };
            return classification;
        }

        let circulation = production.found.iter().find_map(|product| {
            let reference = product.explicit_ref.as_deref()?;
            nav.annotation_matching(
                reference,
                &self.policy.circulation_annotation,
                &self.policy.destination_attribute,
                &self.policy.destination_prefix,
            )
        });
        let Some(circulation) = circulation else {
            classification.status = HktmStatus::MissingCirculation;
            return classification;
        };
        classification.status = HktmStatus::Ok;

        let circulated_at: Option<Timestamp> = circulation
            .attributes
            .get_timestamp(&self.policy.circulation_time_attribute);
        if let Some(at) = circulated_at {
            classification.detail("circulation_time", at.to_string());
        }
        if let Some(size) = circulation.attributes.get_number(&self.policy.product_size_attribute) {
            classification.metric("product_size", size);
        }
        if let (Some(at), Some(anx)) = (circulated_at, anx) {
            let delta = round3(at.minutes_since(anx));
            classification.metric("delta_to_fos_minutes", delta);
            if delta > self.policy.timeliness_threshold_minutes {
                classification.tag(Tag::TimelinessExceeded);
            }
        }

        classification
    }
}
