//! Catalogue, dissemination and publication completeness of datastrips

use super::{planned, reduce_children, status_enum, ChildReduction, Classification, Classifier, Status};
use crate::aggregate::timeliness::{mean_delta_minutes, TimelinessInput};
use crate::config::DhusPolicy;
use crate::core::event::{Event, Geometry};
use crate::core::temporal::Timestamp;
use crate::index::segment::{intersect, segments_of, Segment};
use crate::navigator::{Hop, Navigator};
use serde::Serialize;

status_enum! {
    /// Publication state of one datastrip
    DhusStatus {
        Complete => "COMPLETE",
        MissingDissemination => "MISSING DISSEMINATION",
        IncompleteDissemination => "INCOMPLETE DISSEMINATION",
        MissingPublication => "MISSING PUBLICATION",
        MissingDamPublication => "MISSING DAM PUBLICATION",
        MissingProcessing => "MISSING PROCESSING",
        MissingAcquisition => "MISSING ACQUISITION",
    }
    ok: Complete
}

status_enum! {
    /// Furthest step reached by one tile
    TileStatus {
        Ok => "OK",
        MissingDhusPublication => "MISSING DHUS PUBLICATION",
        MissingDhusDissemination => "MISSING DHUS DISSEMINATION",
        MissingDamPublication => "MISSING DAM PUBLICATION",
    }
    ok: Ok
}

/// Outcome for one tile of a datastrip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileOutcome {
    pub tile: String,
    pub status: TileStatus,
    pub published_at: Option<Timestamp>,
    pub footprint: Vec<Geometry>,
}

pub struct DhusClassifier {
    policy: DhusPolicy,
}

impl DhusClassifier {
    pub fn new(policy: DhusPolicy) -> Self {
        Self { policy }
    }

    /// Whether the first annotation of a name exists and is not flagged missing
    fn reached(&self, nav: &Navigator<'_>, tile: &str, annotation: &str) -> bool {
        nav.annotations(tile, annotation)
            .first()
            .map_or(false, |a| a.is_successful(&self.policy.status.missing))
    }

    fn tile(&self, nav: &Navigator<'_>, tile: &str) -> TileOutcome {
        let status = if self.reached(nav, tile, &self.policy.publication_annotation) {
            TileStatus::Ok
        } else if self.reached(nav, tile, &self.policy.dissemination_annotation) {
            TileStatus::MissingDhusPublication
        } else if self.reached(nav, tile, &self.policy.cataloging_annotation) {
            TileStatus::MissingDhusDissemination
        } else {
            TileStatus::MissingDamPublication
        };
        let published_at = match status {
            // Earliest publication when the history holds several
            TileStatus::Ok => nav
                .annotations(tile, &self.policy.publication_annotation)
                .into_iter()
                .filter_map(|a| a.attributes.get_timestamp(&self.policy.publication_time_attribute))
                .min(),
            _ => None,
        };
        let footprint = nav
            .annotations(tile, &self.policy.footprint_annotation)
            .into_iter()
            .flat_map(|a| a.geometries.iter().cloned())
            .collect();

        TileOutcome {
            tile: tile.to_string(),
            status,
            published_at,
            footprint,
        }
    }

    /// Per-tile outcomes of the datastrip described by `event`
    pub fn tiles(&self, event: &Event, nav: &Navigator<'_>) -> Vec<TileOutcome> {
        let Some(datastrip) = event.explicit_ref.as_deref() else {
            return Vec::new();
        };
        nav.ref_targets(datastrip, &self.policy.tile_link)
            .into_iter()
            .map(|tile| self.tile(nav, tile))
            .collect()
    }

    /// Published tile times of a datastrip against its corrected imaging stop
    pub fn timeliness_input(&self, event: &Event, nav: &Navigator<'_>) -> Option<TimelinessInput> {
        let reference = nav.resolve_chain(event, &self.policy.reference_chain).found()?.stop;
        Some(TimelinessInput {
            parent: event.id,
            reference,
            times: self.tiles(event, nav).iter().filter_map(|t| t.published_at).collect(),
        })
    }

    /// Split a datastrip that was never processed by what its acquisition shows
    fn missing_cause(&self, event: &Event, imaging: &Event, nav: &Navigator<'_>, classification: &mut Classification<DhusStatus>) -> DhusStatus {
        let isp = nav.resolve_all(imaging, &[self.policy.isp_completeness_link.as_str()]);
        for reference in isp.unresolved {
            classification.unresolved(reference);
        }
        let overlaps = intersect(&[Segment::from_event(event)], &segments_of(isp.found.iter().copied()));
        let acquisition_missing = overlaps.iter().any(|overlap| {
            nav.event(&overlap.second).map_or(false, |channel| {
                self.policy
                    .status
                    .is_missing(channel.get_text(&self.policy.status.attribute))
            })
        });
        if acquisition_missing {
            DhusStatus::MissingAcquisition
        } else {
            DhusStatus::MissingProcessing
        }
    }

    fn reference_time(&self, event: &Event, nav: &Navigator<'_>, classification: &mut Classification<DhusStatus>) -> Option<Timestamp> {
        match nav.resolve_chain(event, &self.policy.reference_chain) {
            Hop::Found(corrected) => Some(corrected.stop),
            Hop::Absent => None,
            Hop::Unresolved(reference) => {
                classification.unresolved(reference);
                None
            }
        }
    }
}

impl Classifier for DhusClassifier {
    type Status = DhusStatus;

    fn classify(&self, event: &Event, nav: &Navigator<'_>) -> Classification<DhusStatus> {
        let mut classification = Classification::new(event.id, DhusStatus::MissingAcquisition);
        classification.detail("satellite", event.satellite.as_str());
        if let Some(datastrip) = &event.explicit_ref {
            classification.detail("datastrip", datastrip.as_str());
        }

        let Some(imaging) = planned(nav, event, &self.policy.planned_links, &mut classification) else {
            return classification;
        };
        classification.detail("plan_file", imaging.source.as_deref().unwrap_or("N/A"));

        let own = event.get_text(&self.policy.status.attribute);
        if self.policy.status.is_missing(own) {
            let status = self.missing_cause(event, imaging, nav, &mut classification);
            classification.status = status;
            return classification;
        }

        let tiles = self.tiles(event, nav);
        let statuses: Vec<TileStatus> = tiles.iter().map(|t| t.status).collect();
        classification.status = match reduce_children(&statuses, |s| s.is_ok()) {
            ChildReduction::NoChildren => DhusStatus::MissingPublication,
            ChildReduction::AllOk => DhusStatus::Complete,
            ChildReduction::AllFailed(TileStatus::MissingDhusPublication) => DhusStatus::MissingPublication,
            ChildReduction::AllFailed(TileStatus::MissingDhusDissemination) => DhusStatus::MissingDissemination,
            ChildReduction::AllFailed(TileStatus::MissingDamPublication) => DhusStatus::MissingDamPublication,
            ChildReduction::AllFailed(TileStatus::Ok) => DhusStatus::Complete,
            ChildReduction::Partial => DhusStatus::IncompleteDissemination,
        };

        classification.metric("tiles", tiles.len() as f64);
        for (name, status) in [
            ("tiles_published", TileStatus::Ok),
            ("tiles_missing_publication", TileStatus::MissingDhusPublication),
            ("tiles_missing_dissemination", TileStatus::MissingDhusDissemination),
            ("tiles_missing_dam_publication", TileStatus::MissingDamPublication),
        ] {
            classification.metric(name, statuses.iter().filter(|s| **s == status).count() as f64);
        }

        if let Some(reference) = self.reference_time(event, nav, &mut classification) {
            let published: Vec<Timestamp> = tiles.iter().filter_map(|t| t.published_at).collect();
            if let Some(mean) = mean_delta_minutes(reference, &published) {
                classification.metric("mean_timeliness_minutes", mean);
            }
        }

        classification
    }
}
