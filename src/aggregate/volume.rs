//! Cumulative data volume by sensing identifier

use crate::config::VolumePolicy;
use crate::core::event::Event;
use crate::core::temporal::Timestamp;
use crate::navigator::Navigator;
use serde::Serialize;
use std::collections::BTreeMap;

/// Datastrips sharing one sensing identifier
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGroup {
    pub key: String,
    pub start: Timestamp,
    /// Sum of the sizes of the group's datastrips; unsized ones count as zero
    pub size: f64,
    pub datastrips: Vec<String>,
    pub datatakes: Vec<String>,
}

/// One point of the cumulative series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumePoint {
    pub x: Timestamp,
    pub y: f64,
    pub group: String,
    pub group_size: f64,
    pub datastrips: Vec<String>,
    pub datatakes: Vec<String>,
}

/// Group datastrip events by their sensing identifier annotation.
///
/// A datastrip without one forms a group of its own keyed by its name.
/// Events without an explicit reference carry no product and are skipped.
pub fn volume_groups<'a, I>(nav: &Navigator<'_>, datastrips: I, policy: &VolumePolicy) -> Vec<VolumeGroup>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut groups: BTreeMap<String, VolumeGroup> = BTreeMap::new();

    for event in datastrips {
        let Some(datastrip) = event.explicit_ref.as_deref() else {
            continue;
        };
        if groups.values().any(|g| g.datastrips.iter().any(|d| d == datastrip)) {
            continue;
        }
        let key = first_text(nav, datastrip, &policy.sensing_annotation, &policy.sensing_attribute)
            .unwrap_or(datastrip)
            .to_string();
        // Only the first size annotation counts; later ones repeat the history.
        let size = nav
            .annotations(datastrip, &policy.size_annotation)
            .first()
            .and_then(|a| a.attributes.get_number(&policy.size_attribute))
            .unwrap_or(0.0);
        let datatake = first_text(nav, datastrip, &policy.datatake_annotation, &policy.datatake_attribute);

        let group = groups.entry(key.clone()).or_insert_with(|| VolumeGroup {
            key,
            start: event.start,
            size: 0.0,
            datastrips: Vec::new(),
            datatakes: Vec::new(),
        });
        group.start = group.start.min(event.start);
        group.size += size;
        group.datastrips.push(datastrip.to_string());
        if let Some(datatake) = datatake {
            if !group.datatakes.iter().any(|d| d == datatake) {
                group.datatakes.push(datatake.to_string());
            }
        }
    }

    groups.into_values().collect()
}

/// Fold group sums into a running total, in chronological group order.
///
/// Every group yields a point, including empty ones, so the series is as
/// long as the input and never decreases for non-negative sizes.
pub fn cumulative_volume(mut groups: Vec<VolumeGroup>) -> Vec<VolumePoint> {
    groups.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.key.cmp(&b.key)));
    groups
        .into_iter()
        .scan(0.0_f64, |total, group| {
            *total += group.size;
            Some(VolumePoint {
                x: group.start,
                y: *total,
                group: group.key,
                group_size: group.size,
                datastrips: group.datastrips,
                datatakes: group.datatakes,
            })
        })
        .collect()
}

fn first_text<'a>(nav: &Navigator<'a>, explicit_ref: &str, annotation: &str, attribute: &str) -> Option<&'a str> {
    nav.snapshot()
        .annotations(explicit_ref)
        .iter()
        .filter(|a| a.name == annotation)
        .find_map(|a| a.attributes.get_text(attribute))
}
