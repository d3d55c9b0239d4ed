//! Mean timeliness deltas over sibling artifacts

use crate::core::event::EventId;
use crate::core::temporal::{round3, Timestamp};
use serde::Serialize;

/// Successful artifact times of one parent, against its reference time
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinessInput {
    pub parent: EventId,
    pub reference: Timestamp,
    pub times: Vec<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinessPoint {
    pub parent: EventId,
    pub reference: Timestamp,
    /// Rounded to 3 decimals
    pub mean_delta_minutes: f64,
    pub samples: usize,
}

/// Arithmetic mean of `time - reference` in minutes, `None` when empty
pub fn mean_delta_minutes(reference: Timestamp, times: &[Timestamp]) -> Option<f64> {
    if times.is_empty() {
        return None;
    }
    let sum: f64 = times.iter().map(|t| t.minutes_since(reference)).sum();
    Some(sum / times.len() as f64)
}

/// One point per parent that has at least one successful artifact.
///
/// Parents without any are left out of the series rather than reported as
/// zero.
pub fn timeliness_series<I>(parents: I) -> Vec<TimelinessPoint>
where
    I: IntoIterator<Item = TimelinessInput>,
{
    parents
        .into_iter()
        .filter_map(|input| {
            let mean = mean_delta_minutes(input.reference, &input.times)?;
            Some(TimelinessPoint {
                parent: input.parent,
                reference: input.reference,
                mean_delta_minutes: round3(mean),
                samples: input.times.len(),
            })
        })
        .collect()
}
