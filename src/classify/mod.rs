//! Per-domain status classifiers
//!
//! Every classifier follows the same shape: resolve the planned
//! counterpart, look for the expected downstream artifacts, then reduce
//! multi-child evidence with [`reduce_children`]. Statuses are closed enums
//! whose declaration order is their severity order.

/// Declares the `Status`, `Display` and label plumbing for a status enum.
macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? } ok: $ok:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl $crate::classify::Status for $name {
            fn severity(&self) -> u8 {
                *self as u8
            }

            fn is_ok(&self) -> bool {
                matches!(self, $name::$ok)
            }
        }
    };
}

pub(crate) use status_enum;

pub mod acquisition;
pub mod datatake;
pub mod dhus;
pub mod hktm;
pub mod processing;

pub use acquisition::{AcquisitionClassifier, AcquisitionStatus};
pub use datatake::{DatatakeClassifier, DatatakeStatus};
pub use dhus::{DhusClassifier, DhusStatus, TileStatus};
pub use hktm::{HktmClassifier, HktmStatus};
pub use processing::{ProcessingClassifier, ProcessingStatus};

use crate::core::event::{Event, EventId};
use crate::navigator::{Hop, Navigator, UnresolvedReference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed per-domain status enumeration
pub trait Status:
    Copy + Eq + Ord + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static
{
    /// Position in the low-to-high severity order
    fn severity(&self) -> u8;

    /// Whether this status needs no operator attention
    fn is_ok(&self) -> bool;
}

/// Secondary defect flag; decorates a status without replacing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tag {
    /// A data gap overlaps the acquisition
    Gaps,
    /// A timeliness delta is above its configured threshold
    TimelinessExceeded,
}

/// Data-integrity problem found while classifying
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnostic {
    UnresolvedReference(UnresolvedReference),
}

/// Outcome of classifying one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification<S> {
    pub event_id: EventId,
    pub status: S,
    pub tags: Vec<Tag>,
    pub diagnostics: Vec<Diagnostic>,
    /// Numeric results, minutes and ratios
    pub metrics: BTreeMap<String, f64>,
    /// Descriptive fields for display
    pub details: BTreeMap<String, String>,
}

impl<S: Status> Classification<S> {
    pub fn new(event_id: EventId, status: S) -> Self {
        Self {
            event_id,
            status,
            tags: Vec::new(),
            diagnostics: Vec::new(),
            metrics: BTreeMap::new(),
            details: BTreeMap::new(),
        }
    }

    pub fn tag(&mut self, tag: Tag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn unresolved(&mut self, reference: UnresolvedReference) {
        tracing::warn!(
            event_id = %self.event_id,
            link = %reference.link,
            target = %reference.target,
            "unresolved reference"
        );
        let diagnostic = Diagnostic::UnresolvedReference(reference);
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    pub fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    pub fn detail(&mut self, name: &str, value: impl Into<String>) {
        self.details.insert(name.to_string(), value.into());
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// A pure classification function over a snapshot
pub trait Classifier: Send + Sync + 'static {
    type Status: Status;

    /// Whether a fetched primary event belongs to this domain
    fn accepts(&self, _event: &Event) -> bool {
        true
    }

    fn classify(&self, event: &Event, nav: &Navigator<'_>) -> Classification<Self::Status>;
}

/// Tri-state reduction of child outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildReduction<S> {
    /// No children at all; never silently complete
    NoChildren,
    AllOk,
    /// Every child failed with this same status
    AllFailed(S),
    Partial,
}

/// Reduce child statuses to all-ok, all-failed-identically or partial.
pub fn reduce_children<S, F>(statuses: &[S], is_ok: F) -> ChildReduction<S>
where
    S: Copy + PartialEq,
    F: Fn(&S) -> bool,
{
    let Some(first) = statuses.first() else {
        return ChildReduction::NoChildren;
    };
    if statuses.iter().all(|s| is_ok(s)) {
        return ChildReduction::AllOk;
    }
    if !is_ok(first) && statuses.iter().all(|s| s == first) {
        return ChildReduction::AllFailed(*first);
    }
    ChildReduction::Partial
}

/// Follow the planned-counterpart fallbacks, recording dangling links.
pub(crate) fn planned<'a, S: Status>(
    nav: &Navigator<'a>,
    event: &Event,
    links: &[String],
    classification: &mut Classification<S>,
) -> Option<&'a Event> {
    match nav.resolve_first(event, links) {
        Hop::Found(planned) => Some(planned),
        Hop::Absent => None,
        Hop::Unresolved(reference) => {
            classification.unresolved(reference);
            None
        }
    }
}

/// Text of the first attribute found on the event, or `N/A`
pub(crate) fn text_or_na(event: &Event, name: &str) -> String {
    event.attributes.text_or_na(name)
}
