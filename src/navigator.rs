//! Typed link-chain resolution over a snapshot
//!
//! Absence of a link is the normal "not yet correlated" state and is
//! reported as [`Hop::Absent`]. A link whose target cannot be found in the
//! snapshot is a data-integrity defect and is reported as
//! [`Hop::Unresolved`], never folded into absence.

use crate::core::event::{Annotation, Event, EventId};
use crate::storage::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A link whose other end is not in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub link: String,
    pub source: EventId,
    pub target: EventId,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} link {} -> {} is dangling", self.link, self.source, self.target)
    }
}

/// Outcome of following one or more links
#[derive(Debug, Clone, PartialEq)]
pub enum Hop<'a> {
    Found(&'a Event),
    Absent,
    Unresolved(UnresolvedReference),
}

impl<'a> Hop<'a> {
    pub fn found(&self) -> Option<&'a Event> {
        match self {
            Hop::Found(event) => Some(*event),
            _ => None,
        }
    }

    pub fn unresolved(&self) -> Option<&UnresolvedReference> {
        match self {
            Hop::Unresolved(reference) => Some(reference),
            _ => None,
        }
    }
}

/// All targets of a set of link names
#[derive(Debug, Clone, Default)]
pub struct Resolved<'a> {
    pub found: Vec<&'a Event>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Link-graph navigator borrowing an immutable snapshot
#[derive(Clone, Copy)]
pub struct Navigator<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> Navigator<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn event(&self, id: &EventId) -> Option<&'a Event> {
        self.snapshot.event(id)
    }

    /// Target IDs of every outgoing link named `link_name`, in link order
    pub fn resolve(&self, event: &Event, link_name: &str) -> Vec<EventId> {
        self.snapshot
            .links_from(&event.id)
            .iter()
            .filter(|l| l.name == link_name)
            .map(|l| l.target)
            .collect()
    }

    /// First target through an ordered list of fallback link names.
    ///
    /// The first name that has any link wins, even if its target turns out
    /// to be dangling; later names are not consulted in that case.
    pub fn resolve_first<S: AsRef<str>>(&self, event: &Event, link_names: &[S]) -> Hop<'a> {
        for name in link_names {
            let name = name.as_ref();
            let targets = self.resolve(event, name);
            if targets.is_empty() {
                continue;
            }
            if let Some(found) = targets.iter().find_map(|id| self.snapshot.event(id)) {
                return Hop::Found(found);
            }
            return Hop::Unresolved(UnresolvedReference {
                link: name.to_string(),
                source: event.id,
                target: targets[0],
            });
        }
        Hop::Absent
    }

    /// Walk link-then-fetch through each name in turn.
    ///
    /// Returns as soon as a hop is absent or dangling; chains are never
    /// partially resolved. An empty chain resolves to nothing.
    pub fn resolve_chain<S: AsRef<str>>(&self, event: &Event, link_names: &[S]) -> Hop<'a> {
        let Some((first, rest)) = link_names.split_first() else {
            return Hop::Absent;
        };
        let mut current = match self.resolve_first(event, &[first.as_ref()]) {
            Hop::Found(next) => next,
            other => return other,
        };
        for name in rest {
            current = match self.resolve_first(current, &[name.as_ref()]) {
                Hop::Found(next) => next,
                other => return other,
            };
        }
        Hop::Found(current)
    }

    /// Every target of every listed link name, plus dangling ones
    pub fn resolve_all<S: AsRef<str>>(&self, event: &Event, link_names: &[S]) -> Resolved<'a> {
        let mut resolved = Resolved::default();
        for name in link_names {
            let name = name.as_ref();
            for target in self.resolve(event, name) {
                match self.snapshot.event(&target) {
                    Some(found) => {
                        if !resolved.found.iter().any(|e| e.id == found.id) {
                            resolved.found.push(found);
                        }
                    }
                    None => resolved.unresolved.push(UnresolvedReference {
                        link: name.to_string(),
                        source: event.id,
                        target,
                    }),
                }
            }
        }
        resolved
    }

    /// Events that point at `event` through a link named `link_name`
    pub fn linking(&self, event: &Event, link_name: &str) -> Vec<&'a Event> {
        let mut linking: Vec<&'a Event> = Vec::new();
        for link in self
            .snapshot
            .links_to(&event.id)
            .iter()
            .filter(|l| l.name == link_name)
        {
            if let Some(source) = self.snapshot.event(&link.source) {
                if !linking.iter().any(|e| e.id == source.id) {
                    linking.push(source);
                }
            }
        }
        linking
    }

    /// Annotations of an explicit reference with the given name
    pub fn annotations(&self, explicit_ref: &str, name: &str) -> Vec<&'a Annotation> {
        self.snapshot
            .annotations(explicit_ref)
            .iter()
            .filter(|a| a.name == name)
            .collect()
    }

    /// First annotation whose text attribute starts with `prefix`.
    ///
    /// Used to pick one destination among several dissemination records.
    pub fn annotation_matching(
        &self,
        explicit_ref: &str,
        name: &str,
        attribute: &str,
        prefix: &str,
    ) -> Option<&'a Annotation> {
        self.snapshot.annotations(explicit_ref).iter().find(|a| {
            a.name == name
                && a.attributes
                    .get_text(attribute)
                    .map_or(false, |value| value.starts_with(prefix))
        })
    }

    /// Target references of explicit-reference links named `link_name`
    pub fn ref_targets(&self, explicit_ref: &str, link_name: &str) -> Vec<&'a str> {
        self.snapshot
            .ref_links(explicit_ref)
            .iter()
            .filter(|l| l.name == link_name)
            .map(|l| l.target_ref.as_str())
            .collect()
    }
}
