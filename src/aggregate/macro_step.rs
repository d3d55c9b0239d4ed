//! Macro-step segment merging from micro-step events

use crate::config::MacroStepPolicy;
use crate::core::event::Event;
use crate::core::temporal::Timestamp;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Bucket for micro-steps the table does not know about
pub const UNKNOWN_MACRO_STEP: &str = "UNKNOWN";

/// Static micro/macro step relation, keyed by product level then step prefix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroStepTable {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub levels: BTreeMap<String, BTreeMap<String, MacroStepRule>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroStepRule {
    pub workflow: String,
    pub macro_step: String,
}

impl MacroStepTable {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Rule of the longest prefix of `step_id` listed for `level`
    pub fn lookup(&self, level: &str, step_id: &str) -> Option<&MacroStepRule> {
        self.levels
            .get(level)?
            .iter()
            .filter(|(prefix, _)| step_id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, rule)| rule)
    }
}

/// Product level encoded in a datastrip name, e.g. `MSI_L1B_DS`
pub fn product_level(product: &str) -> Option<&str> {
    product.get(9..19)
}

/// One timestamped micro-step of a product
#[derive(Debug, Clone, PartialEq)]
pub struct MicroStep {
    pub product: String,
    pub step_id: String,
    pub start: Timestamp,
    pub stop: Timestamp,
}

/// Merged extent of every micro-step of one macro-step of one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroStepSegment {
    pub product: String,
    pub level: String,
    pub macro_step: String,
    pub workflow: Option<String>,
    pub start: Timestamp,
    pub stop: Timestamp,
    pub micro_steps: usize,
    /// Set when no table entry matched; surfaced so table gaps stay visible
    pub unknown: bool,
}

impl MacroStepSegment {
    pub fn duration_minutes(&self) -> f64 {
        self.stop.minutes_since(self.start)
    }
}

/// Micro-steps described by step events carrying an explicit reference
pub fn micro_steps_from_events<'a, I>(events: I, policy: &MacroStepPolicy) -> Vec<MicroStep>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .filter_map(|event| {
            let product = event.explicit_ref.as_ref()?;
            Some(MicroStep {
                product: product.clone(),
                step_id: event
                    .get_text(&policy.step_id_attribute)
                    .unwrap_or_default()
                    .to_string(),
                start: event.start,
                stop: event.stop,
            })
        })
        .collect()
}

/// Group micro-steps into macro-steps per product and merge their extents.
///
/// Output is ordered by product, then by merged start. Unmatched steps go
/// to [`UNKNOWN_MACRO_STEP`] and each distinct `(level, step)` is logged
/// once per call.
pub fn merge_macro_steps(table: &MacroStepTable, steps: &[MicroStep]) -> Vec<MacroStepSegment> {
    let mut merged: BTreeMap<(String, String), MacroStepSegment> = BTreeMap::new();
    let mut reported: HashSet<(String, String)> = HashSet::new();

    for step in steps {
        let level = product_level(&step.product).unwrap_or_default();
        let rule = table.lookup(level, &step.step_id);
        if rule.is_none() && reported.insert((level.to_string(), step.step_id.clone())) {
            tracing::warn!(
                product_level = level,
                step = %step.step_id,
                product = %step.product,
                "micro-step has no macro-step mapping"
            );
        }
        let macro_step = rule.map_or(UNKNOWN_MACRO_STEP, |r| r.macro_step.as_str());

        merged
            .entry((step.product.clone(), macro_step.to_string()))
            .and_modify(|segment| {
                segment.start = segment.start.min(step.start);
                segment.stop = segment.stop.max(step.stop);
                segment.micro_steps += 1;
            })
            .or_insert_with(|| MacroStepSegment {
                product: step.product.clone(),
                level: level.to_string(),
                macro_step: macro_step.to_string(),
                workflow: rule.map(|r| r.workflow.clone()),
                start: step.start,
                stop: step.stop,
                micro_steps: 1,
                unknown: rule.is_none(),
            });
    }

    let mut segments: Vec<MacroStepSegment> = merged.into_values().collect();
    segments.sort_by(|a, b| {
        a.product
            .cmp(&b.product)
            .then(a.start.cmp(&b.start))
            .then(a.macro_step.cmp(&b.macro_step))
    });
    segments
}
