//! Engine configuration loading from file and environment variables.
//!
//! Everything that varied between revisions of the reporting templates
//! lives here as data: which link names are tried and in which order,
//! which annotation carries which fact, and what counts as "missing".

use crate::aggregate::macro_step::MacroStepTable;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Built-in micro/macro step relation
const MACRO_STEPS_TOML: &str = include_str!("../config/macro_steps.toml");

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fetch and fan-out settings.
    #[serde(default)]
    pub engine: RuntimeConfig,

    #[serde(default)]
    pub acquisition: AcquisitionPolicy,

    #[serde(default)]
    pub processing: ProcessingPolicy,

    #[serde(default)]
    pub datatake: DatatakePolicy,

    #[serde(default)]
    pub dhus: DhusPolicy,

    #[serde(default)]
    pub hktm: HktmPolicy,

    #[serde(default)]
    pub volume: VolumePolicy,

    #[serde(default)]
    pub macro_step: MacroStepPolicy,

    /// Micro-step prefix to macro-step relation, per product level.
    #[serde(default = "default_macro_steps")]
    pub macro_steps: MacroStepTable,
}

/// Fetch and fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Link hops followed from the events being classified.
    #[serde(default = "default_max_link_depth")]
    pub max_link_depth: usize,

    /// Events classified per blocking task.
    #[serde(default = "default_fan_out_chunk")]
    pub fan_out_chunk: usize,
}

/// Status attribute conventions shared by every domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    pub attribute: String,
    pub missing: String,
    pub incomplete: Vec<String>,
}

/// Acquisition (playback reception) classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionPolicy {
    pub primary_kinds: Vec<String>,
    /// Tried in order; the first name with any link wins
    pub planned_links: Vec<String>,
    /// Per-channel evidence pointing at the planned playback
    pub child_link: String,
    pub station_links: Vec<String>,
    pub station_attribute: String,
    pub correction_link: String,
    pub gap_kinds: Vec<String>,
    pub status: StatusVocabulary,
}

/// Datastrip processing classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingPolicy {
    pub primary_kinds: Vec<String>,
    pub parent_links: Vec<String>,
    pub sad_link: String,
    pub status: StatusVocabulary,
}

/// Datatake completeness classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatatakePolicy {
    pub primary_kinds: Vec<String>,
    pub planned_links: Vec<String>,
    pub status: StatusVocabulary,
}

/// Catalogue and dissemination classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DhusPolicy {
    pub primary_kinds: Vec<String>,
    pub planned_links: Vec<String>,
    /// Chain from the datastrip to the corrected planned imaging
    pub reference_chain: Vec<String>,
    pub isp_completeness_link: String,
    pub tile_link: String,
    pub publication_annotation: String,
    pub publication_time_attribute: String,
    pub dissemination_annotation: String,
    pub cataloging_annotation: String,
    pub footprint_annotation: String,
    pub status: StatusVocabulary,
}

/// Housekeeping telemetry circulation classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HktmPolicy {
    pub primary_kinds: Vec<String>,
    pub playback_type_attribute: String,
    pub playback_types: Vec<String>,
    pub production_link: String,
    pub acquisition_links: Vec<String>,
    pub station_links: Vec<String>,
    pub station_attribute: String,
    pub circulation_annotation: String,
    pub destination_attribute: String,
    pub destination_prefix: String,
    pub circulation_time_attribute: String,
    pub product_size_attribute: String,
    pub orbit_kinds: Vec<String>,
    /// Circulation later than this after ANX is flagged
    pub timeliness_threshold_minutes: f64,
    pub status: StatusVocabulary,
}

/// Cumulative volume roll-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumePolicy {
    pub datastrip_kinds: Vec<String>,
    pub sensing_annotation: String,
    pub sensing_attribute: String,
    pub size_annotation: String,
    pub size_attribute: String,
    pub datatake_annotation: String,
    pub datatake_attribute: String,
}

/// Macro-step merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroStepPolicy {
    pub step_kinds: Vec<String>,
    pub step_id_attribute: String,
}

fn default_max_link_depth() -> usize {
    4
}

fn default_fan_out_chunk() -> usize {
    64
}

fn default_macro_steps() -> MacroStepTable {
    match MacroStepTable::from_toml_str(MACRO_STEPS_TOML) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(error = %e, "built-in macro step table is invalid");
            MacroStepTable::default()
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: RuntimeConfig::default(),
            acquisition: AcquisitionPolicy::default(),
            processing: ProcessingPolicy::default(),
            datatake: DatatakePolicy::default(),
            dhus: DhusPolicy::default(),
            hktm: HktmPolicy::default(),
            volume: VolumePolicy::default(),
            macro_step: MacroStepPolicy::default(),
            macro_steps: default_macro_steps(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_link_depth: default_max_link_depth(),
            fan_out_chunk: default_fan_out_chunk(),
        }
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            attribute: "status".to_string(),
            missing: "MISSING".to_string(),
            incomplete: strings(&["INCOMPLETE", "PARTIAL"]),
        }
    }
}

impl StatusVocabulary {
    pub fn is_missing(&self, status: Option<&str>) -> bool {
        status == Some(self.missing.as_str())
    }

    pub fn is_incomplete(&self, status: Option<&str>) -> bool {
        status.map_or(false, |s| self.incomplete.iter().any(|i| i == s))
    }
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self {
            primary_kinds: strings(&["PLANNED_PLAYBACK_CORRECTION"]),
            planned_links: strings(&["PLANNED_PLAYBACK", "PLANNED_EVENT", "TIME_CORRECTION"]),
            child_link: "PLAYBACK_VALIDITY".to_string(),
            station_links: strings(&["STATION_SCHEDULE", "SLOT_REQUEST_EDRS"]),
            station_attribute: "station".to_string(),
            correction_link: "TIME_CORRECTION".to_string(),
            gap_kinds: strings(&["PLAYBACK_GAP", "ISP_GAP"]),
            status: StatusVocabulary::default(),
        }
    }
}

impl Default for ProcessingPolicy {
    fn default() -> Self {
        Self {
            primary_kinds: strings(&["PROCESSING_VALIDITY"]),
            parent_links: strings(&["ISP_VALIDITY"]),
            sad_link: "SAD_DATA".to_string(),
            status: StatusVocabulary::default(),
        }
    }
}

impl Default for DatatakePolicy {
    fn default() -> Self {
        Self {
            primary_kinds: strings(&["PLANNED_IMAGING_PROCESSING_COMPLETENESS_*"]),
            planned_links: strings(&["PLANNED_IMAGING", "PLANNED_EVENT"]),
            status: StatusVocabulary::default(),
        }
    }
}

impl Default for DhusPolicy {
    fn default() -> Self {
        Self {
            primary_kinds: strings(&[
                "PLANNED_IMAGING_PROCESSING_COMPLETENESS_L1C",
                "PLANNED_IMAGING_PROCESSING_COMPLETENESS_L2A",
            ]),
            planned_links: strings(&["PLANNED_IMAGING", "PLANNED_EVENT"]),
            reference_chain: strings(&["PLANNED_IMAGING", "TIME_CORRECTION"]),
            isp_completeness_link: "ISP_COMPLETENESS".to_string(),
            tile_link: "TILE".to_string(),
            publication_annotation: "DHUS_PUBLICATION_TIME".to_string(),
            publication_time_attribute: "dhus_publication_time".to_string(),
            dissemination_annotation: "DHUS_DISSEMINATION_TIME".to_string(),
            cataloging_annotation: "CATALOGING_TIME".to_string(),
            footprint_annotation: "FOOTPRINT".to_string(),
            status: StatusVocabulary::default(),
        }
    }
}

impl Default for HktmPolicy {
    fn default() -> Self {
        Self {
            primary_kinds: strings(&["PLANNED_PLAYBACK"]),
            playback_type_attribute: "playback_type".to_string(),
            playback_types: strings(&["HKTM", "HKTM_SAD"]),
            production_link: "HKTM_PRODUCTION_VGS".to_string(),
            acquisition_links: strings(&[
                "PLAYBACK_VALIDITY",
                "DFEP_ACQUISITION_VALIDITY",
                "STATION_ACQUISITION_REPORT",
            ]),
            station_links: strings(&["STATION_SCHEDULE", "SLOT_REQUEST_EDRS"]),
            station_attribute: "station".to_string(),
            circulation_annotation: "CIRCULATION_TIME".to_string(),
            destination_attribute: "destination".to_string(),
            destination_prefix: "FOS_".to_string(),
            circulation_time_attribute: "circulation_time".to_string(),
            product_size_attribute: "product_size".to_string(),
            orbit_kinds: strings(&["ORBIT_PREDICTION"]),
            timeliness_threshold_minutes: 60.0,
            status: StatusVocabulary::default(),
        }
    }
}

impl Default for VolumePolicy {
    fn default() -> Self {
        Self {
            datastrip_kinds: strings(&["PROCESSING_VALIDITY"]),
            sensing_annotation: "SENSING_IDENTIFIER".to_string(),
            sensing_attribute: "sensing_identifier".to_string(),
            size_annotation: "SIZE".to_string(),
            size_attribute: "aggregated_size".to_string(),
            datatake_annotation: "DATATAKE".to_string(),
            datatake_attribute: "datatake_identifier".to_string(),
        }
    }
}

impl Default for MacroStepPolicy {
    fn default() -> Self {
        Self {
            step_kinds: strings(&["STEP_INFO"]),
            step_id_attribute: "id".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variable overrides:
    /// - `COMPLETENESS_TIMELINESS_THRESHOLD_MINUTES` overrides `hktm.timeliness_threshold_minutes`
    /// - `COMPLETENESS_FAN_OUT_CHUNK` overrides `engine.fan_out_chunk`
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration does not validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(contents) => Self::from_toml_str(&contents)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(path = %p.display(), "config file not found, using defaults");
                    Self::default()
                }
                Err(e) => return Err(Error::Io(e)),
            },
            None => Self::default(),
        };

        if let Ok(threshold) = std::env::var("COMPLETENESS_TIMELINESS_THRESHOLD_MINUTES") {
            match threshold.parse() {
                Ok(parsed) => config.hktm.timeliness_threshold_minutes = parsed,
                Err(_) => tracing::warn!(value = %threshold, "ignoring unparsable timeliness threshold"),
            }
        }
        if let Ok(chunk) = std::env::var("COMPLETENESS_FAN_OUT_CHUNK") {
            match chunk.parse() {
                Ok(parsed) => config.engine.fan_out_chunk = parsed,
                Err(_) => tracing::warn!(value = %chunk, "ignoring unparsable fan-out chunk"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reject values that would make classification meaningless.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.hktm.timeliness_threshold_minutes;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::Configuration(format!(
                "hktm.timeliness_threshold_minutes must be positive, got {}",
                threshold
            )));
        }
        if self.engine.fan_out_chunk == 0 {
            return Err(Error::Configuration(
                "engine.fan_out_chunk must be at least 1".to_string(),
            ));
        }
        if self.engine.max_link_depth == 0 {
            return Err(Error::Configuration(
                "engine.max_link_depth must be at least 1".to_string(),
            ));
        }
        let link_lists = [
            ("acquisition.planned_links", &self.acquisition.planned_links),
            ("processing.parent_links", &self.processing.parent_links),
            ("datatake.planned_links", &self.datatake.planned_links),
            ("dhus.planned_links", &self.dhus.planned_links),
            ("dhus.reference_chain", &self.dhus.reference_chain),
        ];
        for (name, links) in link_lists {
            if links.is_empty() {
                return Err(Error::Configuration(format!("{} must not be empty", name)));
            }
        }
        for domain in Domain::ALL {
            if self.primary_kinds(domain).is_empty() {
                return Err(Error::Configuration(format!(
                    "{}.primary_kinds must not be empty",
                    domain
                )));
            }
        }
        Ok(())
    }

    /// Kinds of the events a domain classifies
    pub fn primary_kinds(&self, domain: Domain) -> &[String] {
        match domain {
            Domain::Acquisition => &self.acquisition.primary_kinds,
            Domain::Processing => &self.processing.primary_kinds,
            Domain::Datatake => &self.datatake.primary_kinds,
            Domain::Dhus => &self.dhus.primary_kinds,
            Domain::Hktm => &self.hktm.primary_kinds,
        }
    }

    /// Kinds fetched alongside the primary events, independent of links
    pub fn auxiliary_kinds(&self, domain: Domain) -> Vec<String> {
        match domain {
            Domain::Acquisition => self.acquisition.gap_kinds.clone(),
            Domain::Hktm => self.hktm.orbit_kinds.clone(),
            Domain::Processing | Domain::Datatake | Domain::Dhus => Vec::new(),
        }
    }
}

/// Monitored domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Acquisition,
    Processing,
    Datatake,
    Dhus,
    Hktm,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Acquisition,
        Domain::Processing,
        Domain::Datatake,
        Domain::Dhus,
        Domain::Hktm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Acquisition => "acquisition",
            Domain::Processing => "processing",
            Domain::Datatake => "datatake",
            Domain::Dhus => "dhus",
            Domain::Hktm => "hktm",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Configuration(format!("unknown domain: {}", s)))
    }
}
