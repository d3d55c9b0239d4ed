//! Roll-ups over classified events: volume, timeliness, macro steps

pub mod macro_step;
pub mod timeliness;
pub mod volume;

pub use macro_step::{merge_macro_steps, MacroStepSegment, MacroStepTable, UNKNOWN_MACRO_STEP};
pub use timeliness::{mean_delta_minutes, timeliness_series, TimelinessInput, TimelinessPoint};
pub use volume::{cumulative_volume, volume_groups, VolumeGroup, VolumePoint};
