//! Domain facts shared across crates.

mod model;
mod phases;

pub use model::ModelRecord;
pub use phases::{PIPELINE_PHASES, phase_name};
