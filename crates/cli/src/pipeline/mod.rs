//! Pipeline orchestration: event side and batch side wired from a blueprint.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
