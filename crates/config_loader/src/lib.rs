//! # Config Loader
//!
//! Turns a batchflow config file into a checked `PipelineBlueprint`.
//!
//! A blueprint carries five sections: `[accumulator]` (flush policy),
//! `[dispatcher]` (worker pool), `[publisher]` (retry policy), `[subscriber]`
//! (routes and topics) and `[source]` (seed records, user mutations, query
//! limit). Every load runs the field rules from `validator` and then the
//! cross-section checks in `rules`; a blueprint that comes back is ready to
//! wire into the pipeline. Blueprints edited in code (CLI overrides) go back
//! through [`ConfigLoader::validate`].
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("batchflow.toml"))?;
//! println!(
//!     "batches of {} every {}ms",
//!     blueprint.accumulator.max_batch_size, blueprint.accumulator.wait_ms
//! );
//! # Ok::<(), contracts::ContractError>(())
//! ```

mod parser;
mod rules;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Entry point for blueprint loading, checking and dumping
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and check a blueprint file; `.toml` or `.json`
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContractError::config_parse(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::load_from_str(&content, format)
    }

    /// Parse and check blueprint text
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        rules::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Re-check a blueprint after it was changed in code
    pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
        rules::validate(blueprint)
    }

    /// Dump as TOML, the form `load_from_path` reads back
    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("cannot write blueprint as TOML: {e}")))
    }

    /// Dump as JSON (used by `batchflow info --json`)
    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        Ok(serde_json::to_string_pretty(blueprint)?)
    }
}

fn format_of(path: &Path) -> Result<ConfigFormat, ContractError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        }),
        None => Err(ContractError::config_parse(format!(
            "{} has no .toml or .json extension",
            path.display()
        ))),
    }
}
