//! Processing facility implementations
//!
//! Contains LogFacility and FnFacility.

mod func;
mod log;

pub use self::func::FnFacility;
pub use self::log::LogFacility;

use contracts::{DispatchConfig, FacilityKind};

/// Build the facility named by the configuration
pub fn from_config(config: &DispatchConfig) -> LogFacility {
    match config.facility {
        FacilityKind::Log => LogFacility::new("log"),
    }
}
