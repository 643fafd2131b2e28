//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Data flow
//! - `RecordSource` → `BatchAccumulator` → `ProcessingFacility` (via the dispatcher)
//! - mutation → `Broker` (via the publisher) → subscriber → handler
//!
//! Batch sequence numbers are for ordering diagnostics only.

mod batch;
mod blueprint;
mod broker;
mod envelope;
mod error;
mod facility;
mod record;
mod record_source;

pub use batch::*;
pub use blueprint::*;
pub use broker::{Broker, BrokerError, LocalBroker};
pub use envelope::*;
pub use error::*;
pub use facility::{LocalProcessingFacility, ProcessingFacility};
pub use record::*;
pub use record_source::{LocalRecordSource, RecordSource};
