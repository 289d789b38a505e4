//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `Record`: one extracted listing and its identity key
//! - `ResultSet`: the records accumulated across the pages of a run
//! - `RunState`: the persisted cursor that lets a run survive navigation
//! - `RunPhase`: the controller phase within a single process instance

mod record;
mod result_set;
mod run_state;

// Re-export main types
pub use record::Record;
pub use result_set::ResultSet;
pub use run_state::{Quota, QuotaSnapshot, RunPhase, RunState, Tier};
