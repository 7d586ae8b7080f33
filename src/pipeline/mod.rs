pub mod orchestrator;
pub mod state;

pub use orchestrator::Orchestrator;
pub use state::{FailureKind, FindingState, FindingTracker, RunSummary};
