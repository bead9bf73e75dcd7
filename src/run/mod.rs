//! Run orchestration: the snapshot boundary and the per-day state machine.

pub mod orchestrator;
pub mod snapshot;

pub use orchestrator::{process_one_day, RunCounters, RunOrchestrator, RunPhase, RunSummary};
pub use snapshot::{SnapshotManager, SnapshotState};
