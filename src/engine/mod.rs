//! Pure computation engine for deterministic order processing.
//!
//! Validation, matching, and history derivation are all synchronous
//! functions over owned state; every I/O concern lives in the run
//! orchestrator and the repository.

pub mod appender;
pub mod matcher;
pub mod validator;

pub use appender::{build_daily_report, DailyReport};
pub use validator::{validate, Disposition, RejectKind, Rejection};
