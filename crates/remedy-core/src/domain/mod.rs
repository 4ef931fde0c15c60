//! Domain model for Remedy investigations.

pub mod attempt;
pub mod bug;
pub mod error;
pub mod execution;
pub mod fix;
pub mod investigation;

pub use attempt::Attempt;
pub use bug::{BugReport, BugStatus};
pub use error::{GenerationError, RemedyError, Result};
pub use execution::{ExecutionResult, Language, Verdict};
pub use fix::{FixRequest, GeneratedFix};
pub use investigation::{
    Investigation, InvestigationRequest, Outcome, DEFAULT_MAX_ATTEMPTS,
};
