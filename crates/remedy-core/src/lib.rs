//! Remedy Core Library
//!
//! The fix-verify-retry orchestrator: domain model, the bounded retry
//! state machine, and the capability traits it drives (fix generation,
//! fallback guidance, sandbox execution, semantic context, bug storage).

pub mod classify;
pub mod context;
pub mod domain;
pub mod events;
pub mod fakes;
pub mod fallback;
pub mod generator;
pub mod git;
pub mod investigator;
pub mod obs;
pub mod sandbox;
pub mod store;
pub mod telemetry;

pub use domain::{
    Attempt, BugReport, BugStatus, ExecutionResult, FixRequest, GeneratedFix, GenerationError,
    Investigation, InvestigationRequest, Language, Outcome, RemedyError, Result, Verdict,
    DEFAULT_MAX_ATTEMPTS,
};

pub use context::{CodeContext, ContextProvider, NoContext};
pub use events::{
    ChannelSink, CollectingSink, EventSink, InvestigationEvent, StageKind, TracingSink,
};
pub use fallback::{AttemptSummary, FallbackGuidance, FallbackProvider, ManualDebugFallback};
pub use generator::http::{HttpFixGenerator, HttpGeneratorConfig};
pub use generator::FixGenerator;
pub use git::{apply_fix_to_repo, capture_head_sha, fix_branch_name, is_git_repo};
pub use investigator::{CancelHandle, Investigator};
pub use sandbox::{ExecutionCell, SandboxFactory};
pub use store::{BugReportStore, MemoryBugStore};

pub use obs::{
    emit_attempt_classified, emit_investigation_finished, emit_investigation_started,
    InvestigationSpan,
};
pub use telemetry::init_tracing;

/// Remedy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
