//! Structured observability hooks for investigation lifecycle events.
//!
//! Provides an investigation-scoped tracing span via the `InvestigationSpan`
//! RAII guard plus emission functions for the key lifecycle moments.
//! Events are emitted at `info!` level; verbosity is controlled through
//! `RUST_LOG`.

use tracing::info;

/// RAII guard that enters an investigation-scoped tracing span.
///
/// While the guard is alive, all tracing calls carry the bug id.
pub struct InvestigationSpan {
    _span: tracing::span::EnteredSpan,
}

impl InvestigationSpan {
    /// Create and enter a span tagged with the bug id.
    pub fn enter(bug_id: &str) -> Self {
        let span = tracing::info_span!("remedy.investigation", bug_id = %bug_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: investigation started with its attempt budget.
pub fn emit_investigation_started(bug_id: &str, max_attempts: u32) {
    info!(
        event = "investigation.started",
        bug_id = %bug_id,
        max_attempts = max_attempts,
    );
}

/// Emit event: one attempt was classified.
pub fn emit_attempt_classified(bug_id: &str, attempt: u32, passed: bool) {
    info!(
        event = "investigation.attempt_classified",
        bug_id = %bug_id,
        attempt = attempt,
        passed = passed,
    );
}

/// Emit event: investigation reached a terminal state.
pub fn emit_investigation_finished(bug_id: &str, total_attempts: u32, success: bool) {
    info!(
        event = "investigation.finished",
        bug_id = %bug_id,
        total_attempts = total_attempts,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_investigation_span_create() {
        // Just ensure the span guard doesn't panic.
        let _span = InvestigationSpan::enter("BUG-1");
        emit_investigation_started("BUG-1", 3);
        emit_attempt_classified("BUG-1", 1, false);
        emit_investigation_finished("BUG-1", 1, false);
    }
}
