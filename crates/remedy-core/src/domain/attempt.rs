//! Attempt records: one fix-generate, execute, classify cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::{ExecutionResult, Verdict};
use super::fix::GeneratedFix;

/// One retry iteration, recorded append-only.
///
/// The full ordered sequence of prior attempts is visible to each
/// subsequent generation call so the generator can avoid repeating a
/// failed approach.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    /// 1-based attempt number, contiguous within an investigation.
    pub number: u32,

    /// The candidate fix that was judged.
    pub fix: GeneratedFix,

    /// What happened when the candidate ran.
    pub execution: ExecutionResult,

    /// Classification of the execution.
    pub verdict: Verdict,

    /// Captured output of a failed run; present iff `verdict` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_error: Option<String>,

    /// When this attempt was classified.
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    /// Record a classified attempt. `new_error` is derived from the verdict.
    pub fn record(
        number: u32,
        fix: GeneratedFix,
        execution: ExecutionResult,
        verdict: Verdict,
    ) -> Self {
        let new_error = match verdict {
            Verdict::Passed => None,
            Verdict::Failed => Some(execution.output.clone()),
        };
        Self {
            number,
            fix,
            execution,
            verdict,
            new_error,
            timestamp: Utc::now(),
        }
    }

    /// Whether this attempt passed verification.
    pub fn passed(&self) -> bool {
        self.verdict.is_passed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_fix() -> GeneratedFix {
        GeneratedFix {
            root_cause: "unchecked denominator".to_string(),
            fixed_code: "return a / b if b else 0".to_string(),
            explanation: "guard b".to_string(),
            confidence: 0.8,
            retry_analysis: None,
        }
    }

    #[test]
    fn test_failed_attempt_carries_new_error() {
        let execution = ExecutionResult::failure(1, "Traceback: ZeroDivisionError", 42);
        let attempt = Attempt::record(1, some_fix(), execution, Verdict::Failed);
        assert!(!attempt.passed());
        assert_eq!(
            attempt.new_error.as_deref(),
            Some("Traceback: ZeroDivisionError")
        );
    }

    #[test]
    fn test_passed_attempt_has_no_new_error() {
        let execution = ExecutionResult::success("5.0", 42);
        let attempt = Attempt::record(2, some_fix(), execution, Verdict::Passed);
        assert!(attempt.passed());
        assert!(attempt.new_error.is_none());
    }

    #[test]
    fn test_attempt_serde_roundtrip() {
        let execution = ExecutionResult::timeout("execution timed out after 30s", 30_000);
        let attempt = Attempt::record(3, some_fix(), execution, Verdict::Failed);
        let json = serde_json::to_string(&attempt).expect("serialize");
        let deserialized: Attempt = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(attempt, deserialized);
    }
}
