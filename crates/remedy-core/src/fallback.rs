//! Fallback guidance: structured manual-debugging advice returned when
//! automated retries are exhausted or the generation capability is down.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify;
use crate::domain::{Attempt, FixRequest};

/// Condensed view of one failed attempt, for the guidance report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptSummary {
    /// 1-based attempt number.
    pub number: u32,

    /// Generator confidence for that attempt's fix.
    pub confidence: f64,

    /// First line of the error that attempt produced, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_error: Option<String>,
}

impl AttemptSummary {
    fn from_attempt(attempt: &Attempt) -> Self {
        Self {
            number: attempt.number,
            confidence: attempt.fix.confidence,
            resulting_error: attempt
                .new_error
                .as_deref()
                .and_then(|e| e.lines().find(|line| !line.trim().is_empty()))
                .map(str::to_string),
        }
    }
}

/// Structured manual-debug report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackGuidance {
    /// Bug this guidance is for.
    pub bug_id: String,

    /// One-line summary of where the automation stopped.
    pub headline: String,

    /// Likely root causes inferred from the error text.
    pub likely_causes: Vec<String>,

    /// Ordered manual debugging steps.
    pub suggested_steps: Vec<String>,

    /// What the automation already tried.
    pub attempted_fixes: Vec<AttemptSummary>,

    /// When the guidance was produced.
    pub generated_at: DateTime<Utc>,
}

/// Provider of fallback guidance on exhaustion.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    /// Whether exhaustion should return guidance rather than a bare failure.
    fn is_enabled(&self) -> bool;

    /// Guidance after all attempts failed verification.
    async fn guidance(&self, request: &FixRequest, history: &[Attempt]) -> FallbackGuidance;

    /// Guidance when the generation capability itself was unreachable.
    async fn api_failure_guidance(&self, request: &FixRequest, api_error: &str)
        -> FallbackGuidance;
}

/// Builtin guidance provider with an enable switch.
#[derive(Debug, Clone)]
pub struct ManualDebugFallback {
    enabled: bool,
}

impl ManualDebugFallback {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for ManualDebugFallback {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[async_trait]
impl FallbackProvider for ManualDebugFallback {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn guidance(&self, request: &FixRequest, history: &[Attempt]) -> FallbackGuidance {
        let mut steps = vec![
            "Reproduce the failure locally with the original input.".to_string(),
            "Read the innermost frame of the stack trace and inspect the values it names."
                .to_string(),
        ];
        if !history.is_empty() {
            steps.push(format!(
                "Review the {} automated attempt(s) below; each changed the code and still failed, which narrows where the defect is not.",
                history.len()
            ));
        }
        steps.push(
            "Add a focused regression test for the failing input before changing code again."
                .to_string(),
        );

        FallbackGuidance {
            bug_id: request.bug_id.clone(),
            headline: format!(
                "Automated fixing exhausted after {} attempt(s); manual debugging required.",
                history.len()
            ),
            likely_causes: classify::likely_causes(&request.error_message),
            suggested_steps: steps,
            attempted_fixes: history.iter().map(AttemptSummary::from_attempt).collect(),
            generated_at: Utc::now(),
        }
    }

    async fn api_failure_guidance(
        &self,
        request: &FixRequest,
        api_error: &str,
    ) -> FallbackGuidance {
        FallbackGuidance {
            bug_id: request.bug_id.clone(),
            headline: format!("Fix generation was unavailable: {api_error}"),
            likely_causes: classify::likely_causes(&request.error_message),
            suggested_steps: vec![
                "Check connectivity and credentials for the fix-generation endpoint.".to_string(),
                "Retry the investigation once the generator is reachable.".to_string(),
                "Debug manually using the likely causes above in the meantime.".to_string(),
            ],
            attempted_fixes: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}
