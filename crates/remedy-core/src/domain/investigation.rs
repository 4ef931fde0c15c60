//! Investigations: the full lifecycle of fixing one reported defect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::Attempt;
use super::error::{RemedyError, Result};
use super::execution::Language;
use crate::context::CodeContext;
use crate::fallback::FallbackGuidance;

/// Default maximum number of fix attempts per investigation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Input to one investigation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestigationRequest {
    /// Identifier of the bug under investigation.
    pub bug_id: String,

    /// The error or exception message, including any stack trace.
    pub error_message: String,

    /// The code that produced the error.
    pub code: String,

    /// Target language; selects the execution command template.
    #[serde(default)]
    pub language: Language,

    /// Path of the file the code came from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Optional semantic context gathered by the caller before the first
    /// generation call. Absence means empty context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CodeContext>,

    /// Maximum number of attempts before exhaustion.
    pub max_attempts: u32,
}

impl InvestigationRequest {
    /// Create a request with default language (python) and attempt budget.
    pub fn new(
        bug_id: impl Into<String>,
        error_message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            bug_id: bug_id.into(),
            error_message: error_message.into(),
            code: code.into(),
            language: Language::default(),
            file_path: None,
            context: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the target language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Set the originating file path.
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    /// Attach semantic context for the first generation call.
    pub fn with_context(mut self, context: CodeContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Override the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Validate the request before starting the retry loop.
    pub fn validate(&self) -> Result<()> {
        if self.bug_id.is_empty() {
            return Err(RemedyError::InvalidRequest(
                "bug_id cannot be empty".to_string(),
            ));
        }
        if self.error_message.is_empty() {
            return Err(RemedyError::InvalidRequest(
                "error_message cannot be empty".to_string(),
            ));
        }
        if self.code.is_empty() {
            return Err(RemedyError::InvalidRequest(
                "code cannot be empty".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(RemedyError::InvalidRequest(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal state of an investigation. Exactly one is ever reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A candidate fix passed verification.
    Succeeded {
        /// Number of the winning attempt.
        winning_attempt: u32,
    },

    /// Retries exhausted (or generation unavailable) with fallback enabled.
    ExhaustedWithFallback { guidance: FallbackGuidance },

    /// Retries exhausted (or generation unavailable), fallback disabled.
    ExhaustedNoFallback { last_error: String },
}

impl Outcome {
    /// Whether a verified fix was found.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }
}

/// The audited record of one full investigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Investigation {
    /// Identifier of the bug this investigation targeted.
    pub bug_id: String,

    /// Ordered, append-only attempt history (numbered 1..k, no gaps).
    pub attempts: Vec<Attempt>,

    /// The terminal state reached.
    pub outcome: Outcome,

    /// When the investigation started.
    pub started_at: DateTime<Utc>,

    /// When the terminal state was reached.
    pub finished_at: DateTime<Utc>,
}

impl Investigation {
    /// The attempt whose fix passed verification, if any.
    pub fn winning_attempt(&self) -> Option<&Attempt> {
        match &self.outcome {
            Outcome::Succeeded { winning_attempt } => self
                .attempts
                .iter()
                .find(|a| a.number == *winning_attempt),
            _ => None,
        }
    }

    /// Total attempts recorded.
    pub fn total_attempts(&self) -> u32 {
        self.attempts.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = InvestigationRequest::new("BUG-1", "ZeroDivisionError", "return a / b");
        assert_eq!(request.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(request.language, Language::Python);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_empty_fields() {
        let request = InvestigationRequest::new("", "err", "code");
        assert!(matches!(
            request.validate(),
            Err(RemedyError::InvalidRequest(_))
        ));

        let request = InvestigationRequest::new("BUG-1", "", "code");
        assert!(request.validate().is_err());

        let request = InvestigationRequest::new("BUG-1", "err", "");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_rejects_zero_attempts() {
        let request =
            InvestigationRequest::new("BUG-1", "err", "code").with_max_attempts(0);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_outcome_success_predicate() {
        let success = Outcome::Succeeded { winning_attempt: 2 };
        assert!(success.is_success());

        let failure = Outcome::ExhaustedNoFallback {
            last_error: "still broken".to_string(),
        };
        assert!(!failure.is_success());
    }

    #[test]
    fn test_outcome_serde_roundtrip() {
        let outcome = Outcome::ExhaustedNoFallback {
            last_error: "Traceback".to_string(),
        };
        let json = serde_json::to_string(&outcome).expect("serialize");
        let deserialized: Outcome = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(outcome, deserialized);
    }
}
