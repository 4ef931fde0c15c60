//! Candidate fixes and the requests that produce them.

use serde::{Deserialize, Serialize};

use crate::context::CodeContext;

/// A candidate fix produced by the generation capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedFix {
    /// Analysis of what caused the bug.
    pub root_cause: String,

    /// The complete corrected code. When the generator response carried no
    /// usable code, this equals the original code and `confidence` is low.
    pub fixed_code: String,

    /// What was changed and why.
    pub explanation: String,

    /// Generator's confidence in the fix, in `[0, 1]`.
    pub confidence: f64,

    /// On retries: why the previous attempt failed and how this differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_analysis: Option<String>,
}

impl GeneratedFix {
    /// A placeholder fix that re-submits the original code unchanged.
    ///
    /// Used when the generator response carried no parsable code; running it
    /// will almost certainly fail classification again, which forces a
    /// genuine retry instead of silently giving up. The zero confidence
    /// distinguishes it in the record from a substantive but wrong fix.
    pub fn unchanged(original_code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            root_cause: "analysis failed".to_string(),
            fixed_code: original_code.into(),
            explanation: reason.into(),
            confidence: 0.0,
            retry_analysis: None,
        }
    }
}

/// Input to one fix-generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixRequest {
    /// Identifier of the bug under investigation.
    pub bug_id: String,

    /// The error or exception message, including any stack trace.
    pub error_message: String,

    /// The code that produced the error.
    pub code: String,

    /// Path of the file the code came from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Optional semantic context supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CodeContext>,
}
