//! Execution results, verdicts, and target languages.

use serde::{Deserialize, Serialize};

/// Target language for a candidate fix.
///
/// Selects which command template the execution cell uses. Unrecognized
/// language strings fall back to [`Language::Python`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    Python,
    Javascript,
    Go,
    GoTest,
    Rust,
    CargoTest,
    NpmTest,
    Shell,
}

impl Language {
    /// Parse a language name, falling back to Python for unknown values.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "python" => Language::Python,
            "javascript" | "nodejs" | "node" => Language::Javascript,
            "go" => Language::Go,
            "go-test" => Language::GoTest,
            "rust" => Language::Rust,
            "cargo-test" => Language::CargoTest,
            "npm-test" => Language::NpmTest,
            "shell" | "bash" | "sh" => Language::Shell,
            _ => Language::Python,
        }
    }

    /// Canonical name for this language.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Go => "go",
            Language::GoTest => "go-test",
            Language::Rust => "rust",
            Language::CargoTest => "cargo-test",
            Language::NpmTest => "npm-test",
            Language::Shell => "shell",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Python
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of running one candidate program to completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// Process exit code (non-zero on timeout).
    pub exit_code: i32,

    /// Combined stdout and stderr, in capture order.
    pub output: String,

    /// Whether the wall-clock timeout fired. A timeout is a classified
    /// outcome, not a crash.
    pub timed_out: bool,

    /// Wall-clock execution duration in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// A successful run with the given output.
    pub fn success(output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
            timed_out: false,
            duration_ms,
        }
    }

    /// A failed run with the given exit code and output.
    pub fn failure(exit_code: i32, output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            exit_code,
            output: output.into(),
            timed_out: false,
            duration_ms,
        }
    }

    /// A timed-out run. Exit code 124 follows the conventional timeout status.
    pub fn timeout(output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            exit_code: 124,
            output: output.into(),
            timed_out: true,
            duration_ms,
        }
    }
}

/// Classification of one execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    /// Whether this verdict ends the retry loop successfully.
    pub fn is_passed(self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse_known_names() {
        let cases = [
            ("python", Language::Python),
            ("javascript", Language::Javascript),
            ("nodejs", Language::Javascript),
            ("go", Language::Go),
            ("go-test", Language::GoTest),
            ("rust", Language::Rust),
            ("cargo-test", Language::CargoTest),
            ("npm-test", Language::NpmTest),
            ("bash", Language::Shell),
        ];
        for (name, expected) in cases {
            assert_eq!(Language::parse(name), expected, "mapping for {name}");
        }
    }

    #[test]
    fn test_language_parse_unknown_falls_back_to_python() {
        assert_eq!(Language::parse("unknown-lang"), Language::Python);
        assert_eq!(Language::parse(""), Language::Python);
    }

    #[test]
    fn test_language_parse_is_case_insensitive() {
        assert_eq!(Language::parse("PYTHON"), Language::Python);
        assert_eq!(Language::parse("Rust"), Language::Rust);
    }

    #[test]
    fn test_execution_result_constructors() {
        let ok = ExecutionResult::success("all good", 120);
        assert_eq!(ok.exit_code, 0);
        assert!(!ok.timed_out);

        let failed = ExecutionResult::failure(1, "Traceback", 80);
        assert_eq!(failed.exit_code, 1);
        assert!(!failed.timed_out);

        let timed = ExecutionResult::timeout("execution timed out after 30s", 30_000);
        assert!(timed.timed_out);
        assert_ne!(timed.exit_code, 0);
    }

    #[test]
    fn test_execution_result_serde_roundtrip() {
        let result = ExecutionResult::failure(2, "Error: boom", 55);
        let json = serde_json::to_string(&result).expect("serialize");
        let deserialized: ExecutionResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(result, deserialized);
    }

    #[test]
    fn test_verdict_serde() {
        for verdict in [Verdict::Passed, Verdict::Failed] {
            let json = serde_json::to_string(&verdict).expect("serialize");
            let deserialized: Verdict = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(verdict, deserialized);
        }
    }
}
