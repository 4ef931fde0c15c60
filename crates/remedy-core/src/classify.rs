//! Verdict classification for captured execution output.
//!
//! The success predicate is "exit status zero and no recognizable error
//! marker in the combined output". Everything else, including timeout,
//! classifies as failed.

use crate::domain::{ExecutionResult, Verdict};

/// Substrings that mark a failed run even when the exit status is zero
/// (a test harness swallowing a traceback, a runtime printing and
/// continuing).
const ERROR_MARKERS: &[&str] = &[
    "Traceback (most recent call last)",
    "Error",
    "Exception",
    "panicked at",
    "Segmentation fault",
    "FAILED",
    "AssertionError",
];

/// Whether the captured output contains a recognizable error marker.
pub fn has_error_marker(output: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| output.contains(marker))
}

/// Classify one execution result.
pub fn verdict(execution: &ExecutionResult) -> Verdict {
    if execution.timed_out || execution.exit_code != 0 || has_error_marker(&execution.output) {
        Verdict::Failed
    } else {
        Verdict::Passed
    }
}

/// Map an error message onto likely root causes, for fallback guidance.
pub fn likely_causes(error_message: &str) -> Vec<String> {
    let mut causes = Vec::new();

    if error_message.contains("ZeroDivisionError") || error_message.contains("division by zero") {
        causes.push("A denominator reaches zero on some input path.".to_string());
    }
    if error_message.contains("NoneType") || error_message.contains("null") {
        causes.push("A value expected to be present is missing (None/null).".to_string());
    }
    if error_message.contains("IndexError") || error_message.contains("out of range") {
        causes.push("A collection is accessed past its bounds.".to_string());
    }
    if error_message.contains("KeyError") {
        causes.push("A dictionary key is absent for some inputs.".to_string());
    }
    if error_message.contains("TypeError") {
        causes.push("A value has a different type than the code assumes.".to_string());
    }
    if error_message.contains("ImportError") || error_message.contains("ModuleNotFoundError") {
        causes.push("A dependency is missing from the execution environment.".to_string());
    }
    if error_message.contains("ConnectionRefused")
        || error_message.contains("Connection refused")
        || error_message.contains("ECONNREFUSED")
    {
        causes.push("A dependent service is unreachable from the sandbox.".to_string());
    }
    if error_message.contains("timed out") || error_message.contains("timeout") {
        causes.push("The code blocks or loops past the execution time budget.".to_string());
    }

    if causes.is_empty() {
        causes.push("The failure does not match a known pattern; inspect the stack trace line by line.".to_string());
    }

    causes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutionResult;

    #[test]
    fn test_clean_zero_exit_passes() {
        let result = ExecutionResult::success("5.0\n", 10);
        assert_eq!(verdict(&result), Verdict::Passed);
    }

    #[test]
    fn test_nonzero_exit_fails() {
        let result = ExecutionResult::failure(1, "", 10);
        assert_eq!(verdict(&result), Verdict::Failed);
    }

    #[test]
    fn test_timeout_fails() {
        let result = ExecutionResult::timeout("execution timed out after 30s", 30_000);
        assert_eq!(verdict(&result), Verdict::Failed);
    }

    #[test]
    fn test_zero_exit_with_traceback_fails() {
        let result = ExecutionResult::success(
            "Traceback (most recent call last):\n  File \"main.py\", line 1\n",
            10,
        );
        assert_eq!(verdict(&result), Verdict::Failed);
    }

    #[test]
    fn test_zero_exit_with_error_word_fails() {
        let result = ExecutionResult::success("TypeError: unsupported operand", 10);
        assert_eq!(verdict(&result), Verdict::Failed);
    }

    #[test]
    fn test_marker_scan_is_case_sensitive() {
        // Lowercase prose about errors is not a marker.
        assert!(!has_error_marker("0 errors found, build clean"));
        assert!(has_error_marker("Error: boom"));
    }

    #[test]
    fn test_likely_causes_zero_division() {
        let causes = likely_causes("ZeroDivisionError: division by zero");
        assert!(causes.iter().any(|c| c.contains("denominator")));
    }

    #[test]
    fn test_likely_causes_unknown_pattern() {
        let causes = likely_causes("some inscrutable failure");
        assert_eq!(causes.len(), 1);
        assert!(causes[0].contains("stack trace"));
    }
}
