//! Heuristic parsing of generator responses into structured fixes.
//!
//! Generator output is free-form prose with a fenced code block. The
//! parser extracts the code, the root-cause paragraph, the explanation,
//! and (on retries) the analysis of the previous attempt. When no code
//! block is present the original code is returned with low confidence.

use crate::domain::GeneratedFix;

/// Confidence when both code and a root-cause analysis were extracted.
const CONFIDENCE_FULL: f64 = 0.8;
/// Confidence when the response was parsed but lacked code or analysis.
const CONFIDENCE_PARTIAL: f64 = 0.5;

/// Parse a free-form generator response.
pub fn parse_response(response: &str, original_code: &str) -> GeneratedFix {
    let lines: Vec<&str> = response.lines().collect();

    let mut root_cause = String::new();
    let mut fixed_code = String::new();
    let mut explanation = String::new();
    let mut retry_analysis = String::new();
    let mut in_code_block = false;

    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            fixed_code.push_str(line);
            fixed_code.push('\n');
            continue;
        }

        let lowered = line.to_lowercase();
        if lowered.contains("root cause") && root_cause.is_empty() {
            root_cause = following_lines(&lines, i, 3);
        } else if (lowered.contains("explanation") || lowered.contains("changes"))
            && explanation.is_empty()
        {
            explanation = following_lines(&lines, i, 4);
        } else if (lowered.contains("previous attempt") || lowered.contains("wrong with"))
            && retry_analysis.is_empty()
        {
            retry_analysis = section_from(&lines, i, 4);
        }
    }

    let fixed_code = fixed_code.trim().to_string();
    let has_code = !fixed_code.is_empty();
    let confidence = if has_code && !root_cause.is_empty() {
        CONFIDENCE_FULL
    } else {
        CONFIDENCE_PARTIAL
    };

    GeneratedFix {
        root_cause: if root_cause.is_empty() {
            "analysis completed".to_string()
        } else {
            root_cause
        },
        fixed_code: if has_code {
            fixed_code
        } else {
            original_code.to_string()
        },
        explanation: if explanation.is_empty() {
            "code has been fixed".to_string()
        } else {
            explanation
        },
        confidence,
        retry_analysis: if retry_analysis.is_empty() {
            None
        } else {
            Some(retry_analysis)
        },
    }
}

/// Up to `count` non-empty lines after the heading at `index`.
fn following_lines(lines: &[&str], index: usize, count: usize) -> String {
    lines
        .iter()
        .skip(index + 1)
        .take(count)
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Up to `count` lines starting at the heading itself.
fn section_from(lines: &[&str], index: usize, count: usize) -> String {
    lines
        .iter()
        .skip(index)
        .take(count)
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "def divide(a, b):\n    return a / b";

    #[test]
    fn test_parse_full_response() {
        let response = "\
## Root Cause Analysis
The denominator can be zero, which raises ZeroDivisionError.

## Fixed Code
```python
def divide(a, b):
    if b == 0:
        return None
    return a / b
```

## Explanation of Changes
Added a guard for b == 0 before dividing.
";
        let fix = parse_response(response, ORIGINAL);
        assert!(fix.fixed_code.contains("if b == 0"));
        assert!(fix.root_cause.contains("denominator"));
        assert!(fix.explanation.contains("guard"));
        assert_eq!(fix.confidence, CONFIDENCE_FULL);
        assert!(fix.retry_analysis.is_none());
    }

    #[test]
    fn test_parse_without_code_block_falls_back_to_original() {
        let response = "I could not determine a safe fix for this error.";
        let fix = parse_response(response, ORIGINAL);
        assert_eq!(fix.fixed_code, ORIGINAL);
        assert_eq!(fix.confidence, CONFIDENCE_PARTIAL);
    }

    #[test]
    fn test_parse_empty_response() {
        let fix = parse_response("", ORIGINAL);
        assert_eq!(fix.fixed_code, ORIGINAL);
        assert_eq!(fix.confidence, CONFIDENCE_PARTIAL);
        assert_eq!(fix.root_cause, "analysis completed");
    }

    #[test]
    fn test_parse_retry_analysis_section() {
        let response = "\
Root cause: missing zero guard.

```python
return a / b if b else 0
```

What was wrong with the previous attempt:
It only handled positive denominators and missed b == 0.
";
        let fix = parse_response(response, ORIGINAL);
        let analysis = fix.retry_analysis.expect("retry analysis captured");
        assert!(analysis.contains("previous attempt"));
        assert!(analysis.contains("b == 0"));
    }

    #[test]
    fn test_code_only_response_has_partial_confidence() {
        let response = "```python\nreturn a / b if b else 0\n```";
        let fix = parse_response(response, ORIGINAL);
        assert!(fix.fixed_code.contains("if b else 0"));
        assert_eq!(fix.confidence, CONFIDENCE_PARTIAL);
    }
}
