//! Language-specific execution command templates.
//!
//! Each template reads the candidate program from standard input, so the
//! code never touches the host filesystem namespace. Compile-to-run
//! languages stage the source inside the container's own filesystem.

use remedy_core::Language;

/// Shell command template for running stdin-delivered code in `language`.
pub fn command_template(language: Language) -> &'static str {
    match language {
        Language::Python => "python3 -c \"import sys; exec(sys.stdin.read())\"",
        Language::Javascript => "node -e \"$(cat)\"",
        Language::Go => "cat > main.go && go run main.go",
        Language::GoTest => "go test ./...",
        Language::Rust => "cat > main.rs && rustc main.rs -o main && ./main",
        Language::CargoTest => "cargo test",
        Language::NpmTest => "npm test",
        Language::Shell => "/bin/sh",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_command_mappings() {
        let cases = [
            (
                Language::Python,
                "python3 -c \"import sys; exec(sys.stdin.read())\"",
            ),
            (Language::Javascript, "node -e \"$(cat)\""),
            (Language::Go, "cat > main.go && go run main.go"),
            (Language::GoTest, "go test ./..."),
            (Language::Rust, "cat > main.rs && rustc main.rs -o main && ./main"),
            (Language::CargoTest, "cargo test"),
            (Language::NpmTest, "npm test"),
            (Language::Shell, "/bin/sh"),
        ];
        for (language, expected) in cases {
            assert_eq!(command_template(language), expected, "mapping for {language}");
        }
    }

    #[test]
    fn test_unknown_language_string_maps_to_python_template() {
        let language = Language::parse("unknown-lang");
        assert_eq!(
            command_template(language),
            "python3 -c \"import sys; exec(sys.stdin.read())\""
        );
    }
}
