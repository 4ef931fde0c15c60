//! Git commit collaborator.
//!
//! Commits a verified fix onto a dedicated branch named deterministically
//! from the bug identifier. Invoked only after a successful investigation,
//! never during retries.

use std::path::Path;
use std::process::Command;

use crate::domain::{RemedyError, Result};

/// Run a git subcommand in `repo_dir`, folding failures into `RemedyError`.
fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| RemedyError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RemedyError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Capture the HEAD commit SHA from a git repository.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let sha = run_git(repo_dir, &["rev-parse", "HEAD"])?;
    if sha.is_empty() {
        return Err(RemedyError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Branch name used for a bug's fix commits.
pub fn fix_branch_name(bug_id: &str) -> String {
    format!("fix/bug-{bug_id}")
}

/// Apply a verified fix: create or check out `fix/bug-<bug_id>`, write the
/// fixed code to `file_path`, and commit it.
///
/// `file_path` is validated to stay inside the repository; traversal
/// outside it is rejected before any file is written.
pub fn apply_fix_to_repo(
    repo_dir: &Path,
    bug_id: &str,
    file_path: &str,
    fixed_code: &str,
) -> Result<String> {
    if !repo_dir.is_dir() {
        return Err(RemedyError::Git(format!(
            "{} is not a directory",
            repo_dir.display()
        )));
    }
    if !is_git_repo(repo_dir) {
        return Err(RemedyError::Git(format!(
            "{} is not a git repository",
            repo_dir.display()
        )));
    }

    let repo_root = repo_dir
        .canonicalize()
        .map_err(|e| RemedyError::Git(format!("cannot resolve repo path: {e}")))?;
    let target = normalized_target(&repo_root, file_path)?;

    let branch = fix_branch_name(bug_id);
    if run_git(repo_dir, &["rev-parse", "--verify", &branch]).is_ok() {
        run_git(repo_dir, &["checkout", &branch])?;
    } else {
        run_git(repo_dir, &["checkout", "-b", &branch])?;
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, fixed_code)?;

    run_git(repo_dir, &["add", file_path])?;
    run_git(
        repo_dir,
        &["commit", "-m", &format!("fix: applied fix for bug {bug_id}")],
    )?;

    Ok(format!("fix applied on branch {branch}"))
}

/// Resolve `file_path` against the repo root and reject traversal outside it.
fn normalized_target(repo_root: &Path, file_path: &str) -> Result<std::path::PathBuf> {
    use std::path::Component;

    let relative = Path::new(file_path);
    if relative.is_absolute() {
        return Err(RemedyError::Git(format!(
            "file path must be relative to the repository: {file_path}"
        )));
    }
    let mut normalized = repo_root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            _ => {
                return Err(RemedyError::Git(format!(
                    "path traversal detected in {file_path}"
                )))
            }
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init"]);
        git(dir.path(), &["config", "user.name", "test-user"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[test]
    fn test_apply_fix_creates_branch_and_commits() {
        let repo = make_git_repo();
        let message = apply_fix_to_repo(
            repo.path(),
            "BUG-42",
            "src/calculator.py",
            "def divide(a, b):\n    return a / b if b else 0\n",
        )
        .unwrap();

        assert!(message.contains("fix/bug-BUG-42"));
        let written = std::fs::read_to_string(repo.path().join("src/calculator.py")).unwrap();
        assert!(written.contains("if b else 0"));

        let branch = run_git(repo.path(), &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap();
        assert_eq!(branch, "fix/bug-BUG-42");
    }

    #[test]
    fn test_apply_fix_reuses_existing_branch() {
        let repo = make_git_repo();
        apply_fix_to_repo(repo.path(), "BUG-1", "a.py", "first").unwrap();
        git(repo.path(), &["checkout", "-"]);
        apply_fix_to_repo(repo.path(), "BUG-1", "a.py", "second").unwrap();

        let branch = run_git(repo.path(), &["rev-parse", "--abbrev-ref", "HEAD"]).unwrap();
        assert_eq!(branch, "fix/bug-BUG-1");
    }

    #[test]
    fn test_apply_fix_rejects_path_traversal() {
        let repo = make_git_repo();
        let result = apply_fix_to_repo(repo.path(), "BUG-1", "../outside.py", "code");
        assert!(matches!(result, Err(RemedyError::Git(_))));
    }

    #[test]
    fn test_apply_fix_rejects_absolute_path() {
        let repo = make_git_repo();
        let result = apply_fix_to_repo(repo.path(), "BUG-1", "/etc/passwd", "code");
        assert!(matches!(result, Err(RemedyError::Git(_))));
    }

    #[test]
    fn test_apply_fix_rejects_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        let result = apply_fix_to_repo(dir.path(), "BUG-1", "a.py", "code");
        assert!(result.is_err());
    }

    #[test]
    fn test_capture_head_sha() {
        let repo = make_git_repo();
        let sha = capture_head_sha(repo.path()).unwrap();
        assert_eq!(sha.len(), 40);
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_is_git_repo() {
        let repo = make_git_repo();
        assert!(is_git_repo(repo.path()));
        let plain = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(plain.path()));
    }
}
