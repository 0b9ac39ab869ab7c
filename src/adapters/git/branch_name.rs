//! Branch name checks applied before a name reaches a git command line.

use thiserror::Error;

/// A branch name rejected by [`validate_branch_name`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid branch name '{name}': {reason}")]
pub struct InvalidBranchName {
    /// The offending name.
    pub name: String,
    /// Which rule it breaks.
    pub reason: String,
}

/// Validates a git branch name to prevent command injection.
///
/// Rejects names that could be interpreted as git flags or otherwise subvert
/// git command execution. Follows `git check-ref-format` rules.
pub fn validate_branch_name(name: &str) -> Result<(), InvalidBranchName> {
    let invalid = |reason: String| {
        Err(InvalidBranchName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("must not be empty".to_string());
    }
    if name.starts_with('-') {
        return invalid("must not start with '-'".to_string());
    }
    if name.contains("..") || name.contains("@{") || name.contains("//") {
        return invalid("must not contain '..', '@{' or '//'".to_string());
    }
    if name.starts_with('/') || name.ends_with('/') || name.ends_with('.') {
        return invalid("must not start with '/' or end with '/' or '.'".to_string());
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| ch.is_ascii_control() || matches!(ch, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return invalid(format!("contains disallowed character {ch:?}"));
    }
    if name.ends_with(".lock") || name.split('/').any(|part| part.starts_with('.')) {
        return invalid("components must not start with '.' or end with '.lock'".to_string());
    }
    Ok(())
}
