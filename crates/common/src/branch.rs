use once_cell::sync::Lazy;
use regex::Regex;

static TICKET_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([A-Z]+-\d+)").expect("valid ticket pattern"));

/// Extracts a work-item code like `ABC-123` from a branch name, upper-cased.
/// Returns `None` when the branch carries no such token.
pub fn ticket_code(branch: &str) -> Option<String> {
    TICKET_CODE
        .find(branch)
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// Turns a push ref (`refs/heads/feature/x`) into a plain branch name.
pub fn strip_ref_prefix(git_ref: &str) -> &str {
    git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref)
}

/// Branches starting with any configured prefix are dropped before
/// classification, for either provider.
pub fn is_ignored(branch: &str, ignored_prefixes: &[String]) -> bool {
    ignored_prefixes
        .iter()
        .any(|prefix| branch.starts_with(prefix.as_str()))
}
