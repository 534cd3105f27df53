use serde::Deserialize;

/// The ref a provider reports as the range base when a branch has no
/// prior history.
pub const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// Dependency lock files churn thousands of generated lines; they are
/// noise for change-size metrics and never counted.
const LOCK_FILES: &[&str] = &["package-lock.json", "yarn.lock", "pnpm-lock.yaml"];

pub fn is_lock_file(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path);
    LOCK_FILES.contains(&basename)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffTotals {
    pub additions: i64,
    pub deletions: i64,
    /// File count for per-file results, changed-line count for diff-text
    /// results; both providers report the field under the same name.
    pub changed_files: i64,
}

/// One entry of a per-file listing (GitHub pull files / compare / commit).
#[derive(Debug, Clone, Deserialize)]
pub struct FileDiff {
    pub filename: String,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
}

/// One entry of a diff-text listing (GitLab changes / compare / commit diff).
#[derive(Debug, Clone, Deserialize)]
pub struct TextDiff {
    #[serde(default)]
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub diff: String,
}

pub fn totals_from_files(files: &[FileDiff]) -> DiffTotals {
    let mut totals = DiffTotals::default();
    for file in files {
        if is_lock_file(&file.filename) {
            continue;
        }
        totals.additions += file.additions;
        totals.deletions += file.deletions;
        totals.changed_files += 1;
    }
    totals
}

pub fn totals_from_text_diffs(diffs: &[TextDiff]) -> DiffTotals {
    let mut totals = DiffTotals::default();
    for entry in diffs {
        if is_lock_file(&entry.new_path) || is_lock_file(&entry.old_path) {
            continue;
        }
        for line in entry.diff.lines() {
            let added = line.starts_with('+') && !line.starts_with("+++");
            let removed = line.starts_with('-') && !line.starts_with("---");
            if added {
                totals.additions += 1;
            }
            if removed {
                totals.deletions += 1;
            }
            if added || removed {
                totals.changed_files += 1;
            }
        }
    }
    totals
}
