//! Line diff summaries of rewritten files.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

/// How much a file changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub additions: usize,
    pub deletions: usize,
}

impl DiffStat {
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }
}

/// Count added and removed lines between `old` and `new`.
pub fn diff_stat(old: &str, new: &str) -> DiffStat {
    if old == new {
        return DiffStat::default();
    }
    let mut stat = DiffStat::default();
    for change in TextDiff::from_lines(old, new).iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stat.additions += 1,
            ChangeTag::Delete => stat.deletions += 1,
            ChangeTag::Equal => {}
        }
    }
    stat
}

/// Unified diff of `old` against `new`, for debug logs.
pub fn unified_diff(name: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(2)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}
