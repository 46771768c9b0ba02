//! Textual PRD diff summary for delta sessions.
//!
//! The summary is a free-form human-readable string; nothing downstream
//! parses it.

use similar::{ChangeTag, TextDiff};

/// Summarize the change from `old` to `new` as inserted/removed line counts
/// plus an overall similarity ratio.
#[must_use]
pub fn diff_summary(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut inserted = 0usize;
    let mut removed = 0usize;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => inserted += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    let ratio = diff.ratio();
    if inserted == 0 && removed == 0 {
        "PRD unchanged".to_string()
    } else {
        format!(
            "{inserted} line(s) added, {removed} line(s) removed ({:.0}% similar)",
            ratio * 100.0
        )
    }
}
