pub mod file;
pub mod hunk;

pub use file::{FileChange, FileDiff};
pub use hunk::{Anchor, DiffLine, Hunk, LineKind};

/// Format a file diff for user display with hunk indices and body offsets.
///
/// The numbers shown are exactly what selection references use, e.g.
/// `src/main.rs:1/2..3` for lines 2 and 3 of hunk 1.
pub fn format_diff(diff: &FileDiff) -> String {
    let mut result = String::new();
    result.push_str(&diff.path);
    result.push_str(":\n");

    if diff.is_empty() {
        result.push_str("  (no textual hunks)\n");
        return result;
    }

    for hunk in &diff.hunks {
        result.push_str(&format!("  [{}] {}\n", hunk.index, hunk.header));
        for (offset, line) in hunk.lines.iter().enumerate() {
            match line.kind() {
                LineKind::Addition | LineKind::Deletion => {
                    result.push_str(&format!("  {:>4}:\t{}\n", offset, line.text()));
                }
                LineKind::Context | LineKind::NoNewline => {
                    result.push_str(&format!("       \t{}\n", line.text()));
                }
            }
        }
    }

    result
}
