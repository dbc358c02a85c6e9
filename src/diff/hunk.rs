use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::char,
    combinator::{opt, rest},
    sequence::preceded,
};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

/// Classification of a single line inside a hunk body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Unchanged line, present in both versions
    Context,
    /// Line only present in the new version
    Addition,
    /// Line only present in the old version
    Deletion,
    /// `\ No newline at end of file` marker for the preceding line
    NoNewline,
}

/// A single line of diff text, kept verbatim (prefix included)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    kind: LineKind,
    text: String,
}

impl DiffLine {
    /// Classify a raw body line by its first character.
    ///
    /// Empty lines are treated as empty context lines, which some tools
    /// emit instead of a lone space.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match text.as_bytes().first() {
            Some(b'+') => LineKind::Addition,
            Some(b'-') => LineKind::Deletion,
            Some(b'\\') => LineKind::NoNewline,
            _ => LineKind::Context,
        };
        Self { kind, text }
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// The raw line, prefix included
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line without its one-character prefix
    pub fn content(&self) -> &str {
        self.text.get(1..).unwrap_or("")
    }

    /// Whether the line can be selected on its own (an addition or deletion)
    pub fn is_change(&self) -> bool {
        matches!(self.kind, LineKind::Addition | LineKind::Deletion)
    }

    /// Whether the line occupies a line number in the old version
    pub fn in_old(&self) -> bool {
        matches!(self.kind, LineKind::Context | LineKind::Deletion)
    }

    /// Whether the line occupies a line number in the new version
    pub fn in_new(&self) -> bool {
        matches!(self.kind, LineKind::Context | LineKind::Addition)
    }
}

/// Coordinates parsed from a `@@ -A,B +C,D @@ heading` line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Everything after the closing `@@`, leading space included
    pub heading: String,
}

impl HunkHeader {
    /// Parse a hunk header. Missing counts default to 1.
    pub fn parse(line: &str) -> Option<Self> {
        header(line).ok().map(|(_, header)| header)
    }
}

fn number(input: &str) -> IResult<&str, u32> {
    nom::character::complete::u32(input)
}

fn range(input: &str) -> IResult<&str, (u32, u32)> {
    (number, opt(preceded(char(','), number)))
        .map(|(start, count)| (start, count.unwrap_or(1)))
        .parse(input)
}

fn header(input: &str) -> IResult<&str, HunkHeader> {
    (tag("@@ -"), range, tag(" +"), range, tag(" @@"), rest)
        .map(
            |(_, (old_start, old_count), _, (new_start, new_count), _, heading)| HunkHeader {
                old_start,
                old_count,
                new_start,
                new_count,
                heading: heading.to_string(),
            },
        )
        .parse(input)
}

/// The side of a diff whose line numbers match the file a patch is
/// applied to.
///
/// Staging applies to the index, which still holds the old side. Reverting
/// applies to the working tree, which holds the new side including every
/// change that is not part of the patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Old,
    New,
}

/// A single hunk of a file diff: its header line and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Position of the hunk within its file diff
    pub index: usize,
    /// The header line exactly as it appeared in the diff
    pub header: String,
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Body lines, header excluded
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Build a hunk from its header line and body.
    ///
    /// An unparseable header still produces a hunk (starting at 0/0) so the
    /// body can be shown and emitted verbatim.
    pub fn parse(index: usize, header: &str, lines: Vec<DiffLine>) -> Self {
        let parsed = HunkHeader::parse(header).unwrap_or_else(|| {
            log::warn!("unparseable hunk header {header:?}");
            HunkHeader::default()
        });

        Hunk {
            index,
            header: header.to_string(),
            old_start: parsed.old_start,
            old_count: parsed.old_count,
            new_start: parsed.new_start,
            new_count: parsed.new_count,
            lines,
        }
    }

    /// Body offsets of every addition and deletion
    pub fn change_offsets(&self) -> BTreeSet<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_change())
            .map(|(offset, _)| offset)
            .collect()
    }

    /// Additions minus deletions
    pub fn line_delta(&self) -> i64 {
        self.lines
            .iter()
            .map(|line| match line.kind() {
                LineKind::Addition => 1,
                LineKind::Deletion => -1,
                LineKind::Context | LineKind::NoNewline => 0,
            })
            .sum()
    }

    /// Text after the closing `@@` of the original header
    pub fn heading(&self) -> &str {
        self.header
            .get(2..)
            .and_then(|tail| tail.find("@@").map(|end| &tail[end + 2..]))
            .unwrap_or("")
    }

    /// Old line number of the first body line.
    ///
    /// Unified diff writes the line *before* the hunk when the old side is
    /// empty, so a pure insertion starts one further down.
    fn first_old_line(&self) -> i64 {
        let has_old_lines = self.lines.iter().any(DiffLine::in_old);
        if has_old_lines {
            self.old_start as i64
        } else {
            self.old_start as i64 + 1
        }
    }

    /// New line number of the first body line, with the same rule for an
    /// empty new side.
    fn first_new_line(&self) -> i64 {
        let has_new_lines = self.lines.iter().any(DiffLine::in_new);
        if has_new_lines {
            self.new_start as i64
        } else {
            self.new_start as i64 + 1
        }
    }

    /// Old and new line numbers of body line `offset`, with `delta` (net
    /// change emitted earlier in the patch) applied to the side that is
    /// not anchored.
    fn position(&self, offset: usize, delta: i64, anchor: Anchor) -> (i64, i64) {
        let before = &self.lines[..offset.min(self.lines.len())];
        match anchor {
            Anchor::Old => {
                let old =
                    self.first_old_line() + before.iter().filter(|l| l.in_old()).count() as i64;
                (old, old + delta)
            }
            Anchor::New => {
                let new =
                    self.first_new_line() + before.iter().filter(|l| l.in_new()).count() as i64;
                (new - delta, new)
            }
        }
    }

    /// Re-emit the whole hunk with a fresh header; `delta` is the net line
    /// change emitted before it and shifts the side `anchor` does not keep.
    pub fn relocated(&self, delta: i64, anchor: Anchor) -> SyntheticHunk {
        let lines: Vec<String> = self.lines.iter().map(|l| l.text.clone()).collect();
        let (old_line, new_line) = self.position(0, delta, anchor);
        SyntheticHunk::at(old_line, new_line, lines, &self.lines, self.heading())
    }

    /// Extract a contiguous run of body lines as a standalone hunk.
    ///
    /// Line numbers are recomputed by walking the body before the run on
    /// the anchored side. `delta` is the net line change of everything
    /// emitted earlier in the patch and positions the other side. A
    /// `\ No newline` marker directly after the run travels with it.
    /// Returns `None` for runs outside the body.
    pub fn extract(
        &self,
        run: RangeInclusive<usize>,
        delta: i64,
        anchor: Anchor,
    ) -> Option<SyntheticHunk> {
        let (start, mut end) = (*run.start(), *run.end());
        if start > end || end >= self.lines.len() {
            return None;
        }
        if self
            .lines
            .get(end + 1)
            .is_some_and(|line| line.kind() == LineKind::NoNewline)
        {
            end += 1;
        }

        let (old_line, new_line) = self.position(start, delta, anchor);
        let body = &self.lines[start..=end];
        let lines = body.iter().map(|l| l.text.clone()).collect();

        Some(SyntheticHunk::at(old_line, new_line, lines, body, ""))
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for line in &self.lines {
            writeln!(f, "{}", line.text)?;
        }
        Ok(())
    }
}

/// A hunk produced during patch synthesis, with freshly computed header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub heading: String,
    pub lines: Vec<String>,
}

impl SyntheticHunk {
    /// Build a hunk whose first body line sits at `old_line`/`new_line`.
    /// Empty sides point at the line before, as unified diff expects.
    fn at(old_line: i64, new_line: i64, lines: Vec<String>, body: &[DiffLine], heading: &str) -> Self {
        let old_count = body.iter().filter(|l| l.in_old()).count() as u32;
        let new_count = body.iter().filter(|l| l.in_new()).count() as u32;

        let start = |line: i64, count: u32| {
            let line = if count == 0 { line - 1 } else { line };
            line.max(0) as u32
        };

        SyntheticHunk {
            old_start: start(old_line, old_count),
            old_count,
            new_start: start(new_line, new_count),
            new_count,
            heading: heading.to_string(),
            lines,
        }
    }

    /// Net line change of this hunk
    pub fn line_delta(&self) -> i64 {
        self.new_count as i64 - self.old_count as i64
    }
}

impl fmt::Display for SyntheticHunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "@@ -{},{} +{},{} @@{}",
            self.old_start, self.old_count, self.new_start, self.new_count, self.heading
        )?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Group sorted offsets into maximal runs of consecutive integers
pub fn contiguous_runs(offsets: &BTreeSet<usize>) -> Vec<RangeInclusive<usize>> {
    let mut runs = Vec::new();
    let mut iter = offsets.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };

    let (mut start, mut end) = (first, first);
    for offset in iter {
        if offset == end + 1 {
            end = offset;
        } else {
            runs.push(start..=end);
            start = offset;
            end = offset;
        }
    }
    runs.push(start..=end);

    runs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn hunk(header: &str, body: &[&str]) -> Hunk {
        Hunk::parse(0, header, body.iter().map(|l| DiffLine::new(*l)).collect())
    }

    // =========================================================================
    // Header parsing
    // =========================================================================

    #[test]
    fn parse_header_with_counts() {
        let header = HunkHeader::parse("@@ -10,2 +10,3 @@").unwrap();
        assert_eq!(
            header,
            HunkHeader {
                old_start: 10,
                old_count: 2,
                new_start: 10,
                new_count: 3,
                heading: String::new(),
            }
        );
    }

    #[test]
    fn parse_header_missing_counts_default_to_one() {
        let header = HunkHeader::parse("@@ -15 +14,0 @@").unwrap();
        assert_eq!(header.old_start, 15);
        assert_eq!(header.old_count, 1);
        assert_eq!(header.new_start, 14);
        assert_eq!(header.new_count, 0);
    }

    #[test]
    fn parse_header_keeps_heading() {
        let header = HunkHeader::parse("@@ -38,0 +39,5 @@ fn main() {").unwrap();
        assert_eq!(header.heading, " fn main() {");
    }

    #[test]
    fn parse_header_rejects_garbage() {
        assert!(HunkHeader::parse("@@ nonsense @@").is_none());
        assert!(HunkHeader::parse("@@@ -1,2 -1,2 +1,3 @@@").is_none());
    }

    #[test]
    fn unparseable_header_still_builds_hunk() {
        let hunk = hunk("@@ garbage @@", &["+x"]);
        assert_eq!(hunk.old_start, 0);
        assert_eq!(hunk.new_start, 0);
        assert_eq!(hunk.lines.len(), 1);
    }

    // =========================================================================
    // Line classification
    // =========================================================================

    #[test]
    fn classify_lines() {
        assert_eq!(DiffLine::new(" same").kind(), LineKind::Context);
        assert_eq!(DiffLine::new("").kind(), LineKind::Context);
        assert_eq!(DiffLine::new("+added").kind(), LineKind::Addition);
        assert_eq!(DiffLine::new("-removed").kind(), LineKind::Deletion);
        assert_eq!(
            DiffLine::new("\\ No newline at end of file").kind(),
            LineKind::NoNewline
        );
        assert_eq!(DiffLine::new("+++ looks like a header").content(), "++ looks like a header");
    }

    #[test]
    fn change_offsets_skip_context_and_markers() {
        let hunk = hunk(
            "@@ -1,3 +1,3 @@",
            &[" a", "-b", "\\ No newline at end of file", "+c", " d"],
        );
        assert_eq!(hunk.change_offsets(), BTreeSet::from([1, 3]));
        assert_eq!(hunk.line_delta(), 0);
    }

    #[test]
    fn heading_is_text_after_header() {
        let hunk = hunk("@@ -1,2 +1,2 @@ impl Foo", &[" a"]);
        assert_eq!(hunk.heading(), " impl Foo");
        assert_eq!(self::hunk("@@ -1 +1 @@", &["-a", "+b"]).heading(), "");
    }

    // =========================================================================
    // Run extraction
    // =========================================================================

    #[test]
    fn runs_split_on_gaps() {
        let offsets = BTreeSet::from([1, 2, 3, 5, 8, 9]);
        assert_eq!(contiguous_runs(&offsets), vec![1..=3, 5..=5, 8..=9]);
        assert!(contiguous_runs(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn extract_replacement_after_leading_context() {
        let hunk = hunk("@@ -10,4 +10,4 @@", &[" a", " b", "+c", "-d", " e"]);
        let extracted = hunk.extract(2..=3, 0, Anchor::Old).unwrap();
        assert_eq!(extracted.to_string(), "@@ -12,1 +12,1 @@\n+c\n-d\n");
    }

    #[test]
    fn extract_pure_insertion_points_at_previous_line() {
        let hunk = hunk("@@ -10,2 +10,4 @@", &[" a", "+b", "+c", " d"]);
        let extracted = hunk.extract(2..=2, 0, Anchor::Old).unwrap();
        assert_eq!(extracted.to_string(), "@@ -10,0 +11,1 @@\n+c\n");
    }

    #[test]
    fn extract_pure_deletion_points_at_previous_new_line() {
        let hunk = hunk("@@ -15 +14,0 @@", &["-gone"]);
        let extracted = hunk.extract(0..=0, 0, Anchor::Old).unwrap();
        assert_eq!(extracted.to_string(), "@@ -15,1 +14,0 @@\n-gone\n");
    }

    #[test]
    fn extract_from_zero_context_insertion() {
        // -U0 insertion hunks name the line before the insertion
        let hunk = hunk("@@ -38,0 +39,3 @@", &["+one", "+two", "+three"]);
        let extracted = hunk.extract(1..=2, 0, Anchor::Old).unwrap();
        assert_eq!(extracted.to_string(), "@@ -38,0 +39,2 @@\n+two\n+three\n");
    }

    #[test]
    fn extract_applies_delta_to_new_side() {
        let hunk = hunk("@@ -20,2 +25,2 @@", &[" x", "-y", "+z"]);
        let extracted = hunk.extract(1..=2, 3, Anchor::Old).unwrap();
        assert_eq!(extracted.old_start, 21);
        assert_eq!(extracted.new_start, 24);
    }

    #[test]
    fn extract_carries_no_newline_marker() {
        let hunk = hunk(
            "@@ -3 +3 @@",
            &["-old", "+new", "\\ No newline at end of file"],
        );
        let extracted = hunk.extract(1..=1, 0, Anchor::Old).unwrap();
        assert_eq!(
            extracted.to_string(),
            "@@ -3,0 +4,1 @@\n+new\n\\ No newline at end of file\n"
        );
    }

    #[test]
    fn extract_out_of_range_is_none() {
        let hunk = hunk("@@ -1 +1 @@", &["-a", "+b"]);
        assert!(hunk.extract(1..=5, 0, Anchor::Old).is_none());
    }

    #[test]
    fn relocated_whole_hunk_shifts_new_start() {
        let hunk = hunk("@@ -10,3 +12,4 @@ fn f()", &[" a", "+b", " c", " d"]);
        let moved = hunk.relocated(0, Anchor::Old);
        assert_eq!(
            moved.to_string(),
            "@@ -10,3 +10,4 @@ fn f()\n a\n+b\n c\n d\n"
        );
    }

    #[test]
    fn new_anchor_skips_earlier_deletions() {
        // the working tree no longer has `d`, so `f` sits at line 5 there
        let hunk = hunk("@@ -3,4 +3,2 @@", &[" c", "-d", " e", "-f"]);
        assert_eq!(
            hunk.extract(3..=3, 0, Anchor::New).unwrap().to_string(),
            "@@ -5,1 +4,0 @@\n-f\n"
        );
        assert_eq!(
            hunk.extract(3..=3, 0, Anchor::Old).unwrap().to_string(),
            "@@ -6,1 +5,0 @@\n-f\n"
        );
    }

    #[test]
    fn new_anchor_counts_earlier_insertions() {
        let hunk = hunk("@@ -1,2 +1,4 @@", &[" a", "+b", "+c", " d"]);
        let extracted = hunk.extract(2..=2, 0, Anchor::New).unwrap();
        assert_eq!(extracted.to_string(), "@@ -2,0 +3,1 @@\n+c\n");
    }

    #[test]
    fn new_anchor_relocation_shifts_old_side() {
        let hunk = hunk("@@ -10,2 +12,2 @@ section", &[" x", "-y", "+z"]);
        assert_eq!(
            hunk.relocated(1, Anchor::New).to_string(),
            "@@ -11,2 +12,2 @@ section\n x\n-y\n+z\n"
        );
    }

    #[test]
    fn display_is_verbatim() {
        let text = "@@ -1,2 +1,2 @@ heading\n a\n-b\n+c\n";
        let hunk = hunk("@@ -1,2 +1,2 @@ heading", &[" a", "-b", "+c"]);
        assert_eq!(hunk.to_string(), text);
    }
}
