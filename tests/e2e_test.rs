use git_partial::{CommitMessage, GitPartial, GitPartialError, SessionError, Settings};
use git2::{Repository, Signature};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Test fixture for a git repository
struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    /// Create a new empty repo with deterministic config
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Repository::init(dir.path()).expect("Failed to init repo");

        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        config.set_bool("commit.gpgsign", false).unwrap();

        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn read_file(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(name)).unwrap()
    }

    /// Commit `name` with `content` as the starting point of a test
    fn commit_file(&self, name: &str, content: &str) {
        self.write_file(name, content);

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();

        let sig = Signature::new(
            "Test User",
            "test@example.com",
            &git2::Time::new(1234567890, 0),
        )
        .unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        match self.repo.head() {
            Ok(head) => {
                let parent = head.peel_to_commit().unwrap();
                self.repo
                    .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[&parent])
                    .unwrap();
            }
            Err(_) => {
                self.repo
                    .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                    .unwrap();
            }
        }
    }

    /// Content of `name` in the HEAD commit
    fn head_content(&self, name: &str) -> String {
        let tree = self.repo.head().unwrap().peel_to_tree().unwrap();
        let entry = tree.get_path(Path::new(name)).unwrap();
        let blob = entry.to_object(&self.repo).unwrap().peel_to_blob().unwrap();
        String::from_utf8(blob.content().to_vec()).unwrap()
    }

    fn head_message(&self) -> String {
        let commit = self.repo.head().unwrap().peel_to_commit().unwrap();
        commit.message().unwrap().to_string()
    }

    /// Unstaged changes of `file`
    fn git_diff(&self, file: &str) -> String {
        let output = Command::new("git")
            .args([
                "-C",
                self.path().to_str().unwrap(),
                "diff",
                "--no-ext-diff",
                "-U0",
                "--no-color",
                file,
            ])
            .output()
            .expect("Failed to run git diff");
        String::from_utf8(output.stdout).unwrap()
    }

    fn open(&self) -> GitPartial {
        GitPartial::open(self.path(), &Settings::default()).unwrap()
    }
}

fn numbered(lines: std::ops::RangeInclusive<u32>) -> Vec<String> {
    lines.map(|i| format!("line {i}")).collect()
}

fn text(lines: &[String]) -> String {
    lines.join("\n") + "\n"
}

/// Ten lines with lines 3 and 8 changed: one hunk at default context
fn two_edits(fixture: &Fixture) -> (String, String) {
    let original = numbered(1..=10);
    fixture.commit_file("file.txt", &text(&original));

    let mut edited = original.clone();
    edited[2] = "LINE 3".to_string();
    edited[7] = "LINE 8".to_string();
    fixture.write_file("file.txt", &text(&edited));

    (text(&original), text(&edited))
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn diff_lists_hunk_indices_and_offsets() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    let listing = fixture.open().diff(&[]).unwrap();
    assert!(listing.starts_with("file.txt:\n  [0] @@ -1,10 +1,10 @@\n"));
    assert!(listing.contains("     2:\t-line 3\n     3:\t+LINE 3\n"));
    assert!(listing.contains("     8:\t-line 8\n     9:\t+LINE 8\n"));
}

// =============================================================================
// Commit
// =============================================================================

#[test]
fn commit_selected_lines_only() {
    let fixture = Fixture::new();
    let (_, edited) = two_edits(&fixture);

    fixture
        .open()
        .commit(
            &["file.txt:0/2..3".to_string()],
            CommitMessage::new("Capitalise line 3", Some("Only that one.".into())),
        )
        .unwrap();

    let mut expected = numbered(1..=10);
    expected[2] = "LINE 3".to_string();
    assert_eq!(fixture.head_content("file.txt"), text(&expected));
    assert_eq!(fixture.head_message(), "Capitalise line 3\n\nOnly that one.\n");

    // working tree untouched, the other edit still pending
    assert_eq!(fixture.read_file("file.txt"), edited);
    let remaining = fixture.git_diff("file.txt");
    assert!(remaining.contains("-line 8\n+LINE 8\n"));
    assert!(!remaining.contains("LINE 3"));
}

#[test]
fn commit_only_an_addition_line() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    fixture
        .open()
        .commit(&["file.txt:0/9".to_string()], CommitMessage::new("Add", None))
        .unwrap();

    let mut expected = numbered(1..=10);
    expected.insert(8, "LINE 8".to_string());
    assert_eq!(fixture.head_content("file.txt"), text(&expected));
}

#[test]
fn commit_later_hunk_after_unselected_insertion() {
    let fixture = Fixture::new();
    let original = numbered(1..=30);
    fixture.commit_file("file.txt", &text(&original));

    let mut edited = original.clone();
    edited[24] = "LINE 25".to_string();
    edited.insert(3, "inserted".to_string());
    fixture.write_file("file.txt", &text(&edited));

    fixture
        .open()
        .commit(&["file.txt:1".to_string()], CommitMessage::new("Late hunk", None))
        .unwrap();

    let mut expected = original;
    expected[24] = "LINE 25".to_string();
    assert_eq!(fixture.head_content("file.txt"), text(&expected));
}

#[test]
fn commit_untracked_file() {
    let fixture = Fixture::new();
    fixture.commit_file("keep.txt", "keep\n");
    fixture.write_file("new.txt", "one\ntwo\n");

    fixture
        .open()
        .commit(&["new.txt".to_string()], CommitMessage::new("Add new", None))
        .unwrap();

    assert_eq!(fixture.head_content("new.txt"), "one\ntwo\n");
}

// =============================================================================
// Discard
// =============================================================================

#[test]
fn discard_selected_lines_only() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    fixture
        .open()
        .discard(&["file.txt:0/2..3".to_string()])
        .unwrap();

    let mut expected = numbered(1..=10);
    expected[7] = "LINE 8".to_string();
    assert_eq!(fixture.read_file("file.txt"), text(&expected));
}

#[test]
fn discard_whole_file() {
    let fixture = Fixture::new();
    let (original, _) = two_edits(&fixture);

    fixture.open().discard(&["file.txt".to_string()]).unwrap();
    assert_eq!(fixture.read_file("file.txt"), original);
}

#[test]
fn discard_line_below_unselected_deletion() {
    let fixture = Fixture::new();
    let original = numbered(1..=10);
    fixture.commit_file("file.txt", &text(&original));

    let mut edited = original.clone();
    edited.remove(5);
    edited.remove(3);
    fixture.write_file("file.txt", &text(&edited));

    // offset 3 removes line 4, offset 5 removes line 6
    fixture
        .open()
        .discard(&["file.txt:0/5".to_string()])
        .unwrap();

    let mut expected = original;
    expected.remove(3);
    assert_eq!(fixture.read_file("file.txt"), text(&expected));
}

#[test]
fn discard_line_below_unselected_insertion() {
    let fixture = Fixture::new();
    let original = numbered(1..=10);
    fixture.commit_file("file.txt", &text(&original));

    let mut edited = original.clone();
    edited[5] = "LINE 6".to_string();
    edited.insert(2, "inserted".to_string());
    fixture.write_file("file.txt", &text(&edited));

    // offset 2 is the insertion, 6..7 replace line 6
    fixture
        .open()
        .discard(&["file.txt:0/6..7".to_string()])
        .unwrap();

    let mut expected = original;
    expected.insert(2, "inserted".to_string());
    assert_eq!(fixture.read_file("file.txt"), text(&expected));
}

#[test]
fn discard_whole_hunk_after_partial_one() {
    let fixture = Fixture::new();
    let original = numbered(1..=30);
    fixture.commit_file("file.txt", &text(&original));

    let mut edited = original.clone();
    edited[24] = "LINE 25".to_string();
    edited.insert(2, "inserted B".to_string());
    edited.insert(2, "inserted A".to_string());
    fixture.write_file("file.txt", &text(&edited));

    fixture
        .open()
        .discard(&["file.txt:0/2".to_string(), "file.txt:1".to_string()])
        .unwrap();

    let mut expected = original;
    expected.insert(2, "inserted B".to_string());
    assert_eq!(fixture.read_file("file.txt"), text(&expected));
}

#[test]
fn discard_lines_of_untracked_file() {
    let fixture = Fixture::new();
    fixture.commit_file("keep.txt", "keep\n");
    fixture.write_file("new.txt", "one\ntwo\nthree\n");

    fixture
        .open()
        .discard(&["new.txt:0/1".to_string()])
        .unwrap();

    assert_eq!(fixture.read_file("new.txt"), "one\nthree\n");
}

#[test]
fn discard_whole_untracked_file() {
    let fixture = Fixture::new();
    fixture.commit_file("keep.txt", "keep\n");
    fixture.write_file("new.txt", "one\ntwo\n");

    fixture.open().discard(&["new.txt".to_string()]).unwrap();
    assert!(!fixture.path().join("new.txt").exists());
}

// =============================================================================
// Rejected references
// =============================================================================

#[test]
fn unchanged_file_is_rejected() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    let result = fixture.open().commit(
        &["other.txt".to_string()],
        CommitMessage::new("Nothing", None),
    );
    assert!(matches!(result, Err(GitPartialError::NoChanges { .. })));
}

#[test]
fn missing_hunk_is_rejected() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    let result = fixture.open().discard(&["file.txt:4".to_string()]);
    assert!(matches!(
        result,
        Err(GitPartialError::UnknownHunk { hunk: 4, .. })
    ));
    assert!(fixture.git_diff("file.txt").contains("LINE 3"));
}

#[test]
fn context_offset_is_rejected() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    let result = fixture.open().discard(&["file.txt:0/0".to_string()]);
    assert!(matches!(
        result,
        Err(GitPartialError::NotAChange { offset: 0, .. })
    ));
}

#[test]
fn partial_selection_blocked_when_disabled() {
    let fixture = Fixture::new();
    two_edits(&fixture);

    let settings = Settings {
        partial_patches: false,
        ..Settings::default()
    };
    let mut partial = GitPartial::open(fixture.path(), &settings).unwrap();
    let result = partial.discard(&["file.txt:0/2..3".to_string()]);
    assert!(matches!(
        result,
        Err(GitPartialError::SessionError(SessionError::PartialUnsupported { .. }))
    ));
}
