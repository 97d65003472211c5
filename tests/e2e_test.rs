use git2::{Repository, Signature};
use patch_stager::{ChangeKind, Patch, PatchDirection, Stager, parse_file_refs, select_hunk};
use similar_asserts::assert_eq;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch git repository
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
        config.set_bool("core.autocrlf", false).unwrap();

        Self { dir, repo }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write_file(&self, name: &str, content: &str) {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn read_file(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).unwrap()
    }

    fn stage_file(&self, name: &str) {
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    /// Content of `name` as recorded in the index
    fn staged(&self, name: &str) -> String {
        let mut index = self.repo.index().unwrap();
        index.read(true).unwrap();
        let entry = index.get_path(Path::new(name), 0).expect("file not in index");
        let blob = self.repo.find_blob(entry.id).unwrap();
        String::from_utf8(blob.content().to_vec()).unwrap()
    }

    fn in_index(&self, name: &str) -> bool {
        let mut index = self.repo.index().unwrap();
        index.read(true).unwrap();
        index.get_path(Path::new(name), 0).is_some()
    }

    fn commit(&self, message: &str) {
        let sig = Signature::new(
            "Test User",
            "test@example.com",
            &git2::Time::new(1234567890, 0),
        )
        .unwrap();
        let tree_id = self.repo.index().unwrap().write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let parents = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parents: Vec<_> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    /// Commit `content` as `name`, then leave `name` in the working tree
    /// with `changed`.
    fn with_change(name: &str, content: &str, changed: &str) -> Self {
        let fixture = Self::new();
        fixture.write_file(name, content);
        fixture.stage_file(name);
        fixture.commit("initial");
        fixture.write_file(name, changed);
        fixture
    }

    /// Commit `content` as `name`, then delete it from the working tree
    fn with_deletion(name: &str, content: &str) -> Self {
        let fixture = Self::new();
        fixture.write_file(name, content);
        fixture.stage_file(name);
        fixture.commit("initial");
        fs::remove_file(fixture.path().join(name)).unwrap();
        fixture
    }

    /// Run git in the repository, asserting success
    fn run_git(&self, args: &[&str]) {
        let output = self.git().args(args).output().expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn git(&self) -> Command {
        let mut command = Command::new("git");
        command.arg("-C").arg(self.path());
        command
    }

    /// Unstaged (or with `cached`, staged) changes with default context
    fn git_diff(&self, cached: bool) -> Arc<Patch> {
        let mut command = self.git();
        command.args([
            "diff",
            "--no-ext-diff",
            "--no-color",
            "--src-prefix=a/",
            "--dst-prefix=b/",
        ]);
        if cached {
            command.arg("--cached");
        }
        let output = command.output().expect("Failed to run git diff");
        assert!(output.status.success());
        Patch::parse_bytes(&output.stdout).unwrap()
    }

    /// Feed `patch` to `git apply` with the flags for `direction`
    fn git_apply(&self, patch: &Patch, direction: PatchDirection) {
        let mut child = self
            .git()
            .arg("apply")
            .args(direction.apply_args())
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn git apply");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(patch.to_string().as_bytes())
            .unwrap();
        let output = child.wait_with_output().unwrap();
        assert!(
            output.status.success(),
            "git apply rejected\n{patch}\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn numbered(range: std::ops::RangeInclusive<u32>) -> String {
    range.map(|i| format!("line {i}\n")).collect()
}

/// Every change of the first file in `diff`
fn whole_first_hunk(diff: &Patch, direction: PatchDirection) -> Arc<Patch> {
    let hunk = &diff.entries()[0].hunks()[0];
    select_hunk(diff, hunk.last_line_index(), direction)
        .unwrap()
        .unwrap()
}

#[test]
fn stage_single_addition() {
    let original = numbered(1..=10);
    let changed = original
        .replace("line 3\n", "line three\n")
        .replace("line 7\n", "line 7\ninserted\n");
    let fixture = Fixture::with_change("file.txt", &original, &changed);

    let stager = Stager::new(fixture.git_diff(false));
    let patch = stager.stage("file.txt:8").unwrap();
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(
        fixture.staged("file.txt"),
        original.replace("line 7\n", "line 7\ninserted\n")
    );
    assert_eq!(fixture.read_file("file.txt"), changed);
}

#[test]
fn stage_single_deletion() {
    let original = numbered(1..=10);
    let changed = original
        .replace("line 2\n", "line two\n")
        .replace("line 5\n", "");
    let fixture = Fixture::with_change("file.txt", &original, &changed);

    let stager = Stager::new(fixture.git_diff(false));
    let patch = stager.stage("file.txt:-5").unwrap();
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(fixture.staged("file.txt"), original.replace("line 5\n", ""));
}

#[test]
fn unstage_one_addition() {
    let fixture = Fixture::with_change("f.txt", "a\nb\nc\n", "a\nB\nc\nd\n");
    fixture.stage_file("f.txt");

    let stager = Stager::new(fixture.git_diff(true));
    let patch = stager.unstage("f.txt:4").unwrap();
    fixture.git_apply(&patch, PatchDirection::Unstage);

    assert_eq!(fixture.staged("f.txt"), "a\nB\nc\n");
    assert_eq!(fixture.read_file("f.txt"), "a\nB\nc\nd\n");
}

#[test]
fn discard_one_addition() {
    let fixture = Fixture::with_change("f.txt", "a\nb\nc\n", "a\nx\nb\nc\ny\n");

    let stager = Stager::new(fixture.git_diff(false));
    let patch = stager.discard("f.txt:2").unwrap();
    fixture.git_apply(&patch, PatchDirection::Discard);

    assert_eq!(fixture.read_file("f.txt"), "a\nb\nc\ny\n");
    assert_eq!(fixture.staged("f.txt"), "a\nb\nc\n");
}

#[test]
fn stage_addition_after_missing_final_newline() {
    let fixture = Fixture::with_change("f.txt", "Line 1\nLine 2", "Line 1\nLine 2 Changed");

    let stager = Stager::new(fixture.git_diff(false));
    let patch = stager.stage("f.txt:2").unwrap();
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(fixture.staged("f.txt"), "Line 1\nLine 2\nLine 2 Changed");
}

#[test]
fn stage_lines_from_two_files() {
    let fixture = Fixture::new();
    fixture.write_file("one.txt", "1\n2\n");
    fixture.write_file("dir/two.txt", "x\ny\n");
    fixture.stage_file("one.txt");
    fixture.stage_file("dir/two.txt");
    fixture.commit("initial");
    fixture.write_file("one.txt", "1\n1.5\n2\n2.5\n");
    fixture.write_file("dir/two.txt", "w\nx\ny\n");

    let stager = Stager::new(fixture.git_diff(false));
    let refs = [
        parse_file_refs("one.txt:4").unwrap(),
        parse_file_refs("dir/two.txt:1").unwrap(),
    ];
    let patch = stager.select_refs(&refs, PatchDirection::Stage).unwrap();
    assert_eq!(patch.entries().len(), 2);
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(fixture.staged("one.txt"), "1\n2\n2.5\n");
    assert_eq!(fixture.staged("dir/two.txt"), "w\nx\ny\n");
}

#[test]
fn stage_second_hunk() {
    let original = numbered(1..=30);
    let changed = original
        .replace("line 2\n", "line two\n")
        .replace("line 25\n", "line twenty-five\n");
    let fixture = Fixture::with_change("file.txt", &original, &changed);

    let diff = fixture.git_diff(false);
    let hunks = diff.entries()[0].hunks();
    assert_eq!(hunks.len(), 2);
    let patch = select_hunk(&diff, hunks[1].last_line_index(), PatchDirection::Stage)
        .unwrap()
        .unwrap();
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(
        fixture.staged("file.txt"),
        original.replace("line 25\n", "line twenty-five\n")
    );
}

#[test]
fn cli_select_prints_applicable_patch() {
    let fixture = Fixture::with_change("f.txt", "a\nb\n", "a\nb\nc\nd\n");
    let diff = fixture.git_diff(false);
    let diff_path = fixture.path().join("changes.diff");
    fs::write(&diff_path, diff.to_string()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_patch-stager"))
        .arg("select")
        .arg(&diff_path)
        .args(["--ref", "f.txt:4"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("git apply --cached"));

    let patch = Patch::parse_bytes(&output.stdout).unwrap();
    fixture.git_apply(&patch, PatchDirection::Stage);
    assert_eq!(fixture.staged("f.txt"), "a\nb\nd\n");
}

#[test]
fn cli_check_reports_parse_errors() {
    let fixture = Fixture::new();
    let path = fixture.path().join("bad.diff");
    fs::write(&path, "diff --git a/x b/x\nindexabc..def 100644\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_patch-stager"))
        .arg("check")
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("2:6"));
}

#[test]
fn stage_part_of_intent_to_add_file() {
    let fixture = Fixture::with_change("seed.txt", "seed\n", "seed\n");
    fixture.write_file("new.txt", "a\nb\n");
    fixture.run_git(&["add", "--intent-to-add", "new.txt"]);

    let diff = fixture.git_diff(false);
    assert_eq!(diff.entries()[0].change_kind(), ChangeKind::Added);
    let patch = Stager::new(diff).stage("new.txt:1").unwrap();
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(fixture.staged("new.txt"), "a\n");
    assert_eq!(fixture.read_file("new.txt"), "a\nb\n");
}

#[test]
fn unstage_part_of_new_file() {
    let fixture = Fixture::with_change("seed.txt", "seed\n", "seed\n");
    fixture.write_file("new.txt", "a\nb\n");
    fixture.stage_file("new.txt");

    let patch = Stager::new(fixture.git_diff(true))
        .unstage("new.txt:2")
        .unwrap();
    // The remaining old side starts at line 1, not 0.
    assert_eq!(patch.entries()[0].hunks()[0].header().old().start, 1);
    fixture.git_apply(&patch, PatchDirection::Unstage);

    assert_eq!(fixture.staged("new.txt"), "a\n");
}

#[test]
fn stage_whole_deleted_file() {
    let fixture = Fixture::with_deletion("gone.txt", "a\nb\n");

    let diff = fixture.git_diff(false);
    assert_eq!(diff.entries()[0].change_kind(), ChangeKind::Deleted);
    let patch = whole_first_hunk(&diff, PatchDirection::Stage);
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert!(!fixture.in_index("gone.txt"));
    assert!(!fixture.in_index("dev/null"));
}

#[test]
fn discard_whole_deleted_file() {
    let fixture = Fixture::with_deletion("gone.txt", "a\nb\n");

    let patch = whole_first_hunk(&fixture.git_diff(false), PatchDirection::Discard);
    fixture.git_apply(&patch, PatchDirection::Discard);

    assert_eq!(fixture.read_file("gone.txt"), "a\nb\n");
    assert_eq!(fixture.staged("gone.txt"), "a\nb\n");
}

#[test]
fn unstage_whole_deleted_file() {
    let fixture = Fixture::with_change("gone.txt", "a\nb\n", "a\nb\n");
    fixture.run_git(&["rm", "--quiet", "gone.txt"]);
    assert!(!fixture.in_index("gone.txt"));

    let patch = whole_first_hunk(&fixture.git_diff(true), PatchDirection::Unstage);
    fixture.git_apply(&patch, PatchDirection::Unstage);

    assert_eq!(fixture.staged("gone.txt"), "a\nb\n");
    assert!(!fixture.path().join("gone.txt").exists());
}

#[test]
fn stage_part_of_deleted_file() {
    let fixture = Fixture::with_deletion("gone.txt", "a\nb\n");

    let patch = Stager::new(fixture.git_diff(false))
        .stage("gone.txt:-1")
        .unwrap();
    assert_eq!(patch.entries()[0].new_path(), "gone.txt");
    fixture.git_apply(&patch, PatchDirection::Stage);

    assert_eq!(fixture.staged("gone.txt"), "b\n");
    assert!(!fixture.path().join("gone.txt").exists());
}
