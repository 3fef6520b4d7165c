use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use shipyard::config::{Config, Repo};
use shipyard::context::ReleaseContext;
use shipyard::errors::{Kind, Op};
use shipyard::git::Git;
use shipyard::pipeline::Stage;
use shipyard::stages::git::{GitStage, GitStateError, check_version_format};
use tempfile::tempdir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("git runs");
    assert!(status.status.success(), "git {args:?} failed: {status:?}");
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["remote", "add", "origin", "git@github.com:acme/tool.git"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", "first"]);
}

const SNAPSHOT_WARNING: &str = "accepting to run without a git repo because this is a snapshot";

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn context(dir: &Path) -> ReleaseContext {
    ReleaseContext::new(Config::default(), dir)
}

#[test]
fn snapshot_outside_repository_uses_sentinel() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    let mut ctx = context(temp.path());
    ctx.snapshot = true;

    GitStage.run(&mut ctx).unwrap();
    assert_eq!(ctx.git.current_tag, "v0.0.0");
    assert_eq!(ctx.git.commit, "none");
    assert_eq!(ctx.version, "0.0.0");
}

#[test]
fn snapshot_outside_repository_logs_warning() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    let mut ctx = context(temp.path());
    ctx.snapshot = true;

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::with_default(subscriber, || GitStage.run(&mut ctx).unwrap());

    let output = logs.contents();
    let line = output
        .lines()
        .find(|line| line.contains(SNAPSHOT_WARNING))
        .unwrap_or_else(|| panic!("warning not logged:\n{output}"));
    assert!(line.contains("WARN"), "unexpected level: {line}");
    assert!(!output.lines().any(|line| line.contains("ERROR")));
}

#[test]
fn outside_repository_fails_without_snapshot() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    let mut ctx = context(temp.path());

    let err = GitStage.run(&mut ctx).unwrap_err();
    assert!(!err.is_skip());
    assert_eq!(err.ops(), vec![Op("git.Run"), Op("git.getInfo")]);
    assert!(matches!(
        err.find_cause::<GitStateError>(),
        Some(GitStateError::NotRepository)
    ));
}

#[test]
fn tagged_clean_repository_validates() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    init_repo(temp.path());
    git(temp.path(), &["tag", "v1.2.3"]);

    let mut ctx = context(temp.path());
    GitStage.run(&mut ctx).unwrap();
    assert_eq!(ctx.git.current_tag, "v1.2.3");
    assert_eq!(ctx.version, "1.2.3");
    assert_eq!(ctx.git.commit, ctx.git.full_commit);
    assert!(ctx.git.full_commit.starts_with(&ctx.git.short_commit));
    assert_eq!(
        Git::new(temp.path()).remote_repo().unwrap(),
        Repo {
            owner: "acme".into(),
            name: "tool".into()
        }
    );
}

#[test]
fn dirty_tree_is_rejected() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    init_repo(temp.path());
    git(temp.path(), &["tag", "v1.0.0"]);
    fs::write(temp.path().join("untracked.txt"), "x").unwrap();

    let mut ctx = context(temp.path());
    let err = GitStage.run(&mut ctx).unwrap_err();
    match err.find_cause::<GitStateError>() {
        Some(GitStateError::Dirty { status }) => assert!(status.contains("untracked.txt")),
        other => panic!("expected a dirty state error, got {other:?}"),
    }

    let mut ctx = context(temp.path());
    ctx.skip_validate = true;
    GitStage.run(&mut ctx).unwrap();
}

#[test]
fn tag_on_older_commit_is_wrong_ref() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    init_repo(temp.path());
    git(temp.path(), &["tag", "v1.0.0"]);
    git(temp.path(), &["commit", "-q", "--allow-empty", "-m", "second"]);

    let mut ctx = context(temp.path());
    let err = GitStage.run(&mut ctx).unwrap_err();
    match err.find_cause::<GitStateError>() {
        Some(GitStateError::WrongRef { tag, commit }) => {
            assert_eq!(tag, "v1.0.0");
            assert_eq!(commit, &ctx.git.commit);
        }
        other => panic!("expected a wrong ref error, got {other:?}"),
    }
}

#[test]
fn untagged_snapshot_keeps_resolved_commit() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    init_repo(temp.path());

    let mut ctx = context(temp.path());
    ctx.snapshot = true;
    GitStage.run(&mut ctx).unwrap();
    assert_eq!(ctx.git.current_tag, "v0.0.0");
    assert_ne!(ctx.git.commit, "none");
    assert!(!ctx.git.commit.is_empty());

    let mut ctx = context(temp.path());
    let err = GitStage.run(&mut ctx).unwrap_err();
    assert!(matches!(err.find_cause::<GitStateError>(), Some(GitStateError::NoTag)));
}

#[test]
fn short_hash_setting_uses_short_commit() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    init_repo(temp.path());
    git(temp.path(), &["tag", "v2.0.0"]);

    let mut ctx = context(temp.path());
    ctx.config.git.short_hash = true;
    GitStage.run(&mut ctx).unwrap();
    assert_eq!(ctx.git.commit, ctx.git.short_commit);
}

#[test]
fn version_format_classification() {
    let err = check_version_format("abc").unwrap_err();
    assert_eq!(err.kind(), Kind::SemVerError);
    assert!(matches!(
        err.find_cause::<GitStateError>(),
        Some(GitStateError::InvalidVersionFormat { version }) if version == "abc"
    ));
    assert!(check_version_format("1.2.3-rc1").is_ok());
}
