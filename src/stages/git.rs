//! Resolves and validates the repository state a release is cut from.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::{GitInfo, ReleaseContext};
use crate::deprecate;
use crate::errlog;
use crate::errors::{Kind, Op, ReleaseError, Result, ResultExt, Source, Wrap, skip};
use crate::git::Git;
use crate::pipeline::Stage;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[0-9.]+").expect("version pattern is valid"));

#[derive(Debug, Error)]
pub enum GitStateError {
    #[error("git not present in PATH")]
    NoGit,
    #[error("current folder is not a git repository")]
    NotRepository,
    #[error("git doesn't contain any tags. Either add a tag or use --snapshot")]
    NoTag,
    #[error("git is currently in a dirty state:\n{status}")]
    Dirty { status: String },
    #[error("{version} is not in a valid version format")]
    InvalidVersionFormat { version: String },
    #[error("git tag {tag} was not made against commit {commit}")]
    WrongRef { commit: String, tag: String },
}

impl From<GitStateError> for Source {
    fn from(err: GitStateError) -> Self {
        Source::Foreign(anyhow::Error::new(err))
    }
}

pub struct GitStage;

impl Stage for GitStage {
    fn name(&self) -> &'static str {
        "git"
    }

    fn describe(&self) -> &'static str {
        "getting and validating git state"
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("git.Run");
        if !Git::available() {
            return Err(ReleaseError::caused_by(OP, GitStateError::NoGit));
        }
        if ctx.config.git.short_hash {
            deprecate::notice("git.short_hash");
        }
        let git = Git::new(&ctx.workdir);
        let info = resolve_info(ctx, &git).wrap_op(OP)?;
        info!(
            tag = %info.current_tag,
            commit = %info.commit,
            "releasing {}, commit {}",
            info.current_tag,
            info.commit
        );
        ctx.version = info
            .current_tag
            .strip_prefix('v')
            .unwrap_or(&info.current_tag)
            .to_string();
        ctx.git = info;

        match validate(ctx, &git) {
            Err(err) if err.is_skip() => {
                errlog::report(&err);
                Ok(())
            }
            other => other.wrap_op(OP),
        }
    }
}

/// Repository metadata, falling back to [`GitInfo::snapshot_sentinel`] when
/// a snapshot runs outside a usable repository.
pub fn resolve_info(ctx: &ReleaseContext, git: &Git) -> Result<GitInfo> {
    const OP: Op = Op("git.getInfo");
    let in_repo = git.is_repo();
    if !in_repo && ctx.snapshot {
        warn!("accepting to run without a git repo because this is a snapshot");
        return Ok(GitInfo::snapshot_sentinel());
    }
    if !in_repo {
        return Err(ReleaseError::caused_by(OP, GitStateError::NotRepository));
    }
    match read_info(git, ctx.config.git.short_hash) {
        (info, None) => Ok(info),
        (partial, Some(err)) if ctx.snapshot => {
            warn!(error = %err, "ignoring errors because this is a snapshot");
            if partial.commit.is_empty() {
                Ok(GitInfo::snapshot_sentinel())
            } else {
                Ok(partial)
            }
        }
        (_, Some(err)) => Err(ReleaseError::caused_by(OP, err)),
    }
}

/// Reads commit, remote and tag. On failure the returned info holds
/// whatever was resolved before the failing command.
fn read_info(git: &Git, short_hash: bool) -> (GitInfo, Option<ReleaseError>) {
    const OP: Op = Op("git.getGitInfo");
    let fail = |cause: ReleaseError, message: &str| {
        Wrap::new(OP).cause(cause).message(message).build()
    };

    let short = match git.run_clean(&["show", "--format='%h'", "HEAD"]) {
        Ok(short) => short,
        Err(err) => return (GitInfo::default(), Some(fail(err, "couldn't get current commit"))),
    };
    let full = match git.run_clean(&["show", "--format='%H'", "HEAD"]) {
        Ok(full) => full,
        Err(err) => return (GitInfo::default(), Some(fail(err, "couldn't get current commit"))),
    };
    let commit = if short_hash { short.clone() } else { full.clone() };
    let url = match git.run_clean(&["ls-remote", "--get-url"]) {
        Ok(url) => url,
        Err(err) => return (GitInfo::default(), Some(fail(err, "couldn't get remote URL"))),
    };
    let mut info = GitInfo {
        current_tag: String::new(),
        commit,
        short_commit: short,
        full_commit: full,
        url,
    };
    match git.run_clean(&["describe", "--tags", "--abbrev=0"]) {
        Ok(tag) => {
            info.current_tag = tag;
            (info, None)
        }
        Err(_) => {
            info.current_tag = "v0.0.0".to_string();
            (info, Some(ReleaseError::caused_by(OP, GitStateError::NoTag)))
        }
    }
}

fn validate(ctx: &ReleaseContext, git: &Git) -> Result<()> {
    const OP: Op = Op("git.validate");
    if ctx.snapshot {
        return Err(skip(OP, "snapshot is enabled"));
    }
    if ctx.skip_validate {
        return Err(skip(OP, "skip validation is enabled"));
    }
    let status = match git.run(&["status", "--porcelain"]) {
        Ok(out) => out,
        Err(err) => err.to_string(),
    };
    if !status.trim().is_empty() {
        return Err(ReleaseError::caused_by(OP, GitStateError::Dirty { status }));
    }
    check_version_format(&ctx.version)?;
    let tag = ctx.git.current_tag.as_str();
    if git
        .run_clean(&["describe", "--exact-match", "--tags", "--match", tag])
        .is_err()
    {
        return Err(ReleaseError::caused_by(
            OP,
            GitStateError::WrongRef {
                commit: ctx.git.commit.clone(),
                tag: tag.to_string(),
            },
        ));
    }
    Ok(())
}

/// The version must start with digits and dots.
pub fn check_version_format(version: &str) -> Result<()> {
    if VERSION_PATTERN.is_match(version) {
        return Ok(());
    }
    Err(ReleaseError::caused_by(
        Op("git.validate"),
        GitStateError::InvalidVersionFormat {
            version: version.to_string(),
        },
    )
    .with_kind(Kind::SemVerError))
}
