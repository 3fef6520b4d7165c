//! Thin wrapper over the system `git` binary.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::config::Repo;
use crate::errors::{Op, ReleaseError, Result, ResultExt};

#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Whether a `git` executable can be spawned at all.
    pub fn available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    pub fn is_repo(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    /// Runs `git <args>` in the repository directory and returns the combined
    /// output. A non-zero exit becomes an error carrying that output.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        const OP: Op = Op("git.Run");
        debug!(?args, dir = %self.dir.display(), "running git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.dir)
            .args(args)
            .output()
            .wrap_op_msg(OP, "failed to spawn git")?;
        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!(output = %combined, "git result");
        if !output.status.success() {
            return Err(ReleaseError::new(OP, combined));
        }
        Ok(combined)
    }

    /// First line of a command's output with single quotes removed.
    pub fn clean(result: Result<String>) -> Result<String> {
        const OP: Op = Op("git.Clean");
        match result {
            Ok(output) => Ok(output
                .lines()
                .next()
                .unwrap_or_default()
                .replace('\'', "")),
            Err(err) => {
                let message = err.to_string().trim_end_matches('\n').to_string();
                Err(ReleaseError::new(OP, message))
            }
        }
    }

    pub fn run_clean(&self, args: &[&str]) -> Result<String> {
        Self::clean(self.run(args))
    }

    /// Owner and name of the `origin` remote.
    pub fn remote_repo(&self) -> Result<Repo> {
        const OP: Op = Op("git.remoteRepo");
        let url = self
            .run_clean(&["config", "--get", "remote.origin.url"])
            .wrap_op_msg(OP, "repository doesn't have an `origin` remote")?;
        parse_remote(&url).ok_or_else(|| {
            ReleaseError::new(OP, format!("unsupported remote URL format: {url}"))
        })
    }
}

/// Extracts `owner/name` from SSH (`git@host:owner/name.git`) and HTTP(S)
/// remote URLs.
pub fn parse_remote(url: &str) -> Option<Repo> {
    let url = url.trim();
    let path = if let Some((_, rest)) = url.split_once("://") {
        rest.split_once('/')?.1
    } else {
        url.split_once(':')?.1
    };
    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let (owner, name) = path.rsplit_once('/')?;
    let owner = owner.rsplit('/').next()?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some(Repo {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_keeps_first_line_without_quotes() {
        let cleaned = Git::clean(Ok("'abc123'\nsecond line\n".to_string())).unwrap();
        assert_eq!(cleaned, "abc123");
        assert_eq!(Git::clean(Ok(String::new())).unwrap(), "");
    }

    #[test]
    fn clean_propagates_failures() {
        let err = Git::clean(Err(ReleaseError::new(Op("git.Run"), "fatal: no tag\n"))).unwrap_err();
        assert_eq!(err.to_string(), "fatal: no tag");
        assert_eq!(err.op(), Op("git.Clean"));
    }

    #[test]
    fn parses_remote_urls() {
        let expected = Repo {
            owner: "acme".into(),
            name: "tool".into(),
        };
        assert_eq!(parse_remote("git@github.com:acme/tool.git"), Some(expected.clone()));
        assert_eq!(parse_remote("https://github.com/acme/tool.git"), Some(expected.clone()));
        assert_eq!(parse_remote("ssh://git@github.com/acme/tool"), Some(expected));
        assert_eq!(parse_remote("not a url"), None);
    }
}
