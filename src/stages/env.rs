//! Loads the publishing token.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};

use thiserror::Error;
use tracing::debug;

use crate::context::ReleaseContext;
use crate::errors::{Op, ReleaseError, Result, ResultExt, Source, skip};
use crate::pipeline::Stage;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_TOKEN_FILE: &str = "~/.config/shipyard/github_token";

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("missing GITHUB_TOKEN")]
    MissingToken,
    #[error("failed to expand token file path '{path}': {reason}")]
    Expand { path: String, reason: String },
}

impl From<EnvError> for Source {
    fn from(err: EnvError) -> Self {
        Source::Foreign(anyhow::Error::new(err))
    }
}

pub struct EnvStage;

impl Stage for EnvStage {
    fn name(&self) -> &'static str {
        "env"
    }

    fn describe(&self) -> &'static str {
        "loading environment variables"
    }

    fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        let files = &mut ctx.config.env_files;
        if files.github_token.is_empty() {
            files.github_token = DEFAULT_TOKEN_FILE.to_string();
        }
        Ok(())
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("env.Run");
        let loaded = load_token(std::env::var(TOKEN_ENV).ok(), &ctx.config.env_files.github_token);
        if let Ok(token) = &loaded {
            ctx.token = token.clone();
        }
        if ctx.skip_publish {
            return Err(skip(OP, "publishing is disabled"));
        }
        if ctx.config.release.disable {
            return Err(skip(OP, "release pipe is disabled"));
        }
        loaded.wrap_op(OP)?;
        if ctx.token.is_empty() {
            return Err(ReleaseError::caused_by(OP, EnvError::MissingToken));
        }
        Ok(())
    }
}

/// Token from the environment value when set, otherwise the first line of
/// `path`. A missing file yields an empty token.
pub fn load_token(from_env: Option<String>, path: &str) -> std::result::Result<String, Source> {
    if let Some(token) = from_env.filter(|token| !token.is_empty()) {
        return Ok(token);
    }
    let expanded = shellexpand::tilde(path).to_string();
    if expanded.starts_with('~') {
        return Err(EnvError::Expand {
            path: path.to_string(),
            reason: "home directory is unknown".to_string(),
        }
        .into());
    }
    debug!(path = %expanded, "reading token file");
    let file = match File::open(&expanded) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(String::new()),
        Err(err) => return Err(err.into()),
    };
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
