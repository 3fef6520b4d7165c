use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::context::ArtifactKind;

pub const DEFAULT_CONFIG_FILE: &str = ".shipyard.yml";
pub const DEFAULT_PARALLELISM: i64 = 4;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub project_name: String,
    /// Upper bound on concurrent uploads per publisher. `0` or less means
    /// unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<i64>,
    pub env_files: EnvFiles,
    pub git: GitConfig,
    pub snapshot: SnapshotConfig,
    pub release: ReleaseConfig,
    pub github_urls: GitHubUrls,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub puts: Vec<PutConfig>,
    pub scoop: ScoopConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactSpec>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config YAML: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvFiles {
    pub github_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Deprecated: use `{{ .ShortCommit }}` in templates instead.
    pub short_hash: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub name_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReleaseConfig {
    pub github: Repo,
    pub draft: bool,
    pub disable: bool,
    /// `auto` derives the flag from the tag, `true` forces it.
    pub prerelease: String,
    pub name_template: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubUrls {
    pub api: String,
    pub upload: String,
    pub download: String,
}

impl Default for GitHubUrls {
    fn default() -> Self {
        Self {
            api: "https://api.github.com".to_string(),
            upload: "https://uploads.github.com".to_string(),
            download: "https://github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PutConfig {
    pub name: String,
    /// Template for the destination; the artifact name is appended when
    /// the rendered target ends with `/`.
    pub target: String,
    pub username: String,
    /// `archive` or `binary`.
    pub mode: String,
    pub checksum: bool,
    pub signature: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoopConfig {
    pub name: String,
    pub bin: String,
    pub bucket: Repo,
    pub commit_author: CommitAuthor,
    pub homepage: String,
    pub description: String,
    pub license: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persist: Vec<String>,
    pub url_template: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactSpec {
    /// Glob pattern relative to the working directory.
    pub path: String,
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goarch: Option<String>,
}

/// Resolves the effective parallelism: command line first, then config,
/// then [`DEFAULT_PARALLELISM`].
pub fn resolve_parallelism(flag: Option<i64>, config: &Config) -> i64 {
    flag.or(config.parallelism).unwrap_or(DEFAULT_PARALLELISM)
}
