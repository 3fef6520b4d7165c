use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{self, Config};

/// Repository metadata resolved by the git stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitInfo {
    pub current_tag: String,
    pub commit: String,
    pub short_commit: String,
    pub full_commit: String,
    pub url: String,
}

impl GitInfo {
    /// Stand-in used by snapshot releases outside a usable repository.
    pub fn snapshot_sentinel() -> Self {
        Self {
            current_tag: "v0.0.0".to_string(),
            commit: "none".to_string(),
            short_commit: "none".to_string(),
            full_commit: "none".to_string(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Archive,
    Binary,
    Checksum,
    Signature,
    Package,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Archive => "archive",
            ArtifactKind::Binary => "binary",
            ArtifactKind::Checksum => "checksum",
            ArtifactKind::Signature => "signature",
            ArtifactKind::Package => "package",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub goos: Option<String>,
    pub goarch: Option<String>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        Self {
            name,
            path,
            kind,
            goos: None,
            goarch: None,
        }
    }

    pub fn with_target(mut self, goos: Option<String>, goarch: Option<String>) -> Self {
        self.goos = goos;
        self.goarch = goarch;
        self
    }

    /// SHA-256 of the artifact file as lowercase hex.
    pub fn checksum(&self) -> Result<String> {
        compute_sha256(&self.path)
    }
}

pub fn compute_sha256(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// State for a single release run. Stages receive it by `&mut`; fan-out
/// tasks only ever see `&ReleaseContext`.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    pub config: Config,
    pub workdir: PathBuf,
    pub git: GitInfo,
    pub version: String,
    pub token: String,
    pub artifacts: Vec<Artifact>,
    pub release_notes: Option<String>,
    pub release_url: Option<String>,
    pub prerelease: bool,
    pub parallelism: i64,
    pub snapshot: bool,
    pub skip_publish: bool,
    pub skip_validate: bool,
}

impl ReleaseContext {
    pub fn new(config: Config, workdir: impl Into<PathBuf>) -> Self {
        let parallelism = config::resolve_parallelism(None, &config);
        Self {
            config,
            workdir: workdir.into(),
            git: GitInfo::default(),
            version: String::new(),
            token: String::new(),
            artifacts: Vec::new(),
            release_notes: None,
            release_url: None,
            prerelease: false,
            parallelism,
            snapshot: false,
            skip_publish: false,
            skip_validate: false,
        }
    }

    pub fn artifacts_of<'a>(
        &'a self,
        kinds: &'a [ArtifactKind],
    ) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.artifacts
            .iter()
            .filter(move |artifact| kinds.contains(&artifact.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn checksum_is_stable() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("tool_linux_amd64.tar.gz");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"abc").unwrap();

        let artifact = Artifact::new(&file_path, ArtifactKind::Archive);
        assert_eq!(artifact.name, "tool_linux_amd64.tar.gz");
        assert_eq!(
            artifact.checksum().unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn filters_artifacts_by_kind() {
        let mut ctx = ReleaseContext::new(Config::default(), ".");
        ctx.artifacts = vec![
            Artifact::new("a.tar.gz", ArtifactKind::Archive),
            Artifact::new("checksums.txt", ArtifactKind::Checksum),
            Artifact::new("a", ArtifactKind::Binary),
        ];
        let names: Vec<_> = ctx
            .artifacts_of(&[ArtifactKind::Archive, ArtifactKind::Checksum])
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, ["a.tar.gz", "checksums.txt"]);
    }
}
