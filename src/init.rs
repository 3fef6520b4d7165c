use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::{ArtifactSpec, Config, PutConfig};
use crate::context::ArtifactKind;
use crate::stages::snapshot;

/// Starter configuration for `project_name`.
pub fn starter_config(project_name: &str) -> Config {
    let mut config = Config {
        project_name: project_name.to_string(),
        ..Config::default()
    };
    config.release.prerelease = "auto".into();
    config.snapshot.name_template = snapshot::DEFAULT_NAME_TEMPLATE.into();
    config.artifacts = vec![
        ArtifactSpec {
            path: format!("dist/{project_name}_*_linux_amd64.tar.gz"),
            kind: ArtifactKind::Archive,
            goos: Some("linux".into()),
            goarch: Some("amd64".into()),
        },
        ArtifactSpec {
            path: format!("dist/{project_name}_*_windows_amd64.zip"),
            kind: ArtifactKind::Archive,
            goos: Some("windows".into()),
            goarch: Some("amd64".into()),
        },
        ArtifactSpec {
            path: "dist/checksums.txt".into(),
            kind: ArtifactKind::Checksum,
            goos: None,
            goarch: None,
        },
    ];
    config.puts = vec![PutConfig {
        name: "production".into(),
        target: "https://artifacts.example.com/{{ .ProjectName }}/{{ .Version }}/".into(),
        username: "deployer".into(),
        mode: "archive".into(),
        checksum: true,
        signature: false,
    }];
    config
}

pub fn generate_config(project_name: &str, destination: &Path, force: bool) -> Result<PathBuf> {
    if destination.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            destination.display()
        );
    }
    let rendered = serde_yaml::to_string(&starter_config(project_name))?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered)
        .with_context(|| format!("Failed to write config: {}", destination.display()))?;

    Ok(destination.to_path_buf())
}
