//! scoop.sh app manifest pushed to a bucket repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::client::{GitHubClient, ReleaseClient};
use crate::context::{Artifact, ArtifactKind, ReleaseContext};
use crate::errors::{Op, ReleaseError, Result, ResultExt, skip};
use crate::publishers::{Phase, Publisher};
use crate::tmpl::Template;

pub const DEFAULT_AUTHOR_NAME: &str = "shipyardbot";
pub const DEFAULT_AUTHOR_EMAIL: &str = "bot@shipyard.invalid";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub version: String,
    pub architecture: BTreeMap<String, Resource>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub homepage: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub url: String,
    pub bin: String,
    pub hash: String,
}

#[derive(Default)]
pub struct ScoopPublisher {
    client: Option<Arc<dyn ReleaseClient>>,
}

impl ScoopPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Arc<dyn ReleaseClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    fn client(&self, ctx: &ReleaseContext) -> anyhow::Result<Arc<dyn ReleaseClient>> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => Ok(Arc::new(GitHubClient::from_context(ctx)?)),
        }
    }
}

/// The configured URL template, or the release download URL for the
/// release repository once it is known.
pub fn url_template(ctx: &ReleaseContext) -> String {
    let config = &ctx.config;
    if !config.scoop.url_template.is_empty() {
        return config.scoop.url_template.clone();
    }
    format!(
        "{}/{}/{}/releases/download/{{{{ .Tag }}}}/{{{{ .ArtifactName }}}}",
        config.github_urls.download.trim_end_matches('/'),
        config.release.github.owner,
        config.release.github.name
    )
}

pub fn build_manifest(ctx: &ReleaseContext, archives: &[&Artifact]) -> Result<Manifest> {
    const OP: Op = Op("scoop.buildManifest");
    let scoop = &ctx.config.scoop;
    let template = url_template(ctx);
    let mut architecture = BTreeMap::new();
    for artifact in archives {
        let arch = match artifact.goarch.as_deref() {
            Some("386") => "32bit",
            _ => "64bit",
        };
        let url = Template::new(ctx)
            .with_artifact(artifact)
            .with_field("ReleaseURL", ctx.release_url.clone().unwrap_or_default())
            .apply(&template)
            .wrap_op(OP)?;
        let hash = artifact.checksum().wrap_op(OP)?;
        architecture.insert(
            arch.to_string(),
            Resource {
                url,
                bin: scoop.bin.clone(),
                hash,
            },
        );
    }
    Ok(Manifest {
        version: ctx.version.clone(),
        architecture,
        homepage: scoop.homepage.clone(),
        license: scoop.license.clone(),
        description: scoop.description.clone(),
        persist: scoop.persist.clone(),
    })
}

pub fn do_run(ctx: &ReleaseContext, client: &dyn ReleaseClient) -> Result<()> {
    const OP: Op = Op("scoop.doRun");
    let scoop = &ctx.config.scoop;
    if scoop.bucket.name.is_empty() {
        return Err(skip(OP, "scoop section is not configured"));
    }
    let archives: Vec<&Artifact> = ctx
        .artifacts_of(&[ArtifactKind::Archive])
        .filter(|artifact| artifact.goos.as_deref() == Some("windows"))
        .collect();
    if archives.is_empty() {
        return Err(skip(OP, "scoop requires a windows build"));
    }
    let manifest = build_manifest(ctx, &archives)?;
    let content = serde_json::to_vec_pretty(&manifest).wrap_op(OP)?;

    if ctx.skip_publish {
        return Err(skip(OP, "skip publish enabled"));
    }
    if ctx.config.release.draft {
        return Err(skip(OP, "release is marked as draft"));
    }
    let path = format!("{}.json", scoop.name);
    info!(bucket = %scoop.bucket, path = %path, "pushing scoop manifest");
    client
        .create_file(
            ctx,
            &scoop.commit_author,
            &scoop.bucket,
            &content,
            &path,
            &format!(
                "Scoop update for {} version {}",
                ctx.config.project_name, ctx.git.current_tag
            ),
        )
        .map_err(|err| ReleaseError::caused_by(OP, err))
}

impl Publisher for ScoopPublisher {
    fn name(&self) -> &'static str {
        "scoop"
    }

    fn describe(&self) -> &'static str {
        "scoop manifest"
    }

    fn phase(&self) -> Phase {
        Phase::Manifest
    }

    fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        let config = &mut ctx.config;
        let scoop = &mut config.scoop;
        if scoop.name.is_empty() {
            scoop.name = config.project_name.clone();
        }
        if scoop.bin.is_empty() {
            scoop.bin = format!("{}.exe", scoop.name);
        }
        if scoop.commit_author.name.is_empty() {
            scoop.commit_author.name = DEFAULT_AUTHOR_NAME.to_string();
        }
        if scoop.commit_author.email.is_empty() {
            scoop.commit_author.email = DEFAULT_AUTHOR_EMAIL.to_string();
        }
        Ok(())
    }

    fn publish(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("scoop.Publish");
        if ctx.config.scoop.bucket.name.is_empty() {
            return Err(skip(OP, "scoop section is not configured"));
        }
        let client = self.client(ctx).wrap_op(OP)?;
        do_run(ctx, client.as_ref()).wrap_op(OP)
    }
}
