//! GitHub release creation and artifact upload.

use std::fs::File;
use std::sync::Arc;

use semver::Version;
use tracing::{debug, info};

use crate::client::{GitHubClient, ReleaseClient};
use crate::context::{Artifact, ArtifactKind, ReleaseContext};
use crate::errors::{Kind, Op, Result, ResultExt, Wrap, skip};
use crate::git::Git;
use crate::group::Group;
use crate::publishers::{Phase, Publisher};

pub const DEFAULT_NAME_TEMPLATE: &str = "{{ .Tag }}";

const UPLOADABLE: [ArtifactKind; 5] = [
    ArtifactKind::Archive,
    ArtifactKind::Binary,
    ArtifactKind::Checksum,
    ArtifactKind::Signature,
    ArtifactKind::Package,
];

#[derive(Default)]
pub struct ReleasePublisher {
    client: Option<Arc<dyn ReleaseClient>>,
}

impl ReleasePublisher {
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

/// Whether the release is flagged as a prerelease. `auto` looks for a
/// prerelease component in the tag.
pub fn detect_prerelease(setting: &str, tag: &str) -> Result<bool> {
    const OP: Op = Op("release.prerelease");
    match setting {
        "auto" => {
            let stripped = tag.strip_prefix('v').unwrap_or(tag);
            let version = Version::parse(stripped).map_err(|err| {
                Wrap::new(OP)
                    .cause(err)
                    .message(format!("failed to parse tag {tag} as semver"))
                    .kind(Kind::SemVerError)
                    .build()
            })?;
            let prerelease = !version.pre.is_empty();
            debug!(tag, prerelease, "pre-release detection");
            Ok(prerelease)
        }
        "true" => Ok(true),
        _ => Ok(false),
    }
}

fn upload(
    ctx: &ReleaseContext,
    client: &dyn ReleaseClient,
    release_id: u64,
    artifact: &Artifact,
) -> Result<()> {
    const OP: Op = Op("release.upload");
    let file = File::open(&artifact.path)
        .wrap_op_msg(OP, format!("failed to open {}", artifact.path.display()))?;
    info!(file = %artifact.path.display(), name = %artifact.name, "uploading to release");
    client
        .upload(ctx, release_id, &artifact.name, file)
        .wrap_op_msg(OP, format!("failed to upload {}", artifact.name))
}

/// Creates the release, records its URL and uploads every uploadable
/// artifact. Uploads run concurrently and all of them are attempted.
pub fn do_publish(ctx: &mut ReleaseContext, client: &dyn ReleaseClient) -> Result<()> {
    const OP: Op = Op("release.doPublish");
    if ctx.config.release.disable {
        return Err(skip(OP, "release pipe is disabled"));
    }
    if ctx.config.release.github.name.is_empty() {
        let repo = Git::new(&ctx.workdir).remote_repo().map_err(|err| {
            Wrap::new(OP)
                .cause(err)
                .message("release.github is not set and could not be read from git")
                .build()
        })?;
        ctx.config.release.github = repo;
    }
    ctx.prerelease = detect_prerelease(&ctx.config.release.prerelease, &ctx.git.current_tag)?;
    info!(
        tag = %ctx.git.current_tag,
        repo = %ctx.config.release.github,
        "creating or updating release"
    );
    let body = ctx.release_notes.clone().unwrap_or_default();
    let release = client.create_release(ctx, &body).wrap_op(OP)?;
    ctx.release_url = Some(release.html_url);

    let ctx: &ReleaseContext = ctx;
    let release_id = release.id;
    let mut group = Group::new(ctx.parallelism);
    for artifact in ctx.artifacts_of(&UPLOADABLE) {
        group.submit(move || upload(ctx, client, release_id, artifact));
    }
    group.wait().wrap_op(OP)
}

impl Publisher for ReleasePublisher {
    fn name(&self) -> &'static str {
        "release"
    }

    fn describe(&self) -> &'static str {
        "GitHub Releases"
    }

    fn phase(&self) -> Phase {
        Phase::Release
    }

    fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("release.Default");
        let release = &mut ctx.config.release;
        if release.name_template.is_empty() {
            release.name_template = DEFAULT_NAME_TEMPLATE.to_string();
        }
        if !release.github.name.is_empty() {
            return Ok(());
        }
        // Defaults run before the git stage; an unset repo is checked at publish.
        match Git::new(&ctx.workdir).remote_repo() {
            Ok(repo) => ctx.config.release.github = repo,
            Err(err) => debug!(op = %OP, error = %err, "release repository left unset"),
        }
        Ok(())
    }

    fn publish(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("release.Publish");
        if ctx.config.release.disable {
            return Err(skip(OP, "release pipe is disabled"));
        }
        let client = self.client(ctx).wrap_op(OP)?;
        do_publish(ctx, client.as_ref()).wrap_op(OP)
    }
}
