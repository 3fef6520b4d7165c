//! Generic HTTP PUT uploads.

use std::fs;
use std::sync::Arc;

use tracing::info;

use crate::config::PutConfig;
use crate::context::{Artifact, ArtifactKind, ReleaseContext};
use crate::errors::{Op, ReleaseError, Result, ResultExt, Wrap, skip};
use crate::group::Group;
use crate::publishers::{Phase, Publisher};
use crate::tmpl::Template;
use crate::transport::{HttpTransport, Request, Transport};

type SecretLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct PutPublisher {
    transport: Option<Arc<dyn Transport>>,
    secrets: SecretLookup,
}

impl Default for PutPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl PutPublisher {
    pub fn new() -> Self {
        Self {
            transport: None,
            secrets: Box::new(|key| std::env::var(key).ok()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_secrets<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.secrets = Box::new(lookup);
        self
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        match &self.transport {
            Some(transport) => Ok(transport.clone()),
            None => {
                let http = HttpTransport::new().wrap_op(Op("put.transport"))?;
                Ok(Arc::new(http))
            }
        }
    }

    fn check_config(&self, instance: &PutConfig) -> Result<String> {
        const OP: Op = Op("put.checkConfig");
        if instance.name.is_empty() {
            return Err(ReleaseError::new(OP, "put: name must be set"));
        }
        let missing = |field: &str| {
            ReleaseError::new(OP, format!("put: {field} must be set for '{}'", instance.name))
        };
        if instance.target.is_empty() {
            return Err(missing("target"));
        }
        if instance.username.is_empty() {
            return Err(missing("username"));
        }
        let key = secret_key(&instance.name);
        (self.secrets)(&key)
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                ReleaseError::new(
                    OP,
                    format!("put: missing {key} environment variable for '{}'", instance.name),
                )
            })
    }
}

/// `PUT_<NAME>_SECRET`, with the instance name upper-cased.
pub fn secret_key(name: &str) -> String {
    format!("PUT_{}_SECRET", name.to_uppercase())
}

fn kinds_for(instance: &PutConfig) -> Result<Vec<ArtifactKind>> {
    let mut kinds = match instance.mode.as_str() {
        "archive" => vec![ArtifactKind::Archive],
        "binary" => vec![ArtifactKind::Binary],
        other => {
            return Err(ReleaseError::new(
                Op("put.mode"),
                format!("put: mode must be 'binary' or 'archive', got '{other}'"),
            ));
        }
    };
    if instance.checksum {
        kinds.push(ArtifactKind::Checksum);
    }
    if instance.signature {
        kinds.push(ArtifactKind::Signature);
    }
    Ok(kinds)
}

/// Renders the destination; the artifact name is appended when the target
/// ends with `/`.
pub fn target_url(
    ctx: &ReleaseContext,
    instance: &PutConfig,
    artifact: &Artifact,
) -> Result<String> {
    let mut url = Template::new(ctx)
        .with_artifact(artifact)
        .apply(&instance.target)
        .wrap_op_msg(Op("put.targetURL"), format!("{}: invalid target", instance.name))?;
    if url.ends_with('/') {
        url.push_str(&artifact.name);
    }
    Ok(url)
}

fn upload(
    transport: &dyn Transport,
    username: &str,
    secret: &str,
    artifact: &Artifact,
    url: &str,
) -> Result<()> {
    const OP: Op = Op("put.upload");
    let data = fs::read(&artifact.path)
        .wrap_op_msg(OP, format!("failed to read {}", artifact.path.display()))?;
    info!(artifact = %artifact.name, url, "uploading");
    let request = Request::new("PUT", url)
        .header("Content-Type", "application/octet-stream")
        .basic_auth(username, secret)
        .body(data);
    let response = transport.send(&request).wrap_op(OP)?;
    if !response.is_success() {
        return Err(ReleaseError::new(
            OP,
            format!("unexpected http response status: {}", response.status),
        ));
    }
    Ok(())
}

impl Publisher for PutPublisher {
    fn name(&self) -> &'static str {
        "put"
    }

    fn describe(&self) -> &'static str {
        "HTTP PUT"
    }

    fn phase(&self) -> Phase {
        Phase::Upload
    }

    fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        for instance in &mut ctx.config.puts {
            if instance.mode.is_empty() {
                instance.mode = "archive".to_string();
            }
        }
        Ok(())
    }

    fn publish(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("put.Publish");
        if ctx.config.puts.is_empty() {
            return Err(skip(OP, "put section is not configured"));
        }
        let secrets = ctx
            .config
            .puts
            .iter()
            .map(|instance| self.check_config(instance))
            .collect::<Result<Vec<_>>>()
            .wrap_op(OP)?;
        let transport = self.transport().wrap_op(OP)?;
        let transport = transport.as_ref();
        let ctx: &ReleaseContext = ctx;

        for (instance, secret) in ctx.config.puts.iter().zip(&secrets) {
            let kinds = kinds_for(instance).wrap_op(OP)?;
            let targets = ctx
                .artifacts_of(&kinds)
                .map(|artifact| -> Result<(&Artifact, String)> {
                    Ok((artifact, target_url(ctx, instance, artifact)?))
                })
                .collect::<Result<Vec<_>>>()
                .wrap_op(OP)?;

            let mut group = Group::new(ctx.parallelism);
            for (artifact, url) in targets {
                let username = instance.username.as_str();
                let secret = secret.as_str();
                group.submit(move || upload(transport, username, secret, artifact, &url));
            }
            group.wait().map_err(|err| {
                Wrap::new(OP)
                    .cause(err)
                    .message(format!("{}: upload failed", instance.name))
                    .build()
            })?;
        }
        Ok(())
    }
}
