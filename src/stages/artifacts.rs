//! Collects already-built files listed in the configuration.

use tracing::{debug, info};

use crate::context::{Artifact, ReleaseContext};
use crate::errors::{Kind, Op, ReleaseError, Result, ResultExt, skip};
use crate::pipeline::Stage;

pub struct ArtifactsStage;

impl Stage for ArtifactsStage {
    fn name(&self) -> &'static str {
        "artifacts"
    }

    fn describe(&self) -> &'static str {
        "collecting artifacts"
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("artifacts.Run");
        if ctx.config.artifacts.is_empty() {
            return Err(skip(OP, "no artifacts configured"));
        }
        let mut collected = Vec::new();
        for spec in &ctx.config.artifacts {
            let pattern = ctx.workdir.join(&spec.path);
            let pattern = pattern.to_string_lossy();
            let before = collected.len();
            let entries = glob::glob(&pattern)
                .wrap_op_msg(OP, format!("invalid pattern {}", spec.path))?;
            for entry in entries {
                let path = entry.wrap_op(OP)?;
                if !path.is_file() {
                    continue;
                }
                debug!(path = %path.display(), kind = spec.kind.as_str(), "artifact found");
                let artifact = Artifact::new(path, spec.kind)
                    .with_target(spec.goos.clone(), spec.goarch.clone());
                collected.push(artifact);
            }
            if collected.len() == before {
                return Err(ReleaseError::new(OP, format!("no files match {}", spec.path))
                    .with_kind(Kind::BuildError));
            }
        }
        info!(count = collected.len(), "artifacts collected");
        ctx.artifacts = collected;
        Ok(())
    }
}
