use crate::context::ReleaseContext;
use crate::errors::{Op, ReleaseError, Result, Wrap, skip};
use crate::pipeline::Stage;
use crate::tmpl::Template;

pub const DEFAULT_NAME_TEMPLATE: &str = "SNAPSHOT-{{ .ShortCommit }}";

pub struct SnapshotStage;

impl Stage for SnapshotStage {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn describe(&self) -> &'static str {
        "snapshotting"
    }

    fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        if ctx.config.snapshot.name_template.is_empty() {
            ctx.config.snapshot.name_template = DEFAULT_NAME_TEMPLATE.to_string();
        }
        Ok(())
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("snapshot.Run");
        if !ctx.snapshot {
            return Err(skip(OP, "not a snapshot"));
        }
        let name = Template::new(ctx)
            .apply(&ctx.config.snapshot.name_template)
            .map_err(|err| {
                Wrap::new(OP)
                    .cause(err)
                    .message("failed to generate snapshot name")
                    .build()
            })?;
        if name.is_empty() {
            return Err(ReleaseError::new(OP, "empty snapshot name"));
        }
        ctx.version = name;
        Ok(())
    }
}
