use crate::context::ReleaseContext;
use crate::errors::{Op, Result, skip};
use crate::pipeline::Stage;
use crate::publishers::PublisherRegistry;

/// Runs every publisher of a [`PublisherRegistry`] in order.
pub struct PublishStage {
    registry: PublisherRegistry,
}

impl PublishStage {
    pub fn new(registry: PublisherRegistry) -> Self {
        Self { registry }
    }
}

impl Stage for PublishStage {
    fn name(&self) -> &'static str {
        "publish"
    }

    fn describe(&self) -> &'static str {
        "publishing"
    }

    fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        self.registry.apply_defaults(ctx)
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("publish.Run");
        if ctx.skip_publish {
            return Err(skip(OP, "skip publish"));
        }
        self.registry.publish(ctx)
    }
}
