pub mod artifacts;
pub mod env;
pub mod git;
pub mod publish;
pub mod snapshot;

use crate::pipeline::Stage;
use crate::publishers::{self, PublisherRegistry, RegistryError};

pub use artifacts::ArtifactsStage;
pub use env::EnvStage;
pub use git::GitStage;
pub use publish::PublishStage;
pub use snapshot::SnapshotStage;

/// The release stages in execution order.
pub fn default_stages() -> Result<Vec<Box<dyn Stage>>, RegistryError> {
    Ok(with_registry(publishers::default_registry()?))
}

pub fn with_registry(registry: PublisherRegistry) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(EnvStage),
        Box::new(GitStage),
        Box::new(SnapshotStage),
        Box::new(ArtifactsStage),
        Box::new(PublishStage::new(registry)),
    ]
}
