//! Publish-capable stages and the order they run in.
//!
//! Publishers are grouped into [`Phase`]s. Manifest publishers template URLs
//! that point at the release created during the `Release` phase, so a
//! registry only accepts publishers whose phases never go backwards.

pub mod put;
pub mod release;
pub mod scoop;

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::context::ReleaseContext;
use crate::errlog;
use crate::errors::{Op, Result, Wrap};

pub use put::PutPublisher;
pub use release::ReleasePublisher;
pub use scoop::ScoopPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Object storage and generic HTTP uploads.
    Upload,
    /// Creates the hosted release.
    Release,
    /// Package manager manifests referencing the release.
    Manifest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Upload => "upload",
            Phase::Release => "release",
            Phase::Manifest => "manifest",
        })
    }
}

pub trait Publisher: Send + Sync {
    fn name(&self) -> &'static str;

    fn describe(&self) -> &'static str;

    fn phase(&self) -> Phase;

    fn apply_defaults(&self, _ctx: &mut ReleaseContext) -> Result<()> {
        Ok(())
    }

    fn publish(&self, ctx: &mut ReleaseContext) -> Result<()>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("publisher '{later}' ({later_phase}) cannot run after '{earlier}' ({earlier_phase})")]
    OutOfOrder {
        earlier: &'static str,
        earlier_phase: Phase,
        later: &'static str,
        later_phase: Phase,
    },
    #[error("publisher '{0}' is registered more than once")]
    Duplicate(&'static str),
}

/// Checks that phases never decrease along `entries`.
pub fn check_order(entries: &[(&'static str, Phase)]) -> std::result::Result<(), RegistryError> {
    for (idx, window) in entries.windows(2).enumerate() {
        let (earlier, earlier_phase) = window[0];
        let (later, later_phase) = window[1];
        if later_phase < earlier_phase {
            return Err(RegistryError::OutOfOrder {
                earlier,
                earlier_phase,
                later,
                later_phase,
            });
        }
        if entries[..=idx].iter().any(|(name, _)| *name == later) {
            return Err(RegistryError::Duplicate(later));
        }
    }
    Ok(())
}

pub struct PublisherRegistry {
    publishers: Vec<Box<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new(publishers: Vec<Box<dyn Publisher>>) -> std::result::Result<Self, RegistryError> {
        let registry = Self { publishers };
        check_order(&registry.entries())?;
        Ok(registry)
    }

    pub fn entries(&self) -> Vec<(&'static str, Phase)> {
        self.publishers
            .iter()
            .map(|publisher| (publisher.name(), publisher.phase()))
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.publishers.iter().map(|p| p.name()).collect()
    }

    pub fn apply_defaults(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("publish.Default");
        for publisher in &self.publishers {
            if let Err(err) = publisher.apply_defaults(ctx) {
                if err.is_skip() {
                    errlog::report(&err);
                    continue;
                }
                return Err(Wrap::new(OP)
                    .cause(err)
                    .message(format!("{}: failed to set defaults", publisher.describe()))
                    .build());
            }
        }
        Ok(())
    }

    /// Runs publishers one after another. A skip moves on to the next one;
    /// any other failure stops the remaining publishers.
    pub fn publish(&self, ctx: &mut ReleaseContext) -> Result<()> {
        const OP: Op = Op("publish.Run");
        for publisher in &self.publishers {
            info!(
                publisher = publisher.name(),
                phase = %publisher.phase(),
                "{}",
                publisher.describe()
            );
            match publisher.publish(ctx) {
                Ok(()) => {}
                Err(err) if err.is_skip() => {
                    errlog::report(&err);
                }
                Err(err) => {
                    return Err(Wrap::new(OP)
                        .cause(err)
                        .message(format!("{}: failed to publish artifacts", publisher.describe()))
                        .build());
                }
            }
        }
        Ok(())
    }
}

/// put, then the GitHub release, then the scoop manifest.
pub fn default_registry() -> std::result::Result<PublisherRegistry, RegistryError> {
    PublisherRegistry::new(vec![
        Box::new(PutPublisher::new()),
        Box::new(ReleasePublisher::new()),
        Box::new(ScoopPublisher::new()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_non_decreasing_phases() {
        let entries = [
            ("put", Phase::Upload),
            ("s3", Phase::Upload),
            ("release", Phase::Release),
            ("scoop", Phase::Manifest),
            ("brew", Phase::Manifest),
        ];
        assert!(check_order(&entries).is_ok());
        assert!(check_order(&[]).is_ok());
    }

    #[test]
    fn rejects_manifest_before_release() {
        let err =
            check_order(&[("scoop", Phase::Manifest), ("release", Phase::Release)]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::OutOfOrder {
                earlier: "scoop",
                earlier_phase: Phase::Manifest,
                later: "release",
                later_phase: Phase::Release,
            }
        );
        assert!(err.to_string().contains("'release'"));
    }

    #[test]
    fn rejects_duplicates() {
        let err = check_order(&[("put", Phase::Upload), ("put", Phase::Upload)]).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("put"));
    }

    #[test]
    fn default_registry_order() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.names(), ["put", "release", "scoop"]);
    }
}
