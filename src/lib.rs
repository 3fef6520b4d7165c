pub mod client;
pub mod config;
pub mod context;
pub mod deprecate;
pub mod errlog;
pub mod errors;
pub mod git;
pub mod group;
pub mod init;
pub mod observability;
pub mod pipeline;
pub mod publishers;
pub mod stages;
pub mod tmpl;
pub mod transport;
pub mod validation;

pub use config::Config;
pub use context::{Artifact, ReleaseContext};
pub use errors::{Kind, Op, ReleaseError};
pub use pipeline::{PipelineExecutor, RunReport, Stage};
