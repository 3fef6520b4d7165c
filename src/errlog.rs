use tracing::{error, info};

use crate::errors::{Kind, ReleaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

pub fn severity(kind: Kind) -> Severity {
    match kind {
        Kind::Skipped => Severity::Info,
        _ => Severity::Error,
    }
}

/// Renders the operation chain as `outer -> inner`.
pub fn ops_trail(err: &ReleaseError) -> String {
    err.ops()
        .iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Logs `err` at the severity its kind calls for. Returns `true` when the
/// error is a real failure.
pub fn report(err: &ReleaseError) -> bool {
    let kind = err.kind();
    let ops = ops_trail(err);
    match severity(kind) {
        Severity::Info => {
            info!(kind = kind.describe(), ops = %ops, reason = %err, "skipped");
            false
        }
        Severity::Error => {
            error!(kind = kind.describe(), ops = %ops, "{err}");
            true
        }
    }
}
