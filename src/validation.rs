use serde::Serialize;

use crate::config::{Config, PutConfig};
use crate::deprecate;
use crate::publishers::{self, PublisherRegistry};
use crate::tmpl::TemplateError;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_config(config: &Config, registry: &PublisherRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.project_name.trim().is_empty() {
        report
            .warnings
            .push("project_name is empty; scoop manifests will have no name".into());
    }

    if config.git.short_hash {
        report.warnings.push(format!(
            "git.short_hash is deprecated, see {}",
            deprecate::notice_url("git.short_hash")
        ));
    }

    match config.release.prerelease.as_str() {
        "" | "auto" | "true" | "false" => {}
        other => report.errors.push(format!(
            "release.prerelease must be 'auto', 'true' or 'false', got '{other}'"
        )),
    }

    for (idx, spec) in config.artifacts.iter().enumerate() {
        if spec.path.trim().is_empty() {
            report
                .errors
                .push(format!("Artifact pattern {} cannot be empty", idx + 1));
        } else if let Err(err) = glob::Pattern::new(&spec.path) {
            report.errors.push(format!(
                "Artifact pattern {} ('{}') is not a valid glob: {}",
                idx + 1,
                spec.path,
                err
            ));
        }
    }

    for (idx, put) in config.puts.iter().enumerate() {
        report.merge(validate_put(idx, put));
    }

    for (field, template) in [
        ("snapshot.name_template", &config.snapshot.name_template),
        ("release.name_template", &config.release.name_template),
        ("scoop.url_template", &config.scoop.url_template),
    ] {
        if let Err(err) = check_template(template) {
            report.errors.push(format!("{field}: {err}"));
        }
    }

    if !config.scoop.bucket.name.is_empty() && config.scoop.bucket.owner.is_empty() {
        report
            .errors
            .push("scoop.bucket.owner is required when a bucket is configured".into());
    }

    if let Err(err) = publishers::check_order(&registry.entries()) {
        report.errors.push(err.to_string());
    }

    report
}

fn validate_put(idx: usize, put: &PutConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let label = if put.name.is_empty() {
        format!("puts[{idx}]")
    } else {
        format!("puts[{idx}] ('{}')", put.name)
    };
    if put.name.is_empty() {
        report.errors.push(format!("{label}: name must be set"));
    }
    if put.target.is_empty() {
        report.errors.push(format!("{label}: target must be set"));
    }
    if put.username.is_empty() {
        report.errors.push(format!("{label}: username must be set"));
    }
    if !matches!(put.mode.as_str(), "" | "archive" | "binary") {
        report.errors.push(format!(
            "{label}: mode must be 'binary' or 'archive', got '{}'",
            put.mode
        ));
    }
    report
}

/// Checks placeholder syntax only; field names are resolved at release time.
fn check_template(template: &str) -> Result<(), TemplateError> {
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::Unclosed(template.to_string()))?;
        let action = after[..end].trim();
        if !action.starts_with('.') || action.len() < 2 {
            return Err(TemplateError::Malformed {
                action: action.to_string(),
            });
        }
        rest = &after[end + 2..];
    }
    Ok(())
}
