//! `{{ .Field }}` placeholder rendering for names and URLs.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;

use crate::context::{Artifact, ReleaseContext};
use crate::errors::Source;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template: unknown field '{field}' in '{template}'")]
    UnknownField { field: String, template: String },
    #[error("template: unclosed action in '{0}'")]
    Unclosed(String),
    #[error("template: malformed action '{action}', expected a '.Field' reference")]
    Malformed { action: String },
}

impl From<TemplateError> for Source {
    fn from(err: TemplateError) -> Self {
        Source::Foreign(anyhow::Error::new(err))
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    fields: BTreeMap<&'static str, String>,
}

impl Template {
    pub fn new(ctx: &ReleaseContext) -> Self {
        let now = Utc::now();
        let mut fields = BTreeMap::new();
        fields.insert("ProjectName", ctx.config.project_name.clone());
        fields.insert("Tag", ctx.git.current_tag.clone());
        fields.insert("Version", ctx.version.clone());
        fields.insert("Commit", ctx.git.commit.clone());
        fields.insert("ShortCommit", ctx.git.short_commit.clone());
        fields.insert("FullCommit", ctx.git.full_commit.clone());
        fields.insert("Date", now.to_rfc3339());
        fields.insert("Timestamp", now.timestamp().to_string());
        Self { fields }
    }

    pub fn with_artifact(mut self, artifact: &Artifact) -> Self {
        self.fields.insert("ArtifactName", artifact.name.clone());
        self.fields
            .insert("Os", artifact.goos.clone().unwrap_or_default());
        self.fields
            .insert("Arch", artifact.goarch.clone().unwrap_or_default());
        self
    }

    pub fn with_field(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    pub fn apply(&self, template: &str) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError::Unclosed(template.to_string()))?;
            let action = after[..end].trim();
            let field = action
                .strip_prefix('.')
                .filter(|name| !name.is_empty() && name.chars().all(char::is_alphanumeric))
                .ok_or_else(|| TemplateError::Malformed {
                    action: action.to_string(),
                })?;
            let value = self
                .fields
                .get(field)
                .ok_or_else(|| TemplateError::UnknownField {
                    field: field.to_string(),
                    template: template.to_string(),
                })?;
            output.push_str(value);
            rest = &after[end + 2..];
        }
        output.push_str(rest);
        Ok(output)
    }
}
