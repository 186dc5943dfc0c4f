//! Manifest template rendering.
//!
//! Substitutes `{{ build.number }}`-style placeholders in manifest templates
//! with repository, build, and job metadata from the CI environment.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::RenderError;

/// Repository metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Repo {
    /// Repository owner or organisation.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

/// Build metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Build {
    /// Tag being built, if any.
    pub tag: String,
    /// Triggering event (push, tag, pull_request, ...).
    pub event: String,
    /// Build number.
    pub number: u64,
    /// Commit SHA.
    pub commit: String,
    /// Git ref.
    #[serde(rename = "ref")]
    pub reference: String,
    /// Branch name.
    pub branch: String,
    /// Commit author.
    pub author: String,
    /// Build status so far.
    pub status: String,
    /// Link to the build page.
    pub link: String,
    /// Unix time the build started.
    pub started: i64,
    /// Unix time the build was created.
    pub created: i64,
}

/// Job metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Unix time the job started.
    pub started: i64,
}

/// Values available to templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderContext {
    /// Repository metadata.
    pub repo: Repo,
    /// Build metadata.
    pub build: Build,
    /// Job metadata.
    pub job: Job,
}

impl RenderContext {
    /// Reads the context from `DRONE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the context from an arbitrary variable lookup.
    ///
    /// Missing variables become empty strings or zero.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).unwrap_or_default();
        let number = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or_default()
        };

        Self {
            repo: Repo {
                owner: text("DRONE_REPO_OWNER"),
                name: text("DRONE_REPO_NAME"),
            },
            build: Build {
                tag: text("DRONE_TAG"),
                event: text("DRONE_BUILD_EVENT"),
                number: lookup("DRONE_BUILD_NUMBER")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or_default(),
                commit: text("DRONE_COMMIT_SHA"),
                reference: text("DRONE_COMMIT_REF"),
                branch: text("DRONE_COMMIT_BRANCH"),
                author: text("DRONE_COMMIT_AUTHOR"),
                status: text("DRONE_BUILD_STATUS"),
                link: text("DRONE_BUILD_LINK"),
                started: number("DRONE_BUILD_STARTED"),
                created: number("DRONE_BUILD_CREATED"),
            },
            job: Job {
                started: number("DRONE_JOB_STARTED"),
            },
        }
    }
}

/// Renders manifest templates against a [`RenderContext`].
#[derive(Debug, Clone)]
pub struct ManifestRenderer {
    /// Context serialized for path lookups.
    values: Value,
}

impl ManifestRenderer {
    /// Creates a renderer for the given context.
    #[must_use]
    pub fn new(context: &RenderContext) -> Self {
        Self {
            values: serde_json::to_value(context).unwrap_or_default(),
        }
    }

    /// Reads a template file and renders it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn render_file(&self, path: impl AsRef<Path>) -> Result<String, RenderError> {
        let path = path.as_ref();
        debug!("Rendering template: {}", path.display());

        let template = std::fs::read_to_string(path).map_err(|source| RenderError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(self.render_str(&template))
    }

    /// Renders a template string.
    ///
    /// Unrecognised placeholders are left as written. The result is trimmed.
    #[must_use]
    pub fn render_str(&self, template: &str) -> String {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            output.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];

            let Some(close) = after_open.find("}}") else {
                output.push_str(&rest[open..]);
                rest = "";
                break;
            };

            let expression = after_open[..close].trim();
            if let Some(value) = self.lookup(expression) {
                output.push_str(&value);
            } else {
                warn!("Unrecognised template placeholder: {{{{ {expression} }}}}");
                output.push_str(&rest[open..open + 2 + close + 2]);
            }
            rest = &after_open[close + 2..];
        }
        output.push_str(rest);

        output.trim().to_string()
    }

    /// Resolves a dotted path such as `build.number` or `.Repo.Name`.
    fn lookup(&self, expression: &str) -> Option<String> {
        let path = expression.strip_prefix('.').unwrap_or(expression);
        if path.is_empty() {
            return None;
        }

        let mut current = &self.values;
        for segment in path.split('.') {
            current = current
                .as_object()?
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(segment))
                .map(|(_, value)| value)?;
        }

        match current {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => Some(String::new()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}
