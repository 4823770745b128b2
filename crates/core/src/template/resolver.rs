//! Template lookup on disk.
//!
//! Templates live in one directory, one file per `(name, format)` pair:
//! `<name>.<format>.tmpl`. Names are restricted to `[A-Za-z0-9-]`, which
//! keeps path separators and `..` out of the joined path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use tracing::debug;

use super::format::TemplateFormat;
use super::render;
use crate::directory::PersonRecord;
use crate::errors::{ConfigError, TemplateError};

/// Allowed template names. The empty name matches; routing never produces one.
pub const TEMPLATE_NAME_PATTERN: &str = r"^[A-Za-z0-9-]*$";

/// Raw template text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub text: String,
}

/// Resolves template names to files and renders them.
pub struct TemplateResolver {
    dir: PathBuf,
    name_pattern: Regex,
}

impl TemplateResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let name_pattern =
            Regex::new(TEMPLATE_NAME_PATTERN).map_err(|e| ConfigError::InvalidValue {
                field: "template name pattern".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            dir: dir.into(),
            name_pattern,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_valid_name(&self, name: &str) -> bool {
        self.name_pattern.is_match(name)
    }

    /// Path of the file backing `name` in `format`. Does not validate.
    pub fn path_for(&self, name: &str, format: TemplateFormat) -> PathBuf {
        self.dir.join(format!("{}.{}.tmpl", name, format))
    }

    /// Validate `name` and read its template source for `format`.
    pub async fn resolve(
        &self,
        name: &str,
        format: TemplateFormat,
    ) -> Result<TemplateSource, TemplateError> {
        if !self.is_valid_name(name) {
            return Err(TemplateError::InvalidName(name.to_string()));
        }

        let path = self.path_for(name, format);
        debug!(path = %path.display(), "reading template");

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(TemplateSource { path, text }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TemplateError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(TemplateError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// Resolve `name` and render it with `person` bound as `.`.
    pub async fn render(
        &self,
        name: &str,
        format: TemplateFormat,
        person: &PersonRecord,
    ) -> Result<String, TemplateError> {
        let source = self.resolve(name, format).await?;
        render::render(&source.text, person)
    }
}
