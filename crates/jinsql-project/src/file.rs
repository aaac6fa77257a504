//! Project files

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

use jinsql_jinja::Template;

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    Macro,
    Model,
    Test,
    Unknown,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Macro => "macro",
            Self::Model => "model",
            Self::Test => "test",
            Self::Unknown => "file",
        };
        write!(f, "{name}")
    }
}

/// A SQL file in the project. The source is read at discovery; the parsed
/// template is built on first use and then shared.
#[derive(Debug)]
pub struct File {
    /// Project-relative path
    pub path: PathBuf,
    /// File stem
    pub name: String,
    pub file_type: FileType,
    source: String,
    template: OnceLock<Arc<Template>>,
}

impl File {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType, source: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path,
            name,
            file_type,
            source: source.into(),
            template: OnceLock::new(),
        }
    }

    /// Path without its extension, `/`-separated: `models/staging/orders`
    pub fn lookup_path(&self) -> String {
        lookup_path(&self.path)
    }

    /// Parse the file, or return the template parsed earlier
    pub fn parse(&self) -> Result<Arc<Template>, CompileError> {
        if let Some(template) = self.template.get() {
            return Ok(Arc::clone(template));
        }

        tracing::debug!(path = %self.path.display(), "parsing");
        let template = Template::parse(self.lookup_path(), &self.source)
            .map_err(|err| CompileError::new(&self.path, err))?;
        Ok(Arc::clone(self.template.get_or_init(|| Arc::new(template))))
    }
}

pub(crate) fn lookup_path(path: &Path) -> String {
    let parts: Vec<String> = path
        .with_extension("")
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}
