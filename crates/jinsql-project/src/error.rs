//! Project-level errors

use std::path::PathBuf;

use jinsql_core::{Diagnostic, DiagnosticCode, Location};
use jinsql_jinja::JinjaError;

use crate::file::FileType;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Two files claim the same lookup name
    #[error("{kind} `{name}` is defined by both {} and {}", .first.display(), .second.display())]
    DuplicateDefinition {
        kind: FileType,
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl CatalogError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::DuplicateDefinition { second, .. } => {
                Diagnostic::error(DiagnosticCode::DuplicateDefinition, self.to_string())
                    .with_location(Location::new(second.display().to_string()))
            }
            Self::Io { path, .. } | Self::Walk { path, .. } => {
                Diagnostic::error(DiagnosticCode::IoError, self.to_string())
                    .with_location(Location::new(path.display().to_string()))
            }
        }
    }
}

/// A template error located in a project file
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}:{source}", .path.display())]
pub struct CompileError {
    pub path: PathBuf,
    #[source]
    pub source: JinjaError,
}

impl CompileError {
    pub fn new(path: impl Into<PathBuf>, source: JinjaError) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        self.source.to_diagnostic(&self.path.display().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("model `{0}` not found")]
    ModelNotFound(String),
}

impl ProjectError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Catalog(err) => err.to_diagnostic(),
            Self::Compile(err) => err.to_diagnostic(),
            Self::ModelNotFound(_) => {
                Diagnostic::error(DiagnosticCode::ModelNotFound, self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jinsql_jinja::Position;

    #[test]
    fn test_compile_error_prefixes_path() {
        let err = CompileError::new(
            "models/orders.sql",
            JinjaError::UndefinedFunction {
                position: Position::new(3, 9),
                name: "cents".to_string(),
            },
        );
        assert_eq!(err.to_string(), "models/orders.sql:3:9: function `cents` not found");

        let diag = err.to_diagnostic();
        assert_eq!(diag.code, DiagnosticCode::UndefinedFunction);
        let location = diag.location.unwrap();
        assert_eq!(location.line, Some(3));
        assert_eq!(location.column, Some(9));
    }

    #[test]
    fn test_duplicate_definition_message() {
        let err = CatalogError::DuplicateDefinition {
            kind: FileType::Model,
            name: "orders".to_string(),
            first: PathBuf::from("models/a/orders.sql"),
            second: PathBuf::from("models/b/orders.sql"),
        };
        assert_eq!(
            err.to_string(),
            "model `orders` is defined by both models/a/orders.sql and models/b/orders.sql"
        );
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::DuplicateDefinition);
    }
}
