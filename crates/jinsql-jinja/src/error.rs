//! Template errors
//!
//! Every error carries the position of the token or node it was raised at.
//! `Display` renders `line:column: message`; the host prefixes the file path.

use jinsql_core::{Diagnostic, DiagnosticCode, Location};

use crate::lexer::Position;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JinjaError {
    /// Malformed token stream
    #[error("{position}: {reason}")]
    Lex { position: Position, reason: String },

    /// Grammar violation
    #[error("{position}: expected {expected}, found {found}")]
    Parse {
        position: Position,
        expected: String,
        found: String,
    },

    #[error("{position}: function `{name}` not found")]
    UndefinedFunction { position: Position, name: String },

    #[error("{position}: expected `{name}` to be a function, got {found}")]
    NotCallable {
        position: Position,
        name: String,
        found: &'static str,
    },

    #[error("{position}: macro `{name}` is missing argument `{parameter}`")]
    MissingArgument {
        position: Position,
        name: String,
        parameter: String,
    },

    #[error("{position}: macro `{name}` has no parameter named `{argument}`")]
    UnknownArgument {
        position: Position,
        name: String,
        argument: String,
    },

    #[error("{position}: macro `{name}` takes {expected} positional argument(s) but {found} were given")]
    TooManyArguments {
        position: Position,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{position}: {message}")]
    TypeMismatch { position: Position, message: String },

    #[error("{position}: maximum macro call depth of {limit} exceeded")]
    RecursionLimit { position: Position, limit: usize },

    #[error("{position}: {message}")]
    Runtime { position: Position, message: String },
}

impl JinjaError {
    pub fn type_mismatch(position: Position, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            position,
            message: message.into(),
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::Lex { position, .. }
            | Self::Parse { position, .. }
            | Self::UndefinedFunction { position, .. }
            | Self::NotCallable { position, .. }
            | Self::MissingArgument { position, .. }
            | Self::UnknownArgument { position, .. }
            | Self::TooManyArguments { position, .. }
            | Self::TypeMismatch { position, .. }
            | Self::RecursionLimit { position, .. }
            | Self::Runtime { position, .. } => *position,
        }
    }

    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Lex { .. } => DiagnosticCode::TemplateLexError,
            Self::Parse { .. } => DiagnosticCode::TemplateParseError,
            Self::UndefinedFunction { .. } => DiagnosticCode::UndefinedFunction,
            Self::NotCallable { .. } => DiagnosticCode::NotCallable,
            Self::MissingArgument { .. } => DiagnosticCode::MissingArgument,
            Self::UnknownArgument { .. } | Self::TooManyArguments { .. } => {
                DiagnosticCode::UnknownArgument
            }
            Self::TypeMismatch { .. } => DiagnosticCode::TypeMismatch,
            Self::RecursionLimit { .. } | Self::Runtime { .. } => DiagnosticCode::RenderError,
        }
    }

    /// The message without its `line:column: ` prefix
    pub fn message(&self) -> String {
        let rendered = self.to_string();
        let prefix = format!("{}: ", self.position());
        match rendered.strip_prefix(&prefix) {
            Some(message) => message.to_string(),
            None => rendered,
        }
    }

    /// Convert to a diagnostic located in `file`
    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        let position = self.position();
        Diagnostic::error(self.code(), self.message())
            .with_location(Location::with_position(file, position.line, position.column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let err = JinjaError::UndefinedFunction {
            position: Position::new(4, 12),
            name: "frobnicate".to_string(),
        };
        assert_eq!(err.to_string(), "4:12: function `frobnicate` not found");
        assert_eq!(err.message(), "function `frobnicate` not found");
    }

    #[test]
    fn test_diagnostic_conversion() {
        let err = JinjaError::MissingArgument {
            position: Position::new(1, 3),
            name: "f".to_string(),
            parameter: "a".to_string(),
        };
        let diag = err.to_diagnostic("models/orders.sql");

        assert_eq!(diag.code, DiagnosticCode::MissingArgument);
        assert_eq!(
            diag.to_string(),
            "models/orders.sql:1:3: error[MISSING_ARGUMENT]: macro `f` is missing argument `a`"
        );
    }
}
