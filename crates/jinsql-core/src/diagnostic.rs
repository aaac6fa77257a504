//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // Template syntax (1xxx)
    /// Malformed token stream (unterminated string, tag or comment)
    TemplateLexError,

    /// Grammar violation while parsing a template
    TemplateParseError,

    // Template evaluation (2xxx)
    /// A called name resolved to nothing
    UndefinedFunction,

    /// A called name resolved to a value that is not a function
    NotCallable,

    /// A macro parameter received no argument and has no default
    MissingArgument,

    /// A named argument matches no macro parameter, or too many were given
    UnknownArgument,

    /// An operation received a value of the wrong kind
    TypeMismatch,

    /// Any other evaluation failure
    RenderError,

    // Project (3xxx)
    /// Two files registered the same lookup name
    DuplicateDefinition,

    /// A referenced model does not exist in the catalog
    ModelNotFound,

    /// Failed to read project files or configuration
    IoError,

    /// A model or test rendered to nothing but whitespace
    EmptyOutput,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateLexError => "TEMPLATE_LEX_ERROR",
            Self::TemplateParseError => "TEMPLATE_PARSE_ERROR",
            Self::UndefinedFunction => "UNDEFINED_FUNCTION",
            Self::NotCallable => "NOT_CALLABLE",
            Self::MissingArgument => "MISSING_ARGUMENT",
            Self::UnknownArgument => "UNKNOWN_ARGUMENT",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::RenderError => "RENDER_ERROR",
            Self::DuplicateDefinition => "DUPLICATE_DEFINITION",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::IoError => "IO_ERROR",
            Self::EmptyOutput => "EMPTY_OUTPUT",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - aborts the compilation
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File path relative to project root
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Create a location with file, line, and column
    pub fn with_position(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    /// Create a warning diagnostic
    pub fn warn(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Renders as `file:line:col: severity[CODE]: message`
impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}
