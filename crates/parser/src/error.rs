use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Location and message of a syntax error, as reported by the underlying parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxDiagnostic {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    pub message: String,
}

impl SyntaxDiagnostic {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

/// Errors that can occur while parsing a source file
#[derive(Error, Debug)]
pub enum ParseError {
    /// Source text does not parse in its language
    #[error("Syntax error: {0}")]
    Syntax(SyntaxDiagnostic),

    /// The external JS/TS parsing engine cannot be found or installed
    #[error("JS/TS parsing engine unavailable: {0}")]
    ToolingUnavailable(String),

    /// The external engine did not answer within its bound
    #[error("JS/TS parsing engine timed out after {timeout_ms} ms")]
    ToolingTimeout { timeout_ms: u64 },

    /// File extension not recognized
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The engine answered with something that is not a syntax tree
    #[error("Malformed syntax tree: {0}")]
    MalformedTree(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Create a syntax error
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax(SyntaxDiagnostic::new(line, column, message))
    }

    /// Create a tooling-unavailable error
    pub fn tooling_unavailable(msg: impl Into<String>) -> Self {
        Self::ToolingUnavailable(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Create a malformed tree error
    pub fn malformed_tree(msg: impl Into<String>) -> Self {
        Self::MalformedTree(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether a batch may move on to the next file after this error.
    ///
    /// A missing engine or a broken configuration affects every remaining file of the
    /// same kind, everything else is local to the file that produced it.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ToolingUnavailable(_) | Self::InvalidConfig(_))
    }

    /// Short machine-readable label, used in batch reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "syntax_failure",
            Self::ToolingUnavailable(_) => "tooling_unavailable",
            Self::ToolingTimeout { .. } => "tooling_timeout",
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::MalformedTree(_) => "malformed_tree",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io(_) => "io",
        }
    }
}

/// Why a unit of work (a syntax-tree node or a whole file) was left out of a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    pub kind: String,
    pub message: String,
    /// 1-based line of the skipped node, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl SkipReason {
    /// A node whose sub-tree did not have the expected shape
    pub fn node_extraction(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            kind: "node_extraction_skipped".to_string(),
            message: message.into(),
            line,
        }
    }
}

impl From<&ParseError> for SkipReason {
    fn from(err: &ParseError) -> Self {
        let line = match err {
            ParseError::Syntax(diag) => Some(diag.line),
            _ => None,
        };
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display_carries_location() {
        let err = ParseError::syntax(3, 7, "invalid syntax");
        assert_eq!(
            err.to_string(),
            "Syntax error: invalid syntax (line 3, column 7)"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(ParseError::syntax(1, 1, "x").is_recoverable());
        assert!(ParseError::ToolingTimeout { timeout_ms: 10 }.is_recoverable());
        assert!(ParseError::unsupported_language("rb").is_recoverable());
        assert!(!ParseError::tooling_unavailable("node missing").is_recoverable());
    }

    #[test]
    fn test_skip_reason_from_error() {
        let err = ParseError::syntax(4, 1, "unexpected indent");
        let reason = SkipReason::from(&err);
        assert_eq!(reason.kind, "syntax_failure");
        assert_eq!(reason.line, Some(4));
    }
}
