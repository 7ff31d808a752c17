use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported language family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyw" => Ok(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Ok(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Ok(Language::TypeScript),
            other => Err(ParseError::unsupported_language(format!(".{other}"))),
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| ParseError::unsupported_language(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    /// Resolve a language name (`python`, `javascript`, `typescript`)
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            other => Err(ParseError::unsupported_language(other)),
        }
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }

    /// Languages parsed by the external engine rather than in-process
    pub fn uses_external_engine(self) -> bool {
        matches!(self, Language::JavaScript | Language::TypeScript)
    }
}

/// Grammar flavour handed to a parser; decides whether JSX is accepted.
///
/// Plain TypeScript must not enable JSX, or `<T>value` assertions and generic arrows stop
/// parsing. JavaScript keeps JSX on for every extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Dialect {
    /// Default flavour for in-memory source of `language`
    pub fn of(language: Language) -> Self {
        match language {
            Language::Python => Dialect::Python,
            Language::JavaScript => Dialect::JavaScript,
            Language::TypeScript => Dialect::TypeScript,
        }
    }

    /// Flavour for a file parsed as `language`; only a `.tsx` extension turns on TSX
    pub fn for_path(path: impl AsRef<Path>, language: Language) -> Self {
        let is_tsx = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"));
        match language {
            Language::TypeScript if is_tsx => Dialect::Tsx,
            other => Self::of(other),
        }
    }

    pub fn language(self) -> Language {
        match self {
            Dialect::Python => Language::Python,
            Dialect::JavaScript => Language::JavaScript,
            Dialect::TypeScript | Dialect::Tsx => Language::TypeScript,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Tsx => "tsx",
            other => other.language().as_str(),
        }
    }
}
