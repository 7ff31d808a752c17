use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for source parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Keep functions, classes and methods whose name starts with `_`
    pub include_private: bool,

    /// How many lines above a JS/TS declaration are searched for its `/** ... */` block
    pub doc_window_lines: usize,

    /// Files larger than this are skipped by directory scans
    pub max_file_bytes: u64,

    /// External JS/TS parsing engine
    pub engine: EngineConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            include_private: false,
            doc_window_lines: 10,
            max_file_bytes: 1_048_576,
            engine: EngineConfig::default(),
        }
    }
}

impl ParserConfig {
    /// Load configuration from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ParseError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.doc_window_lines == 0 {
            return Err(ParseError::invalid_config("doc_window_lines must be > 0"));
        }

        if self.max_file_bytes == 0 {
            return Err(ParseError::invalid_config("max_file_bytes must be > 0"));
        }

        self.engine.validate()
    }
}

/// Settings for the external JS/TS parsing engine (Node.js + `@babel/parser`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Node.js executable
    pub node_program: String,

    /// npm executable, used only for installation
    pub npm_program: String,

    /// Directory whose `node_modules` holds `@babel/parser`; the engine runs from here
    pub engine_dir: PathBuf,

    /// Run `npm install` once when the engine is missing
    pub auto_install: bool,

    /// Upper bound for one engine invocation
    pub timeout_ms: u64,

    /// Where source text is staged for the engine; the system temp directory when unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_program: "node".to_string(),
            npm_program: "npm".to_string(),
            engine_dir: PathBuf::from(".codedoc/engine"),
            auto_install: false,
            timeout_ms: 30_000,
            scratch_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(ParseError::invalid_config("engine.timeout_ms must be > 0"));
        }

        if self.node_program.trim().is_empty() {
            return Err(ParseError::invalid_config(
                "engine.node_program must not be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ParserConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.doc_window_lines, 10);
        assert!(!config.engine.auto_install);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ParserConfig::default();

        config.doc_window_lines = 0;
        assert!(config.validate().is_err());

        config.doc_window_lines = 10;
        config.engine.timeout_ms = 0;
        assert!(config.validate().is_err());

        config.engine.timeout_ms = 500;
        config.engine.node_program = "  ".to_string();
        assert!(config.validate().is_err());

        config.engine.node_program = "node".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = ParserConfig::from_toml_str(
            r#"
include_private = true

[engine]
auto_install = true
timeout_ms = 5000
engine_dir = "/opt/codedoc"
"#,
        )
        .unwrap();

        assert!(config.include_private);
        assert_eq!(config.doc_window_lines, 10);
        assert!(config.engine.auto_install);
        assert_eq!(config.engine.timeout_ms, 5000);
        assert_eq!(config.engine.engine_dir, PathBuf::from("/opt/codedoc"));
        assert_eq!(config.engine.node_program, "node");
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            ParserConfig::from_toml_str("chunk_size = 3"),
            Err(ParseError::InvalidConfig(_))
        ));
        assert!(matches!(
            ParserConfig::from_toml_str("doc_window_lines = 0"),
            Err(ParseError::InvalidConfig(_))
        ));
    }
}
