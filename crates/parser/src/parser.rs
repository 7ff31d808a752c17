use crate::config::ParserConfig;
use crate::error::{ParseError, Result};
use crate::js::{BabelBridge, JsExtractor, SyntaxTreeProvider};
use crate::language::{Dialect, Language};
use crate::normalize::{normalize_with_language, NormalizeOptions, NormalizedModule};
use crate::python::PythonExtractor;
use crate::types::ModuleParseResult;
use std::path::Path;

/// Read a source file as UTF-8 text
pub fn read_source(path: impl AsRef<Path>) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// State of the external JS/TS engine
enum Engine {
    /// `initialize_engine` was never called
    NotConfigured,
    Ready(Box<dyn SyntaxTreeProvider>),
    /// Initialization failed; every JS/TS parse reports this
    Unavailable(String),
}

/// Main parser interface: routes a file to the extractor for its language
pub struct SourceParser {
    config: ParserConfig,
    engine: Engine,
}

impl SourceParser {
    /// Create a parser; JS/TS support needs [`initialize_engine`](Self::initialize_engine)
    /// or [`with_provider`](Self::with_provider) before use
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            engine: Engine::NotConfigured,
        })
    }

    /// Use an already initialized syntax tree provider for JS/TS
    #[must_use]
    pub fn with_provider(mut self, provider: Box<dyn SyntaxTreeProvider>) -> Self {
        self.engine = Engine::Ready(provider);
        self
    }

    /// Record a known engine failure so JS/TS files report it instead of retrying
    #[must_use]
    pub fn with_engine_error(mut self, message: impl Into<String>) -> Self {
        self.engine = Engine::Unavailable(message.into());
        self
    }

    /// Locate (and, when configured, install) the external JS/TS engine.
    ///
    /// The outcome is remembered: after a failure every JS/TS parse fails with
    /// [`ParseError::ToolingUnavailable`] carrying the same message.
    pub fn initialize_engine(&mut self) -> Result<()> {
        match BabelBridge::initialize(&self.config.engine) {
            Ok(bridge) => {
                self.engine = Engine::Ready(Box::new(bridge));
                Ok(())
            }
            Err(e) => {
                self.engine = Engine::Unavailable(e.to_string());
                Err(e)
            }
        }
    }

    /// Whether JS/TS sources can be parsed right now
    #[must_use]
    pub fn engine_ready(&self) -> bool {
        matches!(self.engine, Engine::Ready(_))
    }

    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse in-memory source text
    pub fn parse_source(&self, content: &str, language: Language) -> Result<ModuleParseResult> {
        self.parse_dialect(content, Dialect::of(language))
    }

    /// Parse in-memory source text in a specific grammar flavour
    pub fn parse_dialect(&self, content: &str, dialect: Dialect) -> Result<ModuleParseResult> {
        let result = match dialect {
            Dialect::Python => PythonExtractor::new()?.extract(content)?,
            Dialect::JavaScript | Dialect::TypeScript | Dialect::Tsx => {
                let provider = self.provider()?;
                JsExtractor::new(provider, self.config.doc_window_lines)
                    .extract(content, dialect)?
            }
        };

        if result.stats.skipped_count() > 0 {
            log::debug!(
                "{} node(s) skipped while extracting {} source",
                result.stats.skipped_count(),
                dialect.as_str()
            );
        }
        Ok(result)
    }

    /// Parse a file, selecting the language from its extension
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ModuleParseResult> {
        let path = path.as_ref();
        self.parse_file_as(path, Language::from_path(path)?)
    }

    /// Parse a file as `language`, whatever its extension
    pub fn parse_file_as(
        &self,
        path: impl AsRef<Path>,
        language: Language,
    ) -> Result<ModuleParseResult> {
        let path = path.as_ref();
        let content = read_source(path)?;

        log::debug!("Parsing {} as {}", path.display(), language.as_str());
        self.parse_dialect(&content, Dialect::for_path(path, language))
    }

    /// Parse a file and project it into the renderer-facing schema
    pub fn parse_normalized(&self, path: impl AsRef<Path>) -> Result<NormalizedModule> {
        let path = path.as_ref();
        self.parse_normalized_as(path, Language::from_path(path)?)
    }

    /// [`parse_normalized`](Self::parse_normalized) with the language forced
    pub fn parse_normalized_as(
        &self,
        path: impl AsRef<Path>,
        language: Language,
    ) -> Result<NormalizedModule> {
        let path = path.as_ref();
        let result = self.parse_file_as(path, language)?;
        Ok(normalize_with_language(
            result,
            path,
            language,
            &self.normalize_options(),
        ))
    }

    pub(crate) fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            include_private: self.config.include_private,
        }
    }

    fn provider(&self) -> Result<&dyn SyntaxTreeProvider> {
        match &self.engine {
            Engine::Ready(provider) => Ok(provider.as_ref()),
            Engine::Unavailable(message) => Err(ParseError::tooling_unavailable(message.clone())),
            Engine::NotConfigured => Err(ParseError::tooling_unavailable(
                "JS/TS engine not initialized; call SourceParser::initialize_engine first",
            )),
        }
    }
}
