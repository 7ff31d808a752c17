//! # CodeDoc Parser
//!
//! Structural source parser for Python, JavaScript and TypeScript.
//!
//! Turns source text into one intermediate representation of functions, classes,
//! methods, parameters, type annotations, doc-comments and module imports/exports,
//! ready for a documentation renderer.
//!
//! ## Architecture
//!
//! ```text
//! Source file
//!     │
//!     ├──> Language detection (from extension)
//!     │
//!     ├──> Python:  tree-sitter parse (in-process)
//!     │             └─> top-level defs, classes, imports
//!     │
//!     ├──> JS/TS:   SyntaxTreeProvider (Node.js + @babel/parser)
//!     │             ├─> ESTree JSON → typed nodes, one statement at a time
//!     │             └─> declarations, arrow bindings, classes, imports, exports
//!     │
//!     ├──> Doc-comment parsing (docstrings, JSDoc blocks)
//!     │
//!     └──> Normalization
//!          ├─> privacy filter
//!          └─> language tag → NormalizedModule
//! ```
//!
//! ## Example
//!
//! ```rust
//! use codedoc_parser::{Language, ParserConfig, SourceParser};
//!
//! let parser = SourceParser::new(ParserConfig::default()).unwrap();
//!
//! let code = r#"
//! def add(a: int, b: int) -> int:
//!     """Add two numbers."""
//!     return a + b
//! "#;
//!
//! let result = parser.parse_source(code, Language::Python).unwrap();
//! let add = result.function("add").unwrap();
//! assert_eq!(add.parameters, vec!["a", "b"]);
//! assert_eq!(add.return_type_annotation.as_deref(), Some("int"));
//! assert_eq!(add.doc_comment.as_deref(), Some("Add two numbers."));
//! ```

mod batch;
mod config;
pub mod docs;
mod error;
pub mod js;
mod language;
mod normalize;
mod parser;
mod python;
mod types;

pub use batch::{needs_engine, BatchReport, BatchSummary, SkippedFile, SourceScanner};
pub use config::{EngineConfig, ParserConfig};
pub use docs::DocComment;
pub use error::{ParseError, Result, SkipReason, SyntaxDiagnostic};
pub use js::{BabelBridge, JsExtractor, SyntaxTree, SyntaxTreeProvider};
pub use language::{Dialect, Language};
pub use normalize::{normalize, normalize_with_language, NormalizeOptions, NormalizedModule};
pub use parser::{read_source, SourceParser};
pub use python::PythonExtractor;
pub use types::{ClassRecord, ExtractionStats, FunctionRecord, ModuleParseResult};
