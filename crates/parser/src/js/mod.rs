//! JavaScript / TypeScript support: a typed view of the engine's ESTree output, the
//! process bridge that produces it, and the extractor walking it.

pub mod ast;
pub mod bridge;
pub mod extractor;

pub use ast::SyntaxTree;
pub use bridge::{engine_installed, BabelBridge, SyntaxTreeProvider};
pub use extractor::JsExtractor;
