//! Projection of per-language results into the schema handed to renderers.
//!
//! Exactly two transformations happen here, in order: the optional privacy filter, then
//! language tagging. Everything else is copied through untouched.

use crate::error::{Result, SkipReason};
use crate::language::Language;
use crate::types::{ClassRecord, FunctionRecord, ModuleParseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for [`normalize`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Keep records whose name starts with `_`
    pub include_private: bool,
}

/// One source file in the renderer-facing schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedModule {
    pub language: Language,
    pub file_path: String,
    pub functions: Vec<FunctionRecord>,
    pub classes: Vec<ClassRecord>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub total_functions: usize,
    pub total_classes: usize,
    /// Nodes the extractor could not convert, kept for diagnostics
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_nodes: Vec<SkipReason>,
}

impl NormalizedModule {
    /// Top-level functions plus classes
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.total_functions + self.total_classes
    }
}

/// Normalize a result, deriving the language from the file extension
pub fn normalize(
    result: ModuleParseResult,
    path: impl AsRef<Path>,
    options: &NormalizeOptions,
) -> Result<NormalizedModule> {
    let path = path.as_ref();
    let language = Language::from_path(path)?;
    Ok(normalize_with_language(result, path, language, options))
}

/// Normalize a result whose language is already known (in-memory sources)
pub fn normalize_with_language(
    result: ModuleParseResult,
    path: impl AsRef<Path>,
    language: Language,
    options: &NormalizeOptions,
) -> NormalizedModule {
    let ModuleParseResult {
        mut functions,
        mut classes,
        imports,
        exports,
        stats,
    } = result;

    if !options.include_private {
        functions.retain(|f| !f.is_private());
        classes.retain(|c| !c.is_private());
        for class in &mut classes {
            class.methods.retain(|m| !m.is_private());
        }
    }

    NormalizedModule {
        language,
        file_path: path.as_ref().display().to_string(),
        total_functions: functions.len(),
        total_classes: classes.len(),
        functions,
        classes,
        imports,
        exports,
        skipped_nodes: stats.skipped_nodes,
    }
}
