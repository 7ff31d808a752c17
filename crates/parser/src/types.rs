use crate::error::SkipReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A function, arrow function or method extracted from source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionRecord {
    /// Declared name, `"anonymous"` when the declaration has none
    pub name: String,

    /// Parameter names in declaration order (JS/TS defaults render as `name=value`)
    pub parameters: Vec<String>,

    /// Parameter name → annotation text; unannotated parameters have no entry
    pub parameter_type_annotations: BTreeMap<String, String>,

    pub return_type_annotation: Option<String>,

    /// Free-text description from the docstring or JSDoc block
    pub doc_comment: Option<String>,

    /// JSDoc tag name → tag text (always empty for Python)
    pub doc_tags: BTreeMap<String, String>,

    pub is_async: bool,

    /// Arrow function or function expression bound to a variable (JS/TS only)
    pub is_arrow_or_anonymous_form: bool,

    pub is_exported: bool,

    /// Start line (1-indexed)
    pub source_line: usize,

    /// Source span of the definition
    pub source_text: String,
}

impl FunctionRecord {
    /// Create a record with just a name and a start line
    pub fn new(name: impl Into<String>, source_line: usize) -> Self {
        Self {
            name: name.into(),
            source_line,
            ..Default::default()
        }
    }

    /// Builder: add a parameter, optionally annotated
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, annotation: Option<String>) -> Self {
        let name = name.into();
        if let Some(annotation) = annotation.filter(|a| !a.is_empty()) {
            self.parameter_type_annotations
                .insert(name.clone(), annotation);
        }
        self.parameters.push(name);
        self
    }

    /// Name starts with the privacy marker
    #[must_use]
    pub fn is_private(&self) -> bool {
        is_private_name(&self.name)
    }
}

/// A class extracted from source; owns its methods
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,

    pub doc_comment: Option<String>,

    pub doc_tags: BTreeMap<String, String>,

    /// Base classes in declaration order (at most one for JS/TS)
    pub base_types: Vec<String>,

    /// Methods in declaration order
    pub methods: Vec<FunctionRecord>,

    /// Property names (JS/TS only)
    pub properties: Vec<String>,

    pub is_exported: bool,

    /// Start line (1-indexed)
    pub source_line: usize,

    pub source_text: String,
}

impl ClassRecord {
    pub fn new(name: impl Into<String>, source_line: usize) -> Self {
        Self {
            name: name.into(),
            source_line,
            ..Default::default()
        }
    }

    /// Look up a method by name
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&FunctionRecord> {
        self.methods.iter().find(|m| m.name == name)
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        is_private_name(&self.name)
    }
}

/// Counters collected during one extraction pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Nodes left out because their sub-tree had an unexpected shape
    pub skipped_nodes: Vec<SkipReason>,
}

impl ExtractionStats {
    pub fn skip(&mut self, reason: SkipReason) {
        log::debug!(
            "Skipping node at line {:?}: {}",
            reason.line,
            reason.message
        );
        self.skipped_nodes.push(reason);
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped_nodes.len()
    }
}

/// Everything extracted from one source file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleParseResult {
    /// Top-level functions; methods are never listed here
    pub functions: Vec<FunctionRecord>,

    /// Top-level classes
    pub classes: Vec<ClassRecord>,

    /// Import descriptors in source order
    pub imports: Vec<String>,

    /// Exported names in source order
    pub exports: Vec<String>,

    #[serde(default)]
    pub stats: ExtractionStats,
}

impl ModuleParseResult {
    /// Number of top-level functions and classes
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.functions.len() + self.classes.len()
    }

    /// A successful parse that found no definitions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassRecord> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// Conventional privacy marker: a leading underscore
#[must_use]
pub fn is_private_name(name: &str) -> bool {
    name.starts_with('_')
}
