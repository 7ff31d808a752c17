use super::ast::{
    AnyNode, Class, ClassMember, DefaultExport, Expression, Function, ImportDeclaration,
    ImportSpecifier, Pattern, SourceLocation, Statement, SyntaxTree, TypeAnnotation,
};
use super::bridge::SyntaxTreeProvider;
use crate::docs::{self, DocComment};
use crate::error::{Result, SkipReason};
use crate::language::Dialect;
use crate::types::{ClassRecord, ExtractionStats, FunctionRecord, ModuleParseResult};
use serde::Deserialize;
use serde_json::Value;

const ANONYMOUS: &str = "anonymous";
const DEFAULT_EXPORT: &str = "default";

/// Structural extractor for JavaScript and TypeScript.
///
/// Walks the top level of a program tree obtained from a [`SyntaxTreeProvider`]. Nodes
/// that fail to decode are skipped and counted in [`ExtractionStats`], never fatal.
pub struct JsExtractor<'a> {
    provider: &'a dyn SyntaxTreeProvider,
    doc_window: usize,
}

impl<'a> JsExtractor<'a> {
    pub fn new(provider: &'a dyn SyntaxTreeProvider, doc_window: usize) -> Self {
        Self {
            provider,
            doc_window,
        }
    }

    /// Parse `content` through the provider and extract records from the tree
    pub fn extract(&self, content: &str, dialect: Dialect) -> Result<ModuleParseResult> {
        log::debug!(
            "Parsing {} source with the {} engine",
            dialect.as_str(),
            self.provider.name()
        );
        let tree = self.provider.parse(content, dialect)?;
        Ok(self.extract_tree(&tree, content))
    }

    /// Extract records from an already parsed tree
    pub fn extract_tree(&self, tree: &SyntaxTree, content: &str) -> ModuleParseResult {
        let walk = Walk {
            src: SourceLines::new(content),
            doc_window: self.doc_window,
        };

        let mut result = ModuleParseResult::default();
        let mut stats = ExtractionStats::default();

        for node in &tree.body {
            match Statement::deserialize(node) {
                Ok(stmt) => walk.statement(&stmt, None, &mut result, &mut stats),
                Err(e) => stats.skip(SkipReason::node_extraction(
                    line_hint(node),
                    format!("{}: {e}", node_kind(node)),
                )),
            }
        }

        result.stats = stats;
        result
    }
}

/// Per-file walk state
struct Walk<'s> {
    src: SourceLines<'s>,
    doc_window: usize,
}

impl Walk<'_> {
    /// `export` carries the location of the wrapping export statement, if any
    fn statement(
        &self,
        stmt: &Statement,
        export: Option<&SourceLocation>,
        result: &mut ModuleParseResult,
        stats: &mut ExtractionStats,
    ) {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                let span = export.unwrap_or(&func.loc);
                let mut record = self.function(identifier(func), func, false, span);
                if export.is_some() {
                    record.is_exported = true;
                    result.exports.push(record.name.clone());
                }
                result.functions.push(record);
            }
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    let Pattern::Identifier(id) = &declarator.id else {
                        continue;
                    };
                    if export.is_some() {
                        result.exports.push(id.name.clone());
                    }

                    let func = match &declarator.init {
                        Some(Expression::ArrowFunctionExpression(f))
                        | Some(Expression::FunctionExpression(f)) => f,
                        _ => continue,
                    };

                    // A lone declarator owns the whole statement, docs included
                    let span = if decl.declarations.len() == 1 {
                        export.unwrap_or(&decl.loc)
                    } else {
                        &declarator.loc
                    };
                    let mut record = self.function(Some(id.name.as_str()), func, true, span);
                    record.is_exported = export.is_some();
                    result.functions.push(record);
                }
            }
            Statement::ClassDeclaration(class) => {
                let span = export.unwrap_or(&class.loc);
                let mut record = self.class(class, span, stats);
                if export.is_some() {
                    record.is_exported = true;
                    result.exports.push(record.name.clone());
                }
                result.classes.push(record);
            }
            Statement::ImportDeclaration(import) => {
                result.imports.push(describe_import(import));
            }
            Statement::ExportNamedDeclaration(named) => {
                if let Some(inner) = &named.declaration {
                    self.statement(inner, Some(&named.loc), result, stats);
                }
                result.exports.extend(
                    named
                        .specifiers
                        .iter()
                        .filter_map(|spec| spec.exported.as_ref())
                        .filter_map(AnyNode::resolved_name),
                );
            }
            Statement::ExportDefaultDeclaration(default) => {
                let span = &default.loc;
                match &default.declaration {
                    DefaultExport::FunctionDeclaration(func)
                    | DefaultExport::FunctionExpression(func) => {
                        let mut record = self.function(identifier(func), func, false, span);
                        record.is_exported = true;
                        result.exports.push(exported_name(identifier(func)));
                        result.functions.push(record);
                    }
                    DefaultExport::ArrowFunctionExpression(func) => {
                        let mut record = self.function(None, func, true, span);
                        record.is_exported = true;
                        result.exports.push(DEFAULT_EXPORT.to_string());
                        result.functions.push(record);
                    }
                    DefaultExport::ClassDeclaration(class) => {
                        let mut record = self.class(class, span, stats);
                        record.is_exported = true;
                        result
                            .exports
                            .push(exported_name(class.id.as_ref().map(|id| id.name.as_str())));
                        result.classes.push(record);
                    }
                    DefaultExport::Other => result.exports.push(DEFAULT_EXPORT.to_string()),
                }
            }
            Statement::Unsupported => {}
        }
    }

    fn function(
        &self,
        name: Option<&str>,
        func: &Function,
        arrow_form: bool,
        span: &SourceLocation,
    ) -> FunctionRecord {
        let mut record = FunctionRecord::new(name.unwrap_or(ANONYMOUS), span.start.line);
        record.is_async = func.is_async;
        record.is_arrow_or_anonymous_form = arrow_form;

        for param in &func.params {
            if let Some((entry, annotation)) = self.parameter(param) {
                record = record.parameter(entry, annotation);
            }
        }

        record.return_type_annotation = self.annotation(func.return_type.as_ref());

        let doc = self.doc_comment_before(span.start.line).unwrap_or_default();
        record.doc_comment = doc.description;
        record.doc_tags = doc.tags;

        record.source_text = self.src.slice(span).unwrap_or_default();
        record
    }

    fn class(
        &self,
        class: &Class,
        span: &SourceLocation,
        stats: &mut ExtractionStats,
    ) -> ClassRecord {
        let name = class.id.as_ref().map_or(ANONYMOUS, |id| id.name.as_str());
        let mut record = ClassRecord::new(name, span.start.line);

        if let Some(base) = &class.super_class {
            let rendered = match base.kind.as_str() {
                "Identifier" => base.name_str().map(str::to_string),
                _ => base.loc.as_ref().and_then(|loc| self.src.slice(loc)),
            };
            record.base_types.extend(rendered.map(|b| collapse_whitespace(&b)));
        }

        for node in &class.body.body {
            match ClassMember::deserialize(node) {
                Ok(member) => self.member(member, &mut record),
                Err(e) => stats.skip(SkipReason::node_extraction(
                    line_hint(node),
                    format!("{name}.{}: {e}", node_kind(node)),
                )),
            }
        }

        let doc = self.doc_comment_before(span.start.line).unwrap_or_default();
        record.doc_comment = doc.description;
        record.doc_tags = doc.tags;
        record.source_text = self.src.slice(span).unwrap_or_default();
        record
    }

    fn member(&self, member: ClassMember, record: &mut ClassRecord) {
        match member {
            ClassMember::MethodDefinition {
                key,
                mut value,
                return_type,
                loc,
            } => {
                if value.return_type.is_none() {
                    value.return_type = return_type;
                }
                let name = self.key_name(&key);
                record
                    .methods
                    .push(self.function(name.as_deref(), &value, false, &loc));
            }
            ClassMember::ClassMethod {
                key,
                params,
                is_async,
                return_type,
                loc,
            } => {
                let func = Function {
                    id: None,
                    params,
                    is_async,
                    return_type,
                    loc,
                };
                let name = self.key_name(&key);
                record
                    .methods
                    .push(self.function(name.as_deref(), &func, false, &loc));
            }
            ClassMember::PropertyDefinition { key }
            | ClassMember::ClassProperty { key }
            | ClassMember::ClassPrivateProperty { key } => {
                record.properties.extend(key.resolved_name());
            }
            ClassMember::Other => {}
        }
    }

    /// Method key: plain or private name, string literal, else the computed key source
    fn key_name(&self, key: &AnyNode) -> Option<String> {
        key.resolved_name()
            .or_else(|| key.loc.as_ref().and_then(|loc| self.src.slice(loc)))
    }

    /// Parameter entry plus its annotation; destructuring patterns yield nothing
    fn parameter(&self, pattern: &Pattern) -> Option<(String, Option<String>)> {
        match pattern {
            Pattern::Identifier(id) => Some((
                id.name.clone(),
                self.annotation(id.type_annotation.as_ref()),
            )),
            Pattern::AssignmentPattern { left, right } => {
                let (name, annotation) = self.parameter(left)?;
                Some((format!("{name}={}", self.default_value(right)), annotation))
            }
            Pattern::RestElement {
                argument,
                type_annotation,
            } => {
                let (name, annotation) = self.parameter(argument)?;
                let annotation = self.annotation(type_annotation.as_ref()).or(annotation);
                Some((format!("...{name}"), annotation))
            }
            Pattern::TSParameterProperty { parameter } => self.parameter(parameter),
            Pattern::Other => None,
        }
    }

    fn default_value(&self, node: &AnyNode) -> String {
        if let Some(raw) = node.literal_raw() {
            return raw;
        }
        if node.kind == "Identifier" {
            if let Some(name) = node.name_str() {
                return name.to_string();
            }
        }
        node.loc
            .as_ref()
            .and_then(|loc| self.src.slice(loc))
            .map(|text| collapse_whitespace(&text))
            .unwrap_or_default()
    }

    /// Type text as written, without the leading `:`
    fn annotation(&self, annotation: Option<&TypeAnnotation>) -> Option<String> {
        let annotation = annotation?;
        let text = match annotation.inner.as_ref().and_then(|inner| inner.loc.as_ref()) {
            Some(loc) => self.src.slice(loc)?,
            None => self.src.slice(annotation.loc.as_ref()?)?,
        };
        let text = text.trim().trim_start_matches(':').trim();
        (!text.is_empty()).then(|| collapse_whitespace(text))
    }

    /// Nearest `/** ... */` block above `line`, separated from it only by blank,
    /// decorator or `//` comment lines, opening within the search window
    fn doc_comment_before(&self, line: usize) -> Option<DocComment> {
        let above = line.saturating_sub(1).min(self.src.len());
        let floor = above.saturating_sub(self.doc_window);

        let mut idx = above;
        let close = loop {
            if idx == floor {
                return None;
            }
            idx -= 1;
            let text = self.src.line(idx).trim();
            if text.is_empty() || text.starts_with('@') || text.starts_with("//") {
                continue;
            }
            if text.ends_with("*/") {
                break idx;
            }
            return None;
        };

        let mut open = close + 1;
        while open > floor {
            open -= 1;
            let text = self.src.line(open);
            let Some(pos) = text.find("/*") else {
                continue;
            };
            let opening = &text[pos..];
            if !opening.starts_with("/**") || opening.starts_with("/**/") {
                return None;
            }
            let block = self.src.block(open, pos, close);
            return Some(docs::parse_jsdoc(&block));
        }
        None
    }
}

/// Source text split into lines, addressed with engine positions
struct SourceLines<'s> {
    lines: Vec<&'s str>,
}

impl<'s> SourceLines<'s> {
    /// Line terminators match the engine's: `\r\n`, `\n`, `\r`, U+2028 and U+2029
    fn new(content: &'s str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        let mut chars = content.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            match ch {
                '\n' | '\u{2028}' | '\u{2029}' => {
                    lines.push(&content[start..idx]);
                    start = idx + ch.len_utf8();
                }
                '\r' => {
                    lines.push(&content[start..idx]);
                    start = idx + 1;
                    if let Some(&(next, '\n')) = chars.peek() {
                        chars.next();
                        start = next + 1;
                    }
                }
                _ => {}
            }
        }
        lines.push(&content[start..]);
        Self { lines }
    }

    fn len(&self) -> usize {
        self.lines.len()
    }

    /// 0-based line, empty when out of range
    fn line(&self, idx: usize) -> &'s str {
        self.lines.get(idx).copied().unwrap_or_default()
    }

    /// Exact text covered by `loc`
    fn slice(&self, loc: &SourceLocation) -> Option<String> {
        let first = loc.start.line.checked_sub(1)?;
        let last = loc.end.line.checked_sub(1)?;
        if last < first || last >= self.lines.len() {
            return None;
        }

        let start_line = self.lines[first];
        let start = utf16_to_byte(start_line, loc.start.column);
        if first == last {
            let end = utf16_to_byte(start_line, loc.end.column).max(start);
            return Some(start_line[start..end].to_string());
        }

        let end_line = self.lines[last];
        let mut text = String::from(&start_line[start..]);
        for line in &self.lines[first + 1..last] {
            text.push('\n');
            text.push_str(line);
        }
        text.push('\n');
        text.push_str(&end_line[..utf16_to_byte(end_line, loc.end.column)]);
        Some(text)
    }

    /// Comment block from byte `pos` of line `open` through the `*/` on line `close`
    fn block(&self, open: usize, pos: usize, close: usize) -> String {
        let mut text = String::new();
        for idx in open..=close {
            let mut line = self.line(idx);
            if idx == open {
                line = &line[pos..];
            }
            if idx == close {
                if let Some(end) = line.rfind("*/") {
                    line = &line[..end + 2];
                }
            }
            if idx != open {
                text.push('\n');
            }
            text.push_str(line);
        }
        text
    }
}

/// Engine columns count UTF-16 code units; clamp to the line and to char boundaries
fn utf16_to_byte(line: &str, column: usize) -> usize {
    let mut units = 0;
    for (idx, ch) in line.char_indices() {
        if units >= column {
            return idx;
        }
        units += ch.len_utf16();
    }
    line.len()
}

fn identifier(func: &Function) -> Option<&str> {
    func.id.as_ref().map(|id| id.name.as_str())
}

fn exported_name(name: Option<&str>) -> String {
    name.unwrap_or(DEFAULT_EXPORT).to_string()
}

fn describe_import(import: &ImportDeclaration) -> String {
    let source = import
        .source
        .value
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut names = Vec::new();
    let mut namespace = None;
    for spec in &import.specifiers {
        match spec {
            ImportSpecifier::ImportDefaultSpecifier { local }
            | ImportSpecifier::ImportSpecifier { local } => names.push(local.name.clone()),
            ImportSpecifier::ImportNamespaceSpecifier { local } => {
                namespace = Some(local.name.clone());
            }
            ImportSpecifier::Other => {}
        }
    }

    match (names.is_empty(), namespace) {
        (true, None) => format!("import '{source}'"),
        (true, Some(ns)) => format!("import * as {ns} from '{source}'"),
        (false, ns) => {
            names.extend(ns.map(|ns| format!("* as {ns}")));
            format!("import {{{}}} from '{source}'", names.join(", "))
        }
    }
}

fn line_hint(node: &Value) -> Option<usize> {
    node.pointer("/loc/start/line")
        .and_then(Value::as_u64)
        .and_then(|line| usize::try_from(line).ok())
}

fn node_kind(node: &Value) -> &str {
    node.get("type").and_then(Value::as_str).unwrap_or("node")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
