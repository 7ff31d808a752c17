use crate::docs;
use crate::error::{ParseError, Result, SkipReason};
use crate::types::{ClassRecord, ExtractionStats, FunctionRecord, ModuleParseResult};
use tree_sitter::{Node, Parser};

/// In-process structural extractor for Python, walking a tree-sitter syntax tree
pub struct PythonExtractor {
    parser: Parser,
}

impl PythonExtractor {
    /// Create a new extractor with the Python grammar loaded
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| {
                ParseError::tooling_unavailable(format!("Failed to load Python grammar: {e}"))
            })?;

        Ok(Self { parser })
    }

    /// Extract top-level functions, classes and imports.
    ///
    /// Any syntax error fails the whole file; no partial result is returned.
    pub fn extract(&mut self, content: &str) -> Result<ModuleParseResult> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| ParseError::malformed_tree("tree-sitter returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(Self::syntax_error(root));
        }
        check_structure(content, root)?;

        let mut result = ModuleParseResult::default();
        let mut stats = ExtractionStats::default();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" | "class_definition" | "decorated_definition" => {
                    self.extract_definition(content, child, &mut result, &mut stats);
                }
                "import_statement" | "import_from_statement" | "future_import_statement" => {
                    result.imports.push(collapse_whitespace(node_text(content, child)));
                }
                _ => {}
            }
        }

        result.stats = stats;
        Ok(result)
    }

    fn extract_definition(
        &self,
        content: &str,
        node: Node,
        result: &mut ModuleParseResult,
        stats: &mut ExtractionStats,
    ) {
        // Decorators are part of the recorded span, the definition itself is unwrapped
        let (definition, span) = match node.kind() {
            "decorated_definition" => match node.child_by_field_name("definition") {
                Some(def) => (def, node),
                None => {
                    stats.skip(SkipReason::node_extraction(
                        Some(line_of(node)),
                        "decorated definition without a definition",
                    ));
                    return;
                }
            },
            _ => (node, node),
        };

        match definition.kind() {
            "function_definition" => match Self::function_record(content, definition, span) {
                Some(record) => result.functions.push(record),
                None => stats.skip(SkipReason::node_extraction(
                    Some(line_of(definition)),
                    "function definition without a name",
                )),
            },
            "class_definition" => match Self::class_record(content, definition, span, stats) {
                Some(record) => result.classes.push(record),
                None => stats.skip(SkipReason::node_extraction(
                    Some(line_of(definition)),
                    "class definition without a name",
                )),
            },
            _ => {}
        }
    }

    fn function_record(content: &str, def: Node, span: Node) -> Option<FunctionRecord> {
        let name = node_text(content, def.child_by_field_name("name")?);
        let mut record = FunctionRecord::new(name, line_of(def));

        record.is_async = has_child_kind(def, "async");

        if let Some(params) = def.child_by_field_name("parameters") {
            for (param, annotation) in Self::extract_parameters(content, params) {
                record = record.parameter(param, annotation);
            }
        }

        record.return_type_annotation = def
            .child_by_field_name("return_type")
            .map(|node| collapse_whitespace(node_text(content, node)));

        if let Some(body) = def.child_by_field_name("body") {
            let doc = Self::extract_docstring(content, body)
                .map(|raw| docs::parse_docstring(&raw))
                .unwrap_or_default();
            record.doc_comment = doc.description;
            record.doc_tags = doc.tags;
        }

        record.source_text = dedent_span(content, span);
        Some(record)
    }

    fn class_record(
        content: &str,
        def: Node,
        span: Node,
        stats: &mut ExtractionStats,
    ) -> Option<ClassRecord> {
        let name = node_text(content, def.child_by_field_name("name")?);
        let mut record = ClassRecord::new(name, line_of(def));

        if let Some(superclasses) = def.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                // `metaclass=...` and friends are class keywords, not bases
                if matches!(base.kind(), "keyword_argument" | "comment") {
                    continue;
                }
                record
                    .base_types
                    .push(collapse_whitespace(node_text(content, base)));
            }
        }

        if let Some(body) = def.child_by_field_name("body") {
            let doc = Self::extract_docstring(content, body)
                .map(|raw| docs::parse_docstring(&raw))
                .unwrap_or_default();
            record.doc_comment = doc.description;
            record.doc_tags = doc.tags;

            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                let (method_def, method_span) = match member.kind() {
                    "function_definition" => (member, member),
                    "decorated_definition" => match member.child_by_field_name("definition") {
                        Some(def) if def.kind() == "function_definition" => (def, member),
                        _ => continue,
                    },
                    _ => continue,
                };

                match Self::function_record(content, method_def, method_span) {
                    Some(method) => record.methods.push(method),
                    None => stats.skip(SkipReason::node_extraction(
                        Some(line_of(method_def)),
                        "method definition without a name",
                    )),
                }
            }
        }

        record.source_text = dedent_span(content, span);
        Some(record)
    }

    /// Positional parameters up to the first `*`, `*args` or `**kwargs`
    fn extract_parameters(content: &str, params: Node) -> Vec<(String, Option<String>)> {
        let mut out = Vec::new();
        let mut cursor = params.walk();

        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => out.push((node_text(content, child).to_string(), None)),
                "typed_parameter" => {
                    let Some(target) = child.named_child(0) else {
                        continue;
                    };
                    if target.kind() != "identifier" {
                        // `*args: int` / `**kwargs: str`
                        break;
                    }
                    let annotation = child
                        .child_by_field_name("type")
                        .map(|t| collapse_whitespace(node_text(content, t)));
                    out.push((node_text(content, target).to_string(), annotation));
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let annotation = child
                        .child_by_field_name("type")
                        .map(|t| collapse_whitespace(node_text(content, t)));
                    out.push((node_text(content, name).to_string(), annotation));
                }
                "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => break,
                _ => {}
            }
        }

        out
    }

    /// Decoded content of the leading string statement of a block, if any
    fn extract_docstring(content: &str, body: Node) -> Option<String> {
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment")?;

        if first.kind() != "expression_statement" || first.named_child_count() != 1 {
            return None;
        }

        let literal = first.named_child(0)?;
        match literal.kind() {
            "string" => decode_string(content, literal),
            "concatenated_string" => {
                let mut joined = String::new();
                let mut parts = literal.walk();
                for part in literal.named_children(&mut parts) {
                    if part.kind() == "comment" {
                        continue;
                    }
                    joined.push_str(&decode_string(content, part)?);
                }
                Some(joined)
            }
            _ => None,
        }
    }

    fn syntax_error(root: Node) -> ParseError {
        match first_error_node(root) {
            Some(node) => {
                let pos = node.start_position();
                let message = if node.is_missing() {
                    format!("invalid syntax: missing `{}`", node.kind())
                } else {
                    "invalid syntax".to_string()
                };
                ParseError::syntax(pos.row + 1, pos.column + 1, message)
            }
            None => ParseError::syntax(1, 1, "invalid syntax"),
        }
    }
}

/// Rules the interpreter enforces but the grammar tolerates: statement indentation,
/// Python 2 `print`/`exec` statements and parameter default ordering
fn check_structure(content: &str, root: Node) -> Result<()> {
    let lines = Indentation::new(content);
    lines.check_suite(root, Some(0))?;

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "print_statement" => {
                return Err(error_at(node, "Missing parentheses in call to 'print'"))
            }
            "exec_statement" => {
                return Err(error_at(node, "Missing parentheses in call to 'exec'"))
            }
            "block" => lines.check_block(node)?,
            "parameters" | "lambda_parameters" => check_default_order(node)?,
            _ => {}
        }

        // Pre-order, so the first offending node in the file is reported
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    Ok(())
}

fn check_default_order(params: Node) -> Result<()> {
    let mut seen_default = false;
    let mut cursor = params.walk();

    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "default_parameter" | "typed_default_parameter" => seen_default = true,
            "identifier" if seen_default => {
                return Err(error_at(
                    child,
                    "parameter without a default follows parameter with a default",
                ))
            }
            "typed_parameter" => {
                let positional = child
                    .named_child(0)
                    .is_some_and(|target| target.kind() == "identifier");
                if !positional {
                    break;
                }
                if seen_default {
                    return Err(error_at(
                        child,
                        "parameter without a default follows parameter with a default",
                    ));
                }
            }
            // Keyword-only parameters may omit defaults
            "list_splat_pattern" | "dictionary_splat_pattern" | "keyword_separator" => break,
            _ => {}
        }
    }
    Ok(())
}

fn error_at(node: Node, message: &str) -> ParseError {
    let pos = node.start_position();
    ParseError::syntax(pos.row + 1, pos.column + 1, message)
}

/// Leading whitespace of each source line, by tree-sitter row
struct Indentation<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Indentation<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            lines: content.split('\n').collect(),
        }
    }

    fn indent(&self, row: usize) -> usize {
        let line = self.lines.get(row).copied().unwrap_or_default();
        line.len() - line.trim_start_matches([' ', '\t', '\x0c']).len()
    }

    /// Statements opening their line; those after `;` share the line and are exempt
    fn leading_statements<'t>(&self, suite: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = suite.walk();
        let statements = suite
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .filter(|n| self.indent(n.start_position().row) == n.start_position().column)
            .collect();
        statements
    }

    /// All leading statements of a suite share one indentation, `expected` when given
    fn check_suite(&self, suite: Node, expected: Option<usize>) -> Result<()> {
        let statements = self.leading_statements(suite);
        let first = statements.first().map(|n| n.start_position().column);
        let Some(level) = expected.or(first) else {
            return Ok(());
        };

        for stmt in statements {
            let column = stmt.start_position().column;
            if column != level {
                return Err(self.indent_error(stmt, column));
            }
        }
        Ok(())
    }

    fn check_block(&self, block: Node) -> Result<()> {
        let Some(header) = block.parent() else {
            return Ok(());
        };
        let header_row = header.start_position().row;

        let mut cursor = block.walk();
        let first = block
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment");
        let Some(first) = first else {
            return Err(error_at(block, "expected an indented block"));
        };
        // `if x: pass` style bodies share the header line
        if first.start_position().row == header_row {
            return Ok(());
        }

        let header_indent = self.indent(header_row);
        if let Some(stmt) = self
            .leading_statements(block)
            .into_iter()
            .find(|n| n.start_position().column <= header_indent)
        {
            return Err(error_at(stmt, "expected an indented block"));
        }
        self.check_suite(block, None)
    }

    fn indent_error(&self, stmt: Node, column: usize) -> ParseError {
        let row = stmt.start_position().row;
        let previous = (0..row)
            .rev()
            .map(|r| (r, self.lines.get(r).copied().unwrap_or_default().trim()))
            .find(|(_, text)| !text.is_empty() && !text.starts_with('#'))
            .map(|(r, _)| self.indent(r));

        match previous {
            Some(indent) if indent > column => {
                error_at(stmt, "unindent does not match any outer indentation level")
            }
            _ => error_at(stmt, "unexpected indent"),
        }
    }
}

fn first_error_node(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.is_error() || child.is_missing() || child.has_error() {
            if let Some(found) = first_error_node(child) {
                return Some(found);
            }
        }
    }
    None
}

/// Plain string literal content; `None` for f-strings and bytes
fn decode_string(content: &str, node: Node) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }

    let mut start = None;
    let mut end = None;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string_start" => start = Some(child),
            "string_end" => end = Some(child),
            "interpolation" => return None,
            _ => {}
        }
    }
    let (start, end) = (start?, end?);

    let prefix: String = node_text(content, start)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }

    let raw = content.get(start.end_byte()..end.start_byte())?;
    if prefix.contains('r') {
        Some(raw.to_string())
    } else {
        Some(unescape(raw))
    }
}

/// Decode backslash escapes of a non-raw Python string literal
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };

        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => {
                        out.push(c);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            '0'..='7' => {
                let mut value = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    out
}

fn node_text<'a>(content: &'a str, node: Node) -> &'a str {
    &content[node.start_byte()..node.end_byte()]
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == kind);
    found
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Source span of a node, shifted so the definition starts at column 0
fn dedent_span(content: &str, node: Node) -> String {
    let text = node_text(content, node);
    let indent = node.start_position().column;
    if indent == 0 {
        return text.to_string();
    }

    text.lines()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                return line;
            }
            let leading = line.len() - line.trim_start_matches([' ', '\t']).len();
            &line[leading.min(indent)..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}
