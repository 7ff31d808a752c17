//! Typed view of the ESTree-shaped JSON emitted by the external engine.
//!
//! Only the fields the extractor reads are modelled; everything else is ignored. Each
//! enum carries a catch-all variant so unknown node kinds deserialize instead of failing.
//! Top-level statements and class members are kept as raw JSON in the tree and decoded
//! one by one, so a single malformed node never poisons the rest of the file.

use serde::Deserialize;
use serde_json::Value;

/// Program node returned by a [`SyntaxTreeProvider`](super::SyntaxTreeProvider)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyntaxTree {
    #[serde(default)]
    pub body: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct Position {
    /// 1-based
    pub line: usize,
    /// 0-based, in UTF-16 code units
    #[serde(default)]
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
}

/// Top-level statement kinds the extractor understands
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    FunctionDeclaration(Function),
    VariableDeclaration(VariableDeclaration),
    ClassDeclaration(Class),
    ImportDeclaration(ImportDeclaration),
    ExportNamedDeclaration(ExportNamedDeclaration),
    ExportDefaultDeclaration(ExportDefaultDeclaration),
    #[serde(other)]
    Unsupported,
}

/// Function declaration, function expression or arrow function
#[derive(Debug, Clone, Deserialize)]
pub struct Function {
    pub id: Option<Identifier>,
    #[serde(default)]
    pub params: Vec<Pattern>,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(rename = "returnType")]
    pub return_type: Option<TypeAnnotation>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identifier {
    pub name: String,
    #[serde(rename = "typeAnnotation")]
    pub type_annotation: Option<TypeAnnotation>,
}

/// `: T` wrapper around a TypeScript or Flow type
#[derive(Debug, Clone, Deserialize)]
pub struct TypeAnnotation {
    pub loc: Option<SourceLocation>,
    #[serde(rename = "typeAnnotation")]
    pub inner: Option<Box<AnyNode>>,
}

/// Parameter and binding shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    Identifier(Identifier),
    AssignmentPattern {
        left: Box<Pattern>,
        right: AnyNode,
    },
    RestElement {
        argument: Box<Pattern>,
        #[serde(rename = "typeAnnotation")]
        type_annotation: Option<TypeAnnotation>,
    },
    /// `constructor(private readonly x: T)`
    TSParameterProperty { parameter: Box<Pattern> },
    #[serde(other)]
    Other,
}

/// Initializers the extractor turns into function records
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    ArrowFunctionExpression(Function),
    FunctionExpression(Function),
    #[serde(other)]
    Other,
}

/// Loosely typed node used where only a name, a literal or a source span is needed
#[derive(Debug, Clone, Deserialize)]
pub struct AnyNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<Value>,
    pub id: Option<Box<AnyNode>>,
    pub value: Option<Value>,
    pub raw: Option<String>,
    pub extra: Option<LiteralExtra>,
    pub loc: Option<SourceLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiteralExtra {
    pub raw: Option<String>,
}

impl AnyNode {
    /// `name` field when it is a plain string
    pub fn name_str(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }

    /// Name of an identifier-like node (`foo`, `#foo`, `"foo"`)
    pub fn resolved_name(&self) -> Option<String> {
        match self.kind.as_str() {
            "Identifier" => self.name_str().map(str::to_string),
            "PrivateIdentifier" => self.name_str().map(|n| format!("#{n}")),
            "PrivateName" => self
                .id
                .as_ref()
                .and_then(|id| id.name_str())
                .map(|n| format!("#{n}")),
            "Literal" | "StringLiteral" => match &self.value {
                Some(Value::String(s)) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Raw source of a literal node, as written
    pub fn literal_raw(&self) -> Option<String> {
        if self.kind != "Literal" && !self.kind.ends_with("Literal") {
            return None;
        }
        self.raw
            .clone()
            .or_else(|| self.extra.as_ref().and_then(|e| e.raw.clone()))
            .or_else(|| match &self.value {
                Some(Value::String(s)) => Some(format!("'{s}'")),
                Some(Value::Null) if self.kind == "NullLiteral" => Some("null".to_string()),
                Some(other) => Some(other.to_string()),
                None => None,
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDeclaration {
    #[serde(default)]
    pub declarations: Vec<VariableDeclarator>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Expression>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Class {
    pub id: Option<Identifier>,
    #[serde(rename = "superClass")]
    pub super_class: Option<AnyNode>,
    pub body: ClassBody,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassBody {
    #[serde(default)]
    pub body: Vec<Value>,
}

/// Class body members, in both ESTree and Babel-native spelling
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClassMember {
    MethodDefinition {
        key: AnyNode,
        value: Function,
        #[serde(rename = "returnType")]
        return_type: Option<TypeAnnotation>,
        loc: SourceLocation,
    },
    ClassMethod {
        key: AnyNode,
        #[serde(default)]
        params: Vec<Pattern>,
        #[serde(default, rename = "async")]
        is_async: bool,
        #[serde(rename = "returnType")]
        return_type: Option<TypeAnnotation>,
        loc: SourceLocation,
    },
    PropertyDefinition {
        key: AnyNode,
    },
    ClassProperty {
        key: AnyNode,
    },
    ClassPrivateProperty {
        key: AnyNode,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportDeclaration {
    pub source: AnyNode,
    #[serde(default)]
    pub specifiers: Vec<ImportSpecifier>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ImportSpecifier {
    ImportDefaultSpecifier { local: Identifier },
    ImportSpecifier { local: Identifier },
    ImportNamespaceSpecifier { local: Identifier },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportNamedDeclaration {
    pub declaration: Option<Box<Statement>>,
    #[serde(default)]
    pub specifiers: Vec<ExportSpecifier>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSpecifier {
    pub exported: Option<AnyNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportDefaultDeclaration {
    pub declaration: DefaultExport,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum DefaultExport {
    FunctionDeclaration(Function),
    ClassDeclaration(Class),
    ArrowFunctionExpression(Function),
    FunctionExpression(Function),
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_statement_is_unsupported() {
        let stmt: Statement =
            serde_json::from_value(json!({"type": "ExpressionStatement", "expression": {}}))
                .unwrap();
        assert!(matches!(stmt, Statement::Unsupported));
    }

    #[test]
    fn test_function_declaration_shape() {
        let stmt: Statement = serde_json::from_value(json!({
            "type": "FunctionDeclaration",
            "id": {"type": "Identifier", "name": "greet"},
            "params": [
                {"type": "Identifier", "name": "name"},
                {"type": "ObjectPattern", "properties": []}
            ],
            "async": true,
            "loc": {"start": {"line": 3, "column": 0}, "end": {"line": 5, "column": 1}}
        }))
        .unwrap();

        let Statement::FunctionDeclaration(f) = stmt else {
            panic!("expected function declaration");
        };
        assert_eq!(f.id.unwrap().name, "greet");
        assert!(f.is_async);
        assert!(matches!(f.params[1], Pattern::Other));
        assert_eq!(f.loc.start.line, 3);
    }

    #[test]
    fn test_missing_loc_is_an_error() {
        let result: Result<Statement, _> = serde_json::from_value(json!({
            "type": "FunctionDeclaration",
            "id": {"type": "Identifier", "name": "broken"},
            "params": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_names() {
        let private: AnyNode = serde_json::from_value(json!({
            "type": "PrivateName",
            "id": {"type": "Identifier", "name": "secret"}
        }))
        .unwrap();
        assert_eq!(private.resolved_name().as_deref(), Some("#secret"));

        let literal: AnyNode =
            serde_json::from_value(json!({"type": "Literal", "value": "key", "raw": "'key'"}))
                .unwrap();
        assert_eq!(literal.resolved_name().as_deref(), Some("key"));
        assert_eq!(literal.literal_raw().as_deref(), Some("'key'"));

        let number: AnyNode = serde_json::from_value(json!({
            "type": "NumericLiteral",
            "value": 10,
            "extra": {"raw": "10", "rawValue": 10}
        }))
        .unwrap();
        assert_eq!(number.literal_raw().as_deref(), Some("10"));
    }
}
