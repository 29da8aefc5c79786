//! Grammar, parser and transformer for doctype strings.
//!
//! A "doctype" is the free-text type description attached to a parameter,
//! attribute or return value in a narrative docstring. The grammar accepts
//! conventional typing syntax (`list[int]`, `int | float`) next to natural
//! language variants (`list of int`, `tuple of (float, ...)`,
//! `dict of {str: int}`, `int or float`, array shape/dtype phrasing,
//! literal sets and reStructuredText cross-references).
//!
//! [`parse_doctype`] lexes and parses one doctype into a parse tree and
//! normalizes it into an [`Expression`] of [`Token`]s whose
//! [`Expression::as_code`] form is conventional typing syntax. Shape
//! information, optional/default suffixes and cross-reference roles are
//! recognized and dropped structurally; whether `optional` triggers a
//! `| None` union is deferred to the caller that knows the real default.

mod parser;
mod token;

use log::{debug, warn};

use crate::error::{Error, Result};

/// Reserved Python keywords that must not appear as a resolved qualname.
///
/// The three literal constants (`True`, `False`, `None`) are excluded; they
/// are legitimate annotation content.
pub const BLACKLISTED_QUALNAMES: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Names that the grammar treats as array containers in shape/dtype phrasing.
pub const ARRAY_NAMES: &[&str] = &["array", "ndarray", "array-like", "array_like"];

/// The kind of an atomic doctype token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A (possibly dotted) name, the only kind eligible for import
    /// resolution.
    Name,
    /// A literal value such as `1`, `-2.`, `"x"`, `True` or `None`.
    Literal,
    /// Structural text such as `[`, `, ` or ` | `.
    Syntax,
}

/// An immutable atomic part of a parsed doctype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte span in the original doctype string, if the token corresponds
    /// to source text.
    pub span: Option<(usize, usize)>,
}

impl Token {
    pub fn name(text: impl Into<String>, span: Option<(usize, usize)>) -> Self {
        Self {
            kind: TokenKind::Name,
            text: text.into(),
            span,
        }
    }

    pub fn literal(text: impl Into<String>, span: Option<(usize, usize)>) -> Self {
        Self {
            kind: TokenKind::Literal,
            text: text.into(),
            span,
        }
    }

    pub fn syntax(text: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Syntax,
            text: text.into(),
            span: None,
        }
    }
}

/// A child of an [`Expression`]: either a nested expression or a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Expr(Expression),
    Token(Token),
}

/// An immutable composite node of a parsed doctype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// The grammar rule this node was produced by, e.g. `"union"` or
    /// `"natlang_container"`.
    pub rule: &'static str,
    pub children: Vec<Node>,
}

impl Expression {
    pub fn new(rule: &'static str, children: Vec<Node>) -> Self {
        Self { rule, children }
    }

    /// Flattens the tree into its token sequence, in source order.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a Token>) {
        for child in &self.children {
            match child {
                Node::Expr(expr) => expr.collect_tokens(out),
                Node::Token(token) => out.push(token),
            }
        }
    }

    /// Returns this expression and all nested expressions, depth first.
    pub fn sub_expressions(&self) -> Vec<&Expression> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            for child in &out[i].children {
                if let Node::Expr(expr) = child {
                    out.push(expr);
                }
            }
            i += 1;
        }
        out
    }

    /// Returns the rule tags of this expression and all nested ones.
    pub fn rules(&self) -> Vec<&'static str> {
        self.sub_expressions().iter().map(|e| e.rule).collect()
    }

    /// Extracts all NAME tokens with their text and byte positions.
    pub fn names(&self) -> Vec<(&str, usize, usize)> {
        self.tokens()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Name)
            .map(|t| {
                let (start, end) = t.span.unwrap_or((0, 0));
                (t.text.as_str(), start, end)
            })
            .collect()
    }

    /// Serializes the tree back into conventional typing syntax.
    pub fn as_code(&self) -> String {
        self.tokens().iter().map(|t| t.text.as_str()).collect()
    }
}

/// The result of parsing and normalizing one doctype string.
#[derive(Debug, Clone)]
pub struct ParsedDoctype {
    /// The normalized expression tree.
    pub expression: Expression,
    /// Whether the doctype carried a literal `optional` suffix. Unioning
    /// with `None` is decided by the caller that knows the real default.
    pub is_optional: bool,
    /// The raw doctype this was parsed from.
    pub raw: String,
}

impl ParsedDoctype {
    pub fn as_code(&self) -> String {
        self.expression.as_code()
    }
}

/// Parses one doctype string into a normalized [`ParsedDoctype`].
pub fn parse_doctype(doctype: &str) -> Result<ParsedDoctype> {
    let lexemes = token::lex(doctype)?;
    let tree = parser::Parser::new(doctype, lexemes).parse()?;

    let mut transformer = Transformer::default();
    let expression = transformer
        .transform(tree)?
        .ok_or_else(|| Error::syntax(doctype, 0))?;
    Ok(ParsedDoctype {
        expression,
        is_optional: transformer.optional,
        raw: doctype.to_string(),
    })
}

/// Normalizes a raw parse tree into the final expression tree.
///
/// Containers and literal sets are rewritten into subscription form, shape
/// and suffix subtrees are discarded, qualnames collapse into single NAME
/// tokens and reserved keywords are rejected.
#[derive(Debug, Default)]
struct Transformer {
    optional: bool,
}

impl Transformer {
    /// Transforms one node; `Ok(None)` means the subtree is discarded.
    fn transform(&mut self, expr: Expression) -> Result<Option<Expression>> {
        let rule = expr.rule;
        match rule {
            "doctype" => {
                let children = self.transform_children(expr.children)?;
                Ok(Some(Expression::new(rule, children)))
            }
            "qualname" => self.transform_qualname(expr).map(Some),
            "rst_role" => {
                // The role itself is stripped; only the qualname survives.
                let children = self
                    .transform_children(expr.children)?
                    .into_iter()
                    .filter(|child| matches!(child, Node::Expr(_)))
                    .collect();
                Ok(Some(Expression::new(rule, children)))
            }
            "union" => {
                let children = self.transform_children(expr.children)?;
                Ok(Some(Expression::new(
                    rule,
                    intersperse(children, || Node::Token(Token::syntax(" | "))),
                )))
            }
            "subscription" | "natlang_container" | "literal" => {
                let mut children = self.transform_children(expr.children)?;
                let head = children.remove(0);
                Ok(Some(Expression::new(rule, subscribe(head, children))))
            }
            "natlang_literal" => {
                let children = self.transform_children(expr.children)?;
                if children.len() == 1 {
                    let item = code_of(&children[0]);
                    warn!(
                        "natural language literal with one item `{{{item}}}`, \
                         consider using `Literal[{item}]` to improve readability"
                    );
                }
                let head = Node::Token(Token::name("Literal", None));
                Ok(Some(Expression::new(rule, subscribe(head, children))))
            }
            "natlang_array" => {
                let mut name = None;
                let mut dtype = None;
                for child in expr.children {
                    match child {
                        Node::Expr(e) if e.rule == "shape" => {
                            debug!("dropping shape information");
                        }
                        Node::Expr(e) if name.is_none() => name = Some(e),
                        Node::Expr(e) => dtype = Some(e),
                        Node::Token(_) => {}
                    }
                }
                let name = name.ok_or_else(|| Error::syntax("", 0))?;
                let name = Node::Expr(
                    self.transform(name)?
                        .ok_or_else(|| Error::syntax("", 0))?,
                );
                let children = match dtype {
                    Some(dtype) => {
                        let dtype = self
                            .transform(dtype)?
                            .ok_or_else(|| Error::syntax("", 0))?;
                        subscribe(name, vec![Node::Expr(dtype)])
                    }
                    None => vec![name],
                };
                Ok(Some(Expression::new(rule, children)))
            }
            "callable" => {
                let mut children = self.transform_children(expr.children)?;
                let head = children.remove(0);
                let mut out = vec![head, Node::Token(Token::syntax("["))];
                let mut first = true;
                for child in children {
                    if !first {
                        out.push(Node::Token(Token::syntax(", ")));
                    }
                    first = false;
                    out.push(child);
                }
                out.push(Node::Token(Token::syntax("]")));
                Ok(Some(Expression::new(rule, out)))
            }
            "callable_params" => {
                let children = self.transform_children(expr.children)?;
                let mut out = vec![Node::Token(Token::syntax("["))];
                out.extend(intersperse(children, || Node::Token(Token::syntax(", "))));
                out.push(Node::Token(Token::syntax("]")));
                Ok(Some(Expression::new(rule, out)))
            }
            "shape" => {
                debug!("dropping shape information");
                Ok(None)
            }
            "optional" => {
                debug!("dropping optional / default info");
                self.optional = true;
                Ok(None)
            }
            "extra_info" => {
                debug!("dropping extra info");
                Ok(None)
            }
            _ => {
                let children = self.transform_children(expr.children)?;
                Ok(Some(Expression::new(rule, children)))
            }
        }
    }

    fn transform_children(&mut self, children: Vec<Node>) -> Result<Vec<Node>> {
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Node::Expr(expr) => {
                    if let Some(expr) = self.transform(expr)? {
                        out.push(Node::Expr(expr));
                    }
                }
                Node::Token(token) => out.push(Node::Token(token)),
            }
        }
        Ok(out)
    }

    fn transform_qualname(&mut self, expr: Expression) -> Result<Expression> {
        let mut text = String::new();
        let mut start = None;
        let mut end = None;
        let mut seen_segment = false;
        for child in &expr.children {
            if let Node::Token(token) = child {
                match token.kind {
                    TokenKind::Syntax => text.push_str(&token.text),
                    _ => {
                        if seen_segment {
                            text.push('.');
                        }
                        text.push_str(&token.text);
                        seen_segment = true;
                    }
                }
                if let Some((s, e)) = token.span {
                    start.get_or_insert(s);
                    end = Some(e);
                }
            }
        }

        if BLACKLISTED_QUALNAMES.contains(&text.as_str()) {
            return Err(Error::BlacklistedQualname(text));
        }

        let span = start.zip(end);
        Ok(Expression::new(
            "qualname",
            vec![Node::Token(Token::name(text, span))],
        ))
    }
}

/// Formats a head plus content into subscription form `head[a, b, ...]`.
fn subscribe(head: Node, content: Vec<Node>) -> Vec<Node> {
    let mut out = vec![head, Node::Token(Token::syntax("["))];
    out.extend(intersperse(content, || Node::Token(Token::syntax(", "))));
    out.push(Node::Token(Token::syntax("]")));
    out
}

fn intersperse(items: Vec<Node>, sep: impl Fn() -> Node) -> Vec<Node> {
    let mut out = Vec::with_capacity(items.len() * 2);
    for item in items {
        if !out.is_empty() {
            out.push(sep());
        }
        out.push(item);
    }
    out
}

fn code_of(node: &Node) -> String {
    match node {
        Node::Expr(expr) => expr.as_code(),
        Node::Token(token) => token.text.clone(),
    }
}
