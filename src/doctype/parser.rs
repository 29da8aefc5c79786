//! Recursive descent parser producing the raw doctype parse tree.
//!
//! The parser builds rule-tagged [`Expression`] nodes that still contain
//! the surface structure (shape subtrees, optional/extra-info suffixes,
//! role wrappers); normalization into annotation form happens in the
//! transformer in `mod.rs`.

use super::token::{Lexeme, Tok};
use super::{Expression, Node, Token, ARRAY_NAMES};
use crate::error::{Error, Result};

pub(super) struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Lexeme>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(source: &'a str, tokens: Vec<Lexeme>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    /// Parses the whole doctype: an annotation followed by optional
    /// comma-separated suffix segments.
    pub(super) fn parse(mut self) -> Result<Expression> {
        let annotation = self.parse_union()?;
        let mut children = vec![Node::Expr(annotation)];
        while self.peek_tok() == Some(Tok::Comma) {
            self.advance();
            children.push(Node::Expr(self.parse_suffix()?));
        }
        if self.pos < self.tokens.len() {
            return Err(self.err_here());
        }
        Ok(Expression::new("doctype", children))
    }

    // -- token plumbing ---------------------------------------------------

    fn peek(&self) -> Option<&Lexeme> {
        self.tokens.get(self.pos)
    }

    fn peek_tok(&self) -> Option<Tok> {
        self.peek().map(|l| l.tok)
    }

    fn peek_at(&self, offset: usize) -> Option<&Lexeme> {
        self.tokens.get(self.pos + offset)
    }

    fn text(&self, lexeme: &Lexeme) -> &'a str {
        &self.source[lexeme.start..lexeme.end]
    }

    fn peek_text(&self) -> Option<&'a str> {
        self.peek().map(|l| &self.source[l.start..l.end])
    }

    fn advance(&mut self) -> Option<Lexeme> {
        let lexeme = self.tokens.get(self.pos).copied();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    fn expect(&mut self, tok: Tok) -> Result<Lexeme> {
        match self.peek() {
            Some(l) if l.tok == tok => Ok(self.advance().unwrap()),
            _ => Err(self.err_here()),
        }
    }

    fn err_here(&self) -> Error {
        match self.peek() {
            Some(l) => Error::syntax(self.text(l), l.start),
            None => Error::syntax("", self.source.len()),
        }
    }

    fn name_token(&self, lexeme: Lexeme) -> Node {
        Node::Token(Token::name(
            self.text(&lexeme),
            Some((lexeme.start, lexeme.end)),
        ))
    }

    fn literal_token(&self, lexeme: Lexeme) -> Node {
        Node::Token(Token::literal(
            self.text(&lexeme),
            Some((lexeme.start, lexeme.end)),
        ))
    }

    fn syntax_token(&self, lexeme: Lexeme) -> Node {
        Node::Token(Token {
            kind: super::TokenKind::Syntax,
            text: self.text(&lexeme).to_string(),
            span: Some((lexeme.start, lexeme.end)),
        })
    }

    // -- grammar rules ----------------------------------------------------

    /// One suffix segment after a top-level comma: the literal word
    /// `optional`, or free extra info that is dropped later. An empty
    /// segment is a syntax error.
    fn parse_suffix(&mut self) -> Result<Expression> {
        match self.peek_tok() {
            None | Some(Tok::Comma) => Err(self.err_here()),
            Some(Tok::Name)
                if self.peek_text() == Some("optional")
                    && matches!(self.peek_at(1).map(|l| l.tok), None | Some(Tok::Comma)) =>
            {
                let lexeme = self.advance().unwrap();
                Ok(Expression::new(
                    "optional",
                    vec![self.syntax_token(lexeme)],
                ))
            }
            _ => {
                let mut children = Vec::new();
                while !matches!(self.peek_tok(), None | Some(Tok::Comma)) {
                    let lexeme = self.advance().unwrap();
                    children.push(self.syntax_token(lexeme));
                }
                Ok(Expression::new("extra_info", children))
            }
        }
    }

    /// A flat union: atoms joined by `or` / `|`.
    fn parse_union(&mut self) -> Result<Expression> {
        let mut items = vec![self.parse_atom()?];
        loop {
            match self.peek_tok() {
                Some(Tok::Pipe) => {
                    self.advance();
                }
                Some(Tok::Name) if self.peek_text() == Some("or") => {
                    self.advance();
                }
                _ => break,
            }
            items.push(self.parse_atom()?);
        }
        if items.len() == 1 {
            Ok(items.pop().unwrap())
        } else {
            Ok(Expression::new(
                "union",
                items.into_iter().map(Node::Expr).collect(),
            ))
        }
    }

    fn parse_atom(&mut self) -> Result<Expression> {
        match self.peek_tok() {
            Some(Tok::LBrace) => self.parse_natlang_literal(),
            Some(Tok::LParen) => self.parse_array_from_group(),
            Some(Tok::Int) => {
                let shape = self.parse_nd_shape()?;
                self.parse_after_shape(shape)
            }
            Some(Tok::Backtick) | Some(Tok::Colon) => {
                let role = self.parse_rst_role()?;
                if self.peek_tok() == Some(Tok::LBracket) {
                    self.parse_subscription(role)
                } else {
                    Ok(role)
                }
            }
            Some(Tok::Name) | Some(Tok::Tilde) => {
                let qualname = self.parse_qualname()?;
                self.parse_qualname_followers(qualname)
            }
            _ => Err(self.err_here()),
        }
    }

    /// A dotted name, optionally abbreviated with a leading `~.` and
    /// optionally carrying a directly adjacent plural `(s)` suffix.
    fn parse_qualname(&mut self) -> Result<Expression> {
        let mut children = Vec::new();
        if self.peek_tok() == Some(Tok::Tilde) {
            let tilde = self.advance().unwrap();
            let dot = self.expect(Tok::Dot)?;
            children.push(Node::Token(Token {
                kind: super::TokenKind::Syntax,
                text: "~.".to_string(),
                span: Some((tilde.start, dot.end)),
            }));
        }
        let mut last_end;
        let first = self.expect(Tok::Name)?;
        last_end = first.end;
        children.push(self.name_token(first));
        while self.peek_tok() == Some(Tok::Dot) {
            self.advance();
            let segment = self.expect(Tok::Name)?;
            last_end = segment.end;
            children.push(self.name_token(segment));
        }

        // Plural suffix `(s)` is only valid when directly adjacent.
        if self.peek_tok() == Some(Tok::LParen)
            && self.peek().map(|l| l.start) == Some(last_end)
            && self.peek_at(1).map(|l| (l.tok, self.text(l))) == Some((Tok::Name, "s"))
            && self.peek_at(2).map(|l| l.tok) == Some(Tok::RParen)
        {
            self.advance();
            self.advance();
            self.advance();
        }

        Ok(Expression::new("qualname", children))
    }

    fn parse_qualname_followers(&mut self, qualname: Expression) -> Result<Expression> {
        match self.peek_tok() {
            Some(Tok::LBracket) => self.parse_subscription(qualname),
            Some(Tok::Name) if self.peek_text() == Some("of") => {
                self.advance();
                if is_array_name(&qualname)
                    && matches!(self.peek_text(), Some("shape") | Some("dtype"))
                {
                    self.parse_array_of_clauses(qualname)
                } else {
                    self.parse_natlang_container(qualname)
                }
            }
            Some(Tok::Name) if ARRAY_NAMES.contains(&self.peek_text().unwrap_or("")) => {
                // `{dtype} {name}` phrasing, e.g. `int array`
                let name = self.parse_qualname()?;
                Ok(Expression::new(
                    "natlang_array",
                    vec![Node::Expr(name), Node::Expr(qualname)],
                ))
            }
            _ => Ok(qualname),
        }
    }

    /// Bracketed subscription arguments, including the callable and
    /// literal special forms.
    fn parse_subscription(&mut self, head: Expression) -> Result<Expression> {
        self.expect(Tok::LBracket)?;

        if self.peek_tok() == Some(Tok::LBracket) {
            // Callable with a bracketed parameter list: exactly two
            // subscription arguments, no `...` inside the list.
            self.advance();
            let mut params = Vec::new();
            if self.peek_tok() != Some(Tok::RBracket) {
                loop {
                    params.push(Node::Expr(self.parse_union()?));
                    if self.peek_tok() == Some(Tok::Comma) {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect(Tok::RBracket)?;
            self.expect(Tok::Comma)?;
            let ret = self.parse_union()?;
            self.expect(Tok::RBracket)?;
            return Ok(Expression::new(
                "callable",
                vec![
                    Node::Expr(head),
                    Node::Expr(Expression::new("callable_params", params)),
                    Node::Expr(ret),
                ],
            ));
        }

        if self.peek_tok() == Some(Tok::Ellipsis) {
            let ellipsis = self.advance().unwrap();
            let ellipsis = self.syntax_token(ellipsis);
            match self.peek_tok() {
                Some(Tok::RBracket) => {
                    self.advance();
                    return Ok(Expression::new(
                        "callable",
                        vec![Node::Expr(head), ellipsis],
                    ));
                }
                Some(Tok::Comma) => {
                    self.advance();
                    let ret = self.parse_union()?;
                    self.expect(Tok::RBracket)?;
                    return Ok(Expression::new(
                        "callable",
                        vec![Node::Expr(head), ellipsis, Node::Expr(ret)],
                    ));
                }
                _ => return Err(self.err_here()),
            }
        }

        if qualname_is_literal(&head) {
            let mut children = vec![Node::Expr(head)];
            loop {
                children.push(self.parse_literal_value()?);
                if self.peek_tok() == Some(Tok::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Tok::RBracket)?;
            return Ok(Expression::new("literal", children));
        }

        let mut children = vec![Node::Expr(head)];
        loop {
            if self.peek_tok() == Some(Tok::Ellipsis) {
                let ellipsis = self.advance().unwrap();
                children.push(self.syntax_token(ellipsis));
            } else {
                children.push(Node::Expr(self.parse_union()?));
            }
            if self.peek_tok() == Some(Tok::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(Tok::RBracket)?;
        Ok(Expression::new("subscription", children))
    }

    /// A natural language literal set `{1, "a", None}`.
    fn parse_natlang_literal(&mut self) -> Result<Expression> {
        self.expect(Tok::LBrace)?;
        let mut children = vec![self.parse_literal_value()?];
        while self.peek_tok() == Some(Tok::Comma) {
            self.advance();
            children.push(self.parse_literal_value()?);
        }
        self.expect(Tok::RBrace)?;
        Ok(Expression::new("natlang_literal", children))
    }

    fn parse_literal_value(&mut self) -> Result<Node> {
        match self.peek_tok() {
            Some(Tok::Minus) => {
                let minus = self.advance().unwrap();
                match self.peek_tok() {
                    Some(Tok::Int) | Some(Tok::Float) => {
                        let value = self.advance().unwrap();
                        Ok(Node::Token(Token::literal(
                            format!("-{}", self.text(&value)),
                            Some((minus.start, value.end)),
                        )))
                    }
                    _ => Err(self.err_here()),
                }
            }
            Some(Tok::Int) | Some(Tok::Float) | Some(Tok::Str) => {
                let value = self.advance().unwrap();
                Ok(self.literal_token(value))
            }
            Some(Tok::Name) if matches!(self.peek_text(), Some("True" | "False" | "None")) => {
                let value = self.advance().unwrap();
                Ok(self.literal_token(value))
            }
            Some(Tok::Name) => Ok(Node::Expr(self.parse_qualname()?)),
            Some(Tok::Backtick) | Some(Tok::Colon) => Ok(Node::Expr(self.parse_rst_role()?)),
            _ => Err(self.err_here()),
        }
    }

    /// Natural language container content after `of`.
    fn parse_natlang_container(&mut self, head: Expression) -> Result<Expression> {
        let mut children = vec![Node::Expr(head)];
        match self.peek_tok() {
            Some(Tok::LParen) => {
                self.advance();
                children.push(Node::Expr(self.parse_union()?));
                while self.peek_tok() == Some(Tok::Comma) {
                    self.advance();
                    if self.peek_tok() == Some(Tok::Ellipsis) {
                        let ellipsis = self.advance().unwrap();
                        children.push(self.syntax_token(ellipsis));
                        break;
                    }
                    children.push(Node::Expr(self.parse_union()?));
                }
                self.expect(Tok::RParen)?;
            }
            Some(Tok::LBrace) => {
                self.advance();
                children.push(Node::Expr(self.parse_union()?));
                self.expect(Tok::Colon)?;
                children.push(Node::Expr(self.parse_union()?));
                self.expect(Tok::RBrace)?;
            }
            _ => children.push(Node::Expr(self.parse_atom()?)),
        }
        Ok(Expression::new("natlang_container", children))
    }

    /// A reStructuredText cross-reference: `` `X` `` or
    /// `` :py:class:`X` ``.
    fn parse_rst_role(&mut self) -> Result<Expression> {
        let mut children = Vec::new();
        while self.peek_tok() == Some(Tok::Colon) {
            self.advance();
            match self.peek_tok() {
                Some(Tok::Name) => {
                    let role = self.advance().unwrap();
                    children.push(self.syntax_token(role));
                }
                _ => break,
            }
        }
        self.expect(Tok::Backtick)?;
        children.push(Node::Expr(self.parse_qualname()?));
        self.expect(Tok::Backtick)?;
        Ok(Expression::new("rst_role", children))
    }

    // -- array phrasing ---------------------------------------------------

    /// An atom starting with `(`: either a parenthesized dtype or a shape,
    /// both of which must continue as array phrasing.
    fn parse_array_from_group(&mut self) -> Result<Expression> {
        if let Some(dtype) = self.try_parse_paren_union() {
            let name = self.parse_array_name()?;
            return Ok(Expression::new(
                "natlang_array",
                vec![Node::Expr(name), Node::Expr(dtype)],
            ));
        }
        self.expect(Tok::LParen)?;
        let shape = self.parse_paren_shape()?;
        self.parse_after_shape(shape)
    }

    /// Attempts `( union )`; restores the position on failure.
    fn try_parse_paren_union(&mut self) -> Option<Expression> {
        let start = self.pos;
        if self.peek_tok() != Some(Tok::LParen) {
            return None;
        }
        self.advance();
        match self.parse_union() {
            Ok(expr) if self.peek_tok() == Some(Tok::RParen) => {
                self.advance();
                Some(expr)
            }
            _ => {
                self.pos = start;
                None
            }
        }
    }

    /// Shape tokens inside parentheses, the opening one already consumed.
    /// Entries are non-negative integers, dimension names, `...` and
    /// optional-dimension brackets; anything else is a syntax error.
    fn parse_paren_shape(&mut self) -> Result<Expression> {
        let mut children = Vec::new();
        loop {
            match self.peek_tok() {
                Some(Tok::RParen) => {
                    self.advance();
                    break;
                }
                Some(
                    Tok::Int
                    | Tok::Name
                    | Tok::Ellipsis
                    | Tok::Comma
                    | Tok::LBracket
                    | Tok::RBracket,
                ) => {
                    let lexeme = self.advance().unwrap();
                    children.push(self.syntax_token(lexeme));
                }
                _ => return Err(self.err_here()),
            }
        }
        Ok(Expression::new("shape", children))
    }

    /// A dimensionality shape such as `3D` or `2-D`.
    fn parse_nd_shape(&mut self) -> Result<Expression> {
        let mut children = Vec::new();
        let dims = self.expect(Tok::Int)?;
        children.push(self.syntax_token(dims));
        if self.peek_tok() == Some(Tok::Minus) {
            let minus = self.advance().unwrap();
            children.push(self.syntax_token(minus));
        }
        match self.peek() {
            Some(l) if l.tok == Tok::Name && self.text(l).eq_ignore_ascii_case("d") => {
                let d = self.advance().unwrap();
                children.push(self.syntax_token(d));
            }
            _ => return Err(self.err_here()),
        }
        Ok(Expression::new("shape", children))
    }

    /// Continues array phrasing after a leading shape:
    /// `{shape} {name}`, `{shape} {name} of {dtype}` or
    /// `{shape} {dtype} {name}`.
    fn parse_after_shape(&mut self, shape: Expression) -> Result<Expression> {
        match self.peek_tok() {
            Some(Tok::LParen) => {
                let dtype = self.try_parse_paren_union().ok_or_else(|| self.err_here())?;
                let name = self.parse_array_name()?;
                Ok(Expression::new(
                    "natlang_array",
                    vec![Node::Expr(name), Node::Expr(dtype), Node::Expr(shape)],
                ))
            }
            Some(Tok::Name) => {
                let qualname = self.parse_qualname()?;
                if is_array_name(&qualname) {
                    if self.peek_text() == Some("of") {
                        self.advance();
                        let dtype = self.parse_array_dtype()?;
                        Ok(Expression::new(
                            "natlang_array",
                            vec![Node::Expr(qualname), Node::Expr(dtype), Node::Expr(shape)],
                        ))
                    } else {
                        Ok(Expression::new(
                            "natlang_array",
                            vec![Node::Expr(qualname), Node::Expr(shape)],
                        ))
                    }
                } else {
                    let name = self.parse_array_name()?;
                    Ok(Expression::new(
                        "natlang_array",
                        vec![Node::Expr(name), Node::Expr(qualname), Node::Expr(shape)],
                    ))
                }
            }
            _ => Err(self.err_here()),
        }
    }

    /// `of shape X [and dtype Y]` clauses in either order.
    fn parse_array_of_clauses(&mut self, head: Expression) -> Result<Expression> {
        let mut dtype = None;
        let mut shape = None;
        loop {
            match self.peek_text() {
                Some("shape") => {
                    self.advance();
                    shape = Some(self.parse_shape_clause()?);
                }
                Some("dtype") => {
                    self.advance();
                    dtype = Some(self.parse_array_dtype()?);
                }
                _ => return Err(self.err_here()),
            }
            if self.peek_text() == Some("and") {
                self.advance();
            } else {
                break;
            }
        }
        let mut children = vec![Node::Expr(head)];
        children.extend(dtype.map(Node::Expr));
        children.extend(shape.map(Node::Expr));
        Ok(Expression::new("natlang_array", children))
    }

    fn parse_shape_clause(&mut self) -> Result<Expression> {
        match self.peek_tok() {
            Some(Tok::LParen) => {
                self.advance();
                self.parse_paren_shape()
            }
            Some(Tok::Int) => self.parse_nd_shape(),
            _ => Err(self.err_here()),
        }
    }

    fn parse_array_dtype(&mut self) -> Result<Expression> {
        match self.peek_tok() {
            Some(Tok::LParen) => self.try_parse_paren_union().ok_or_else(|| self.err_here()),
            _ => self.parse_qualname(),
        }
    }

    fn parse_array_name(&mut self) -> Result<Expression> {
        let start = self.pos;
        let qualname = self.parse_qualname()?;
        if is_array_name(&qualname) {
            Ok(qualname)
        } else {
            self.pos = start;
            Err(self.err_here())
        }
    }
}

/// Whether a raw qualname expression is a bare array container name.
fn is_array_name(qualname: &Expression) -> bool {
    if qualname.children.len() != 1 {
        return false;
    }
    match &qualname.children[0] {
        Node::Token(token) => ARRAY_NAMES.contains(&token.text.as_str()),
        Node::Expr(_) => false,
    }
}

/// Whether a subscription head is a `Literal`-style qualname, whose
/// arguments are literal values rather than types.
fn qualname_is_literal(head: &Expression) -> bool {
    if head.rule != "qualname" {
        return false;
    }
    match head.children.last() {
        Some(Node::Token(token)) => token.text.ends_with("Literal"),
        _ => false,
    }
}
