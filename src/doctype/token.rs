use logos::Logos;

use crate::error::{Error, Result};

/// Lexical tokens of the doctype grammar.
///
/// Natural-language keywords (`or`, `of`, `and`, `optional`, `default`,
/// `shape`, `dtype`) are ordinary [`Tok::Name`] tokens; the parser decides
/// their meaning from context so that they stay usable as type names.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Tok {
    /// An identifier fragment, including hyphenated array names
    /// such as `array-like`.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(-like)?")]
    Name,

    /// A non-negative integer literal.
    #[regex(r"[0-9]+")]
    Int,

    /// A floating point literal, trailing digits optional (`-2.` is a
    /// minus token followed by `2.`).
    #[regex(r"[0-9]+\.[0-9]*")]
    Float,

    /// A quoted string literal, either quote style.
    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Str,

    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(":")]
    Colon,
    #[token("`")]
    Backtick,
    #[token("~")]
    Tilde,
    #[token("-")]
    Minus,
    #[token("=")]
    Eq,
}

/// One lexed token with its byte span in the doctype string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub tok: Tok,
    pub start: usize,
    pub end: usize,
}

/// Lexes a doctype string into a token sequence.
///
/// Unlexable characters produce a [`Error::DoctypeSyntax`] carrying the
/// offending substring and its byte position.
pub fn lex(source: &str) -> Result<Vec<Lexeme>> {
    let mut tokens = Vec::new();
    let mut lexer = Tok::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(tok) => tokens.push(Lexeme {
                tok,
                start: span.start,
                end: span.end,
            }),
            Err(()) => {
                return Err(Error::syntax(&source[span.start..span.end], span.start));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        lex(source).unwrap().iter().map(|l| l.tok).collect()
    }

    #[test]
    fn lex_conventional_subscription() {
        assert_eq!(
            kinds("list[int]"),
            vec![Tok::Name, Tok::LBracket, Tok::Name, Tok::RBracket]
        );
    }

    #[test]
    fn lex_ellipsis_vs_dot() {
        assert_eq!(
            kinds("tuple[int, ...]"),
            vec![
                Tok::Name,
                Tok::LBracket,
                Tok::Name,
                Tok::Comma,
                Tok::Ellipsis,
                Tok::RBracket,
            ]
        );
        assert_eq!(kinds("a.b"), vec![Tok::Name, Tok::Dot, Tok::Name]);
    }

    #[test]
    fn lex_hyphenated_array_name() {
        assert_eq!(kinds("array-like"), vec![Tok::Name]);
        // A hyphen elsewhere stays a minus token.
        assert_eq!(kinds("2-D"), vec![Tok::Int, Tok::Minus, Tok::Name]);
    }

    #[test]
    fn lex_literals() {
        assert_eq!(
            kinds(r#"{-1, 2., 'a', "bar"}"#),
            vec![
                Tok::LBrace,
                Tok::Minus,
                Tok::Int,
                Tok::Comma,
                Tok::Float,
                Tok::Comma,
                Tok::Str,
                Tok::Comma,
                Tok::Str,
                Tok::RBrace,
            ]
        );
    }

    #[test]
    fn lex_rst_role() {
        assert_eq!(
            kinds(":py:class:`Generator`"),
            vec![
                Tok::Colon,
                Tok::Name,
                Tok::Colon,
                Tok::Name,
                Tok::Colon,
                Tok::Backtick,
                Tok::Name,
                Tok::Backtick,
            ]
        );
    }

    #[test]
    fn lex_rejects_unknown_characters() {
        assert!(lex("int; float").is_err());
    }

    #[test]
    fn lex_spans() {
        let lexemes = lex("a.b of c").unwrap();
        assert_eq!(lexemes[0].start, 0);
        assert_eq!(lexemes[0].end, 1);
        assert_eq!(lexemes[4].start, 7);
        assert_eq!(lexemes[4].end, 8);
    }
}
