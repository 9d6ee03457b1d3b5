//! PHP Token Lexer
//!
//! A deliberately small logos lexer: it only distinguishes the tokens the
//! declaration scanner needs to tell a real `class` declaration apart from
//! `class` appearing in comments, strings, `Foo::class` or `new class`.
//! Everything it does not recognize is dropped.

use logos::Logos;

/// Token produced by [`tokenize`].
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'src> {
    /// Whitespace (skipped)
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    /// Open tags (skipped)
    #[token("<?php", logos::skip)]
    #[token("<?=", logos::skip)]
    OpenTag,

    /// Close tag and the inline HTML up to the next open tag (skipped)
    #[token("?>", lex_inline_html)]
    CloseTag,

    /// Line comments (skipped)
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"#[^\[\n][^\n]*", logos::skip)]
    #[token("#", logos::skip)]
    LineComment,

    /// Block and doc comments (skipped)
    #[token("/*", lex_block_comment)]
    BlockComment,

    /// `namespace`
    #[token("namespace", ignore(ascii_case))]
    Namespace,

    /// `class`
    #[token("class", ignore(ascii_case))]
    Class,

    /// `extends`
    #[token("extends", ignore(ascii_case))]
    Extends,

    /// `implements`
    #[token("implements", ignore(ascii_case))]
    Implements,

    /// Bare identifier (class, namespace segment, function name, ...).
    /// Bytes from 0x80 up are identifier characters in PHP.
    #[regex(r"[a-zA-Z_\u{80}-\u{10FFFF}][a-zA-Z0-9_\u{80}-\u{10FFFF}]*", |lex| lex.slice())]
    Ident(&'src str),

    /// `$name`
    #[regex(r"\$[a-zA-Z_\u{80}-\u{10FFFF}][a-zA-Z0-9_\u{80}-\u{10FFFF}]*")]
    Variable,

    /// Single or double quoted string literal
    #[regex(r#"'([^'\\]|\\(.|\n))*'"#)]
    #[regex(r#""([^"\\]|\\(.|\n))*""#)]
    Str,

    /// Heredoc or nowdoc, header through closing label
    #[token("<<<", lex_heredoc)]
    Heredoc,

    /// Numeric literal
    #[regex(r"[0-9][0-9a-zA-Z_.]*")]
    Number,

    /// `#[`
    #[token("#[")]
    AttributeOpen,

    /// `\`
    #[token("\\")]
    Backslash,

    /// `::`
    #[token("::")]
    DoubleColon,

    /// `{`
    #[token("{")]
    OpenBrace,

    /// `}`
    #[token("}")]
    CloseBrace,

    /// `;`
    #[token(";")]
    Semicolon,

    /// `(`
    #[token("(")]
    OpenParen,

    /// Any other single punctuation character
    #[regex(r"[-+*/%=<>!&|^~?:.@,)\[\]]")]
    Punct,
}

fn lex_block_comment<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> logos::Skip {
    // "/*" is consumed; doc comments included
    let remainder = lex.remainder();

    if let Some(end) = remainder.find("*/") {
        lex.bump(end + 2);
    } else {
        // Unterminated: the rest of the buffer is comment
        lex.bump(remainder.len());
    }

    logos::Skip
}

fn lex_inline_html<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> logos::Skip {
    // "?>" is consumed; the next open tag is lexed normally
    let remainder = lex.remainder();
    lex.bump(find_open_tag(remainder).unwrap_or(remainder.len()));
    logos::Skip
}

fn lex_heredoc<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> bool {
    // "<<<" is consumed; the header runs to the end of the line
    let remainder = lex.remainder();
    let Some(header_end) = remainder.find('\n') else {
        return false;
    };
    let label = remainder[..header_end]
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'');
    if !label.starts_with(is_label_start) || !label.chars().all(is_label_char) {
        return false;
    }

    // The closing label may be indented and followed by anything but a label character
    let mut offset = header_end + 1;
    for line in remainder[offset..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        let body = &line[indent..];
        if body.starts_with(label) && !body[label.len()..].starts_with(is_label_char) {
            lex.bump(offset + indent + label.len());
            return true;
        }
        offset += line.len();
    }

    // Unterminated: the rest of the buffer is string body
    lex.bump(remainder.len());
    true
}

fn is_label_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_label_char(c: char) -> bool {
    is_label_start(c) || c.is_ascii_digit()
}

/// Offset of the first `<?php` or `<?=` open tag in `source`
pub fn find_open_tag(source: &str) -> Option<usize> {
    source.match_indices("<?").map(|(i, _)| i).find(|&i| {
        let rest = &source.as_bytes()[i + 2..];
        rest.starts_with(b"=") || rest.get(..3).is_some_and(|tag| tag.eq_ignore_ascii_case(b"php"))
    })
}

/// Lex `source`, skipping trivia and unrecognized input.
pub fn tokenize(source: &str) -> impl Iterator<Item = Token<'_>> + '_ {
    Token::lexer(source).filter_map(Result::ok)
}
