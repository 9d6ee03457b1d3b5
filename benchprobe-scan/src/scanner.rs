//! Declaration Scanner
//!
//! Locates the fully-qualified name of the first class declared in a PHP
//! source file without reading more of the file than needed.
//!
//! The file is read in [`CHUNK_SIZE`] chunks into a growing buffer. Until the
//! buffer holds a `{` no class body can have started, so nothing is lexed.
//! After that, every chunk re-lexes the whole buffer and runs a small state
//! machine over the tokens:
//!
//! ```text
//!            namespace                  ident        ident / `\`
//! Seeking ─────────────▶ NamespaceStart ─────▶ Namespace ◀───────┐
//!    ▲ ▲                  │ `\` or `{`              │  └──────────┘
//!    │ └──────────────────┴──── `{` or `;` ─────────┘
//!    │
//!    │   class (not after `::`)          ident
//!    ├────────────────────────▶ AfterClass ─────▶ Named ── `{` ──▶ found
//!    └──────── anything else ◀──────┘
//! ```
//!
//! Lexing starts at the first open tag; inline HTML never counts. A
//! `namespace` directly followed by `\` is a relative name (`namespace\f()`),
//! not a declaration.
//!
//! Only the `class` keyword is recognized. A file that declares nothing but
//! an interface, trait or enum yields no name.

use crate::lexer::{Token, find_open_tag, tokenize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes read from the source per step
pub const CHUNK_SIZE: usize = 512;

/// PHP namespace separator
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Fully-qualified class name, e.g. `Acme\Bench\HashBench`.
///
/// Never carries a leading separator; a class declared outside any
/// namespace is its bare identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    full: String,
}

impl QualifiedName {
    /// Join namespace segments and a class name
    pub fn new(namespace: &[&str], name: &str) -> Self {
        let mut full = String::new();
        for segment in namespace {
            full.push_str(segment);
            full.push(NAMESPACE_SEPARATOR);
        }
        full.push_str(name);
        Self { full }
    }

    /// The full name
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Namespace part, if the class is namespaced
    pub fn namespace(&self) -> Option<&str> {
        self.full
            .rfind(NAMESPACE_SEPARATOR)
            .map(|index| &self.full[..index])
    }

    /// Class name without its namespace
    pub fn short_name(&self) -> &str {
        match self.full.rfind(NAMESPACE_SEPARATOR) {
            Some(index) => &self.full[index + 1..],
            None => &self.full,
        }
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.full
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl AsRef<str> for QualifiedName {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanState<'src> {
    Seeking,
    NamespaceStart,
    Namespace,
    AfterClass,
    Named(&'src str),
}

/// Find the first class declaration in a (possibly truncated) source text.
///
/// A declaration counts once its name is followed by the opening brace of
/// its body, so a buffer cut off in the middle of the class header yields
/// `None` rather than a partial name.
pub fn find_declaration(source: &str) -> Option<QualifiedName> {
    let code = &source[find_open_tag(source)?..];
    let mut namespace: Vec<&str> = Vec::new();
    let mut state = ScanState::Seeking;
    let mut previous: Option<Token<'_>> = None;

    for token in tokenize(code) {
        state = match (state, token) {
            (ScanState::Seeking, Token::Namespace) => ScanState::NamespaceStart,
            (ScanState::Seeking, Token::Class) if previous != Some(Token::DoubleColon) => {
                ScanState::AfterClass
            }
            (ScanState::Seeking, _) => ScanState::Seeking,

            (ScanState::NamespaceStart, Token::Ident(segment)) => {
                namespace.clear();
                namespace.push(segment);
                ScanState::Namespace
            }
            // Unnamed `namespace { ... }` block
            (ScanState::NamespaceStart, Token::OpenBrace) => {
                namespace.clear();
                ScanState::Seeking
            }
            (ScanState::NamespaceStart, _) => ScanState::Seeking,

            (ScanState::Namespace, Token::Ident(segment)) => {
                namespace.push(segment);
                ScanState::Namespace
            }
            (ScanState::Namespace, Token::OpenBrace | Token::Semicolon) => ScanState::Seeking,
            (ScanState::Namespace, _) => ScanState::Namespace,

            (ScanState::AfterClass, Token::Ident(name)) => ScanState::Named(name),
            // Anonymous class: `new class {`, `new class(...)`, `new class extends ...`
            (ScanState::AfterClass, _) => ScanState::Seeking,

            (ScanState::Named(name), Token::OpenBrace) => {
                return Some(QualifiedName::new(&namespace, name));
            }
            (ScanState::Named(_), Token::Semicolon) => ScanState::Seeking,
            (named @ ScanState::Named(_), _) => named,
        };
        previous = Some(token);
    }

    None
}

/// Incremental scanner over a byte source
#[derive(Debug, Clone)]
pub struct DeclarationScanner {
    chunk_size: usize,
}

impl DeclarationScanner {
    /// Scanner reading [`CHUNK_SIZE`] bytes at a time
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Scanner with a custom chunk size (at least one byte)
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Open `path` and scan it.
    ///
    /// An unreadable path is an `Err`; a readable file without a class
    /// declaration is `Ok(None)`.
    pub fn scan_path(&self, path: impl AsRef<Path>) -> io::Result<Option<QualifiedName>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let found = self.scan(file)?;
        match &found {
            Some(name) => tracing::debug!(path = %path.display(), class = %name, "found class declaration"),
            None => tracing::debug!(path = %path.display(), "no class declaration"),
        }
        Ok(found)
    }

    /// Scan a reader until a declaration is found or the input ends
    pub fn scan<R: Read>(&self, mut reader: R) -> io::Result<Option<QualifiedName>> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];

        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            buffer.extend_from_slice(&chunk[..read]);

            if !buffer.contains(&b'{') {
                continue;
            }

            // A chunk may end inside a multi-byte character; the lossy tail
            // is re-read correctly on the next pass.
            let source = String::from_utf8_lossy(&buffer);
            tracing::trace!(bytes = buffer.len(), "lexing buffered source");
            if let Some(name) = find_declaration(&source) {
                return Ok(Some(name));
            }
        }
    }
}

impl Default for DeclarationScanner {
    fn default() -> Self {
        Self::new()
    }
}
