#![warn(missing_docs)]
//! benchprobe Scan - Declaration Scanner
//!
//! Finds the fully-qualified name of the class declared in a PHP source file
//! using a lightweight streaming token scan, not a parser. Only as much of
//! the file as needed to see the class header is read.

mod lexer;
mod scanner;

pub use lexer::{Token, find_open_tag, tokenize};
pub use scanner::{
    CHUNK_SIZE, DeclarationScanner, NAMESPACE_SEPARATOR, QualifiedName, find_declaration,
};
