//! PHP literal encoding for template context values.
//!
//! Rendering substitutes context values verbatim, so anything placed inside
//! PHP code has to be a valid PHP expression already. These helpers produce
//! the same single-quoted form as PHP's `var_export`.

use std::path::Path;

/// Single-quoted PHP string literal
pub fn export_string(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            literal.push('\\');
        }
        literal.push(c);
    }
    literal.push('\'');
    literal
}

/// PHP list literal of strings, order preserved
pub fn export_list<S: AsRef<str>>(values: &[S]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|value| export_string(value.as_ref()))
        .collect();
    format!("[{}]", items.join(", "))
}

/// Path as a PHP string literal
pub fn export_path(path: &Path) -> String {
    export_string(&path.to_string_lossy())
}

/// Optional path as a PHP string literal or `null`
pub fn export_optional_path(path: Option<&Path>) -> String {
    match path {
        Some(path) => export_path(path),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_string_escapes_quotes_and_backslashes() {
        assert_eq!(export_string("Acme\\Bench"), r"'Acme\\Bench'");
        assert_eq!(export_string("it's"), r"'it\'s'");
        assert_eq!(export_string(""), "''");
    }

    #[test]
    fn test_export_string_keeps_dollar_signs() {
        assert_eq!(export_string("$x {$y}"), "'$x {$y}'");
    }

    #[test]
    fn test_export_list_preserves_order() {
        assert_eq!(
            export_list(&["provideB", "provideA"]),
            "['provideB', 'provideA']"
        );
        assert_eq!(export_list::<&str>(&[]), "[]");
    }

    #[test]
    fn test_export_optional_path() {
        assert_eq!(export_optional_path(None), "null");
        assert_eq!(
            export_optional_path(Some(Path::new("/app/vendor/autoload.php"))),
            "'/app/vendor/autoload.php'"
        );
    }
}
