//! Quoting of identifiers and literals for statements that cannot take
//! bind parameters (DDL, `COMMENT ON`, ...).

/// Quote a PostgreSQL identifier.
///
/// The result is always double quoted, with embedded quotes doubled, so any
/// name round-trips exactly regardless of case or special characters.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a schema-qualified name.
pub fn quote_qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Quote a string literal.
///
/// Uses the standard-conforming form; an `E''` prefix is added when the
/// value contains backslashes so they survive regardless of the server's
/// `standard_conforming_strings` setting.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("table"), "\"table\"");
        assert_eq!(quote_ident("has\"quote"), "\"has\"\"quote\"");
        assert_eq!(quote_ident("Mixed Case"), "\"Mixed Case\"");
    }

    #[test]
    fn test_quote_qualified() {
        assert_eq!(quote_qualified("public", "users"), "\"public\".\"users\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"back\slash"), r"E'back\\slash'");
    }
}
