//! Statement building
//!
//! Identifiers are always bracket-quoted into the statement text; values used
//! in predicates are bound as positional parameters (`@P1`, `@P2`, ...).
//! Database-scoped statements carry their own `USE` so every statement can
//! run on any session.

use std::fmt;

/// Quote an identifier for T-SQL: `[name]` with `]` doubled
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quote a unicode string literal: `N'value'` with `'` doubled
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// A bound parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Str(String),
    Int(i64),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// One batch sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    context: Option<String>,
    body: String,
    params: Vec<Param>,
    sensitive: bool,
}

impl Statement {
    /// Statement that runs at server scope
    pub fn server(body: impl Into<String>) -> Self {
        Self {
            context: None,
            body: body.into(),
            params: Vec::new(),
            sensitive: false,
        }
    }

    /// Statement that first switches to `database`
    pub fn in_database(database: &str, body: impl Into<String>) -> Self {
        Self {
            context: Some(database.to_string()),
            ..Self::server(body)
        }
    }

    /// Bind the next positional parameter
    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Mark the body as containing a secret so it is never logged
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Full batch text, including the context switch
    pub fn sql(&self) -> String {
        match &self.context {
            Some(database) => format!("USE {};\n{}", quote_ident(database), self.body),
            None => self.body.clone(),
        }
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }
}

/// Log-safe rendering
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            let verb: String = self
                .body
                .split_whitespace()
                .take(3)
                .collect::<Vec<_>>()
                .join(" ");
            return write!(f, "{verb} ... <redacted>");
        }
        f.write_str(&self.sql().replace('\n', " "))
    }
}

/// A labelled statement within a create/update sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: &'static str,
    pub statement: Statement,
}

impl Step {
    pub fn new(label: &'static str, statement: Statement) -> Self {
        Self { label, statement }
    }
}

/// An existence check that must return a row before any DDL runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub attribute: &'static str,
    pub query: Statement,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_closing_bracket() {
        assert_eq!(quote_ident("app"), "[app]");
        assert_eq!(quote_ident("we]ird"), "[we]]ird]");
        assert_eq!(quote_ident("a; DROP DATABASE x"), "[a; DROP DATABASE x]");
    }

    #[test]
    fn test_quote_literal_escapes_quote() {
        assert_eq!(quote_literal("x"), "N'x'");
        assert_eq!(quote_literal("it's"), "N'it''s'");
    }

    #[test]
    fn test_context_switch_prefix() {
        let stmt = Statement::in_database("app", "DROP USER [bob];");
        assert_eq!(stmt.sql(), "USE [app];\nDROP USER [bob];");
        assert_eq!(stmt.context(), Some("app"));

        let stmt = Statement::server("DROP LOGIN [bob];");
        assert_eq!(stmt.sql(), "DROP LOGIN [bob];");
    }

    #[test]
    fn test_sensitive_statement_is_redacted() {
        let stmt = Statement::server("CREATE LOGIN [app] WITH PASSWORD = N'secret'").sensitive();
        let shown = stmt.to_string();
        assert!(!shown.contains("secret"));
        assert!(shown.starts_with("CREATE LOGIN [app]"));
    }

    #[test]
    fn test_bind_keeps_order() {
        let stmt = Statement::server("SELECT 1 WHERE a = @P1 AND b = @P2")
            .bind("x")
            .bind(7_i64);
        assert_eq!(stmt.params(), [Param::from("x"), Param::Int(7)]);
    }
}
