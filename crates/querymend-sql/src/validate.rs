//! Parser-backed shape report.
//!
//! The correction heuristic is textual and stays that way; this module only
//! answers "does the query parse, and is it one `SELECT`?" so that callers
//! can surface the answer next to the textual verdict.

use serde::Serialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlShape {
    /// Number of parsed statements (0 when parsing failed).
    pub statements: usize,
    /// Exactly one statement and it is a query.
    pub single_select: bool,
    pub parse_error: Option<String>,
}

pub fn inspect(sql: &str) -> SqlShape {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => SqlShape {
            statements: statements.len(),
            single_select: matches!(statements.as_slice(), [Statement::Query(_)]),
            parse_error: None,
        },
        Err(e) => SqlShape {
            statements: 0,
            single_select: false,
            parse_error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewritten_queries_parse_as_single_select() {
        let shape = inspect(
            "SELECT \"player\", \"Goals\"\nFROM \"players\"\nWHERE \"Goals\" IS NOT NULL\nORDER BY \"Goals\" DESC\nLIMIT 1000",
        );
        assert!(shape.single_select, "{shape:?}");
        assert_eq!(shape.statements, 1);
    }

    #[test]
    fn multiple_statements_are_reported() {
        let shape = inspect("SELECT 1; DROP TABLE players");
        assert_eq!(shape.statements, 2);
        assert!(!shape.single_select);
    }

    #[test]
    fn garbage_reports_parse_error() {
        let shape = inspect("SELEC nope FROM");
        assert!(shape.parse_error.is_some());
        assert_eq!(shape.statements, 0);
    }
}
