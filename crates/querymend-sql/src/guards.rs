//! Pre-execution guards applied to generated SQL before it reaches the
//! analytics engine.
//!
//! None of these functions fail: a guard that cannot decide answers "unsafe",
//! and a transform that cannot apply returns its input.

use regex::Regex;
use std::sync::OnceLock;

fn limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\blimit\s+\d+\b").expect("valid LIMIT regex"))
}

/// DDL/DML/DCL tokens that disqualify a query, padded with spaces so that
/// column names like `updated_at` do not match.
const BANNED_TOKENS: &[&str] = &[
    " drop ", " delete ", " update ", " insert ", " alter ", " create ", " attach ", " pragma ",
    " call ", " replace ", " vacuum ", " copy ", " load ", " import ",
];

/// True when `sql` looks like a harmless `SELECT`.
pub fn is_read_only_select(sql: &str) -> bool {
    let s = sql.trim().to_lowercase();
    if s.is_empty() || !s.starts_with("select") {
        return false;
    }
    if s.contains("--") || s.contains("/*") {
        return false;
    }
    let padded = format!(" {s} ");
    !BANNED_TOKENS.iter().any(|tok| padded.contains(tok))
}

/// Append `LIMIT n` unless the query already has a numeric `LIMIT`.
///
/// Trailing `;` is stripped whenever a limit is applied or checked.
pub fn add_limit_if_missing(sql: &str, limit: Option<u64>) -> String {
    let Some(n) = limit.filter(|n| *n > 0) else {
        return sql.to_string();
    };
    if sql.is_empty() {
        return String::new();
    }
    let s = sql.trim().trim_end_matches(';').trim_end();
    if limit_re().is_match(s) {
        s.to_string()
    } else {
        format!("{s} LIMIT {n}")
    }
}

/// Wrap `sql` in a DuckDB `USING SAMPLE <p> PERCENT` subquery.
///
/// The percentage is clamped to `[0.01, 100]`.
pub fn wrap_sample(sql: &str, percent: Option<f64>) -> String {
    let Some(p) = percent.filter(|p| *p != 0.0 && p.is_finite()) else {
        return sql.to_string();
    };
    if sql.is_empty() {
        return String::new();
    }
    let p = p.clamp(0.01, 100.0);
    let inner = sql.trim().trim_end_matches(';');
    format!("SELECT * FROM ({inner}) t USING SAMPLE {p} PERCENT")
}
