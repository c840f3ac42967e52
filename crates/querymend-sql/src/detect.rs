//! Detection of the aggregate-without-grouping shape.

use regex::Regex;
use std::sync::OnceLock;

fn group_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)GROUP\s+BY").expect("valid GROUP BY regex"))
}

/// True when `sql` calls `MAX(`/`MIN(` (case-insensitive substring) and has
/// no `GROUP BY`.
///
/// Purely textual: a `max(` inside a string literal or comment counts, and a
/// `GROUP BY` inside a subquery suppresses the match for the whole query.
pub fn needs_correction(sql: &str) -> bool {
    has_min_max_call(sql) && !has_group_by(sql)
}

/// Case-insensitive `MAX(` / `MIN(` substring test.
fn has_min_max_call(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    upper.contains("MAX(") || upper.contains("MIN(")
}

fn has_group_by(sql: &str) -> bool {
    group_by_re().is_match(sql)
}
