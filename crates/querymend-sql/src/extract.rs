//! Best-effort extraction of the pieces a rewrite needs.
//!
//! Every function here returns `None` rather than failing; the caller decides
//! how far down the fallback chain to go.

use regex::Regex;
use std::sync::OnceLock;

fn from_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bFROM\s+([^\s;(),]+)").expect("valid FROM regex"))
}

fn aggregate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:MAX|MIN)\(\s*["'`]?([^"'`()]+?)["'`]?\s*\)"#)
            .expect("valid aggregate regex")
    })
}

fn select_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bSELECT\s+(.+?)\s+FROM\b").expect("valid SELECT regex"))
}

fn distinct_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:DISTINCT|ALL)\s+").expect("valid DISTINCT regex"))
}

/// Words that can appear bare in a `SELECT` list without being a column.
const SELECT_KEYWORDS: &[&str] = &[
    "ALL", "AS", "CASE", "DISTINCT", "FALSE", "FROM", "NULL", "SELECT", "TOP", "TRUE",
];

/// First table token after `FROM`, with quotes removed from each
/// dot-separated segment (`"main"."players"` → `main.players`).
///
/// `FROM (SELECT ...)` does not match at the outer `FROM`; the search moves
/// on to the next `FROM`, which is usually the inner table.
pub fn table_name(sql: &str) -> Option<String> {
    from_re()
        .captures_iter(sql)
        .filter_map(|c| c.get(1))
        .find_map(|m| unquote_qualified(m.as_str()))
}

fn unquote_qualified(token: &str) -> Option<String> {
    let segments = token
        .split('.')
        .map(|seg| seg.trim_matches(|c| c == '"' || c == '\'' || c == '`'))
        .collect::<Vec<_>>();
    if segments.iter().any(|seg| !is_plain_name(seg)) {
        return None;
    }
    Some(segments.join("."))
}

/// Column named inside the first `MAX(...)` / `MIN(...)` call.
pub fn aggregate_column(sql: &str) -> Option<String> {
    let raw = aggregate_re().captures(sql)?.get(1)?.as_str().trim();
    let raw = distinct_prefix_re().replace(raw, "");
    let column = last_segment(raw.trim());
    if column.is_empty() || column == "*" {
        return None;
    }
    Some(column.to_string())
}

/// Second-cell words that mark the first row of a listing as a header.
const TYPE_HEADERS: &[&str] = &["type", "data_type", "datatype", "dtype", "column_type"];

/// Column names from a freeform schema listing.
///
/// One column per line; `name | type | ...` rows (with or without markdown
/// edge pipes) keep only the first non-empty cell. A leading `name | type`
/// header row, blank rows, purely numeric names and table separators are
/// skipped, as are names that could not be safely re-quoted.
pub fn schema_columns(schema: &str) -> Vec<String> {
    schema
        .lines()
        .map(|line| {
            line.split('|')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .enumerate()
        .filter(|(row, cells)| !(*row == 0 && is_type_header(cells)))
        .map(|(_, cells)| cells[0])
        .map(|cell| cell.trim_matches(|c| c == '"' || c == '`').trim())
        .filter(|name| !name.is_empty())
        .filter(|name| !name.chars().all(|c| c.is_ascii_digit()))
        .filter(|name| !name.chars().all(|c| matches!(c, '-' | '+' | '=' | ':' | ' ')))
        .filter(|name| is_plain_name(name))
        .map(str::to_string)
        .collect()
}

fn is_type_header(cells: &[&str]) -> bool {
    cells
        .get(1)
        .is_some_and(|cell| TYPE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(cell)))
}

/// Pick a label column to pair with the aggregate column.
///
/// Order: a schema column matching one of `hints`, then the first plain item
/// of the original `SELECT` list. `None` means "select every column".
pub fn category_column(
    sql: &str,
    aggregate: Option<&str>,
    schema: Option<&str>,
    hints: &[String],
) -> Option<String> {
    let is_aggregate = |name: &str| aggregate.is_some_and(|a| a.eq_ignore_ascii_case(name));

    if let Some(schema) = schema {
        let hit = schema_columns(schema).into_iter().find(|name| {
            let lower = name.to_lowercase();
            !is_aggregate(name.as_str()) && hints.iter().any(|h| lower.contains(&h.to_lowercase()))
        });
        if hit.is_some() {
            return hit;
        }
    }

    select_list_columns(sql)
        .into_iter()
        .find(|name| !is_aggregate(name.as_str()))
}

/// Plain column references in the first `SELECT` list, in order.
///
/// Function calls, literals, `*` and keywords are dropped; aliases and table
/// qualifiers are stripped.
pub fn select_list_columns(sql: &str) -> Vec<String> {
    let Some(list) = select_list_re().captures(sql).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    split_top_level(list.as_str())
        .into_iter()
        .filter_map(plain_column)
        .collect()
}

fn plain_column(item: &str) -> Option<String> {
    let item = distinct_prefix_re().replace(item.trim(), "");
    let item = item.trim();
    if item.is_empty() || item.contains('(') || item.starts_with('\'') {
        return None;
    }

    let column = last_segment(leading_token(item));
    if column.is_empty()
        || column == "*"
        || column.chars().all(|c| c.is_ascii_digit() || c == '.')
        || SELECT_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(column))
        || !is_plain_name(column)
    {
        return None;
    }
    Some(column.to_string())
}

/// Split on commas that are not nested inside parentheses or quotes.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);
    items
}

/// Text up to the first whitespace that is not inside a quoted identifier.
fn leading_token(item: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in item.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '`') => quote = Some(c),
            (None, c) if c.is_whitespace() => return &item[..i],
            _ => {}
        }
    }
    item
}

/// `t.col` → `col`; quoted segments keep their content.
fn last_segment(name: &str) -> &str {
    let name = name.trim();
    let tail = name.rsplit('.').next().unwrap_or(name);
    tail.trim_matches(|c| c == '"' || c == '`' || c == '\'').trim()
}

/// Names we are willing to put inside a quoted identifier.
///
/// Parentheses are excluded so that a rewritten query can never be mistaken
/// for another `MAX(`/`MIN(` call on a second pass.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '(' | ')' | '"' | '\'' | '`' | ';') || c.is_control())
}
