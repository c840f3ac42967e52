//! The correction fallback chain.
//!
//! ```text
//!   needs_correction? ──no──► Unchanged(NotApplicable)
//!         │yes
//!   table known? ──────no──► Unchanged(NoTable)
//!         │yes
//!   aggregate column? ─no──► RewrittenFallback     SELECT * ... LIMIT cap
//!         │yes
//!         └───────────────► RewrittenWithColumns  SELECT cat, agg ... ORDER BY agg DESC LIMIT cap
//! ```
//!
//! The chain never fails: anything it cannot determine pushes it one step
//! further towards the conservative end.

use serde::{Deserialize, Serialize};

use crate::detect::needs_correction;
use crate::extract;

/// Row cap applied to every rewritten query.
pub const DEFAULT_ROW_CAP: u64 = 1000;

/// Substrings that make a schema column a good label for a ranked list.
pub const DEFAULT_CATEGORY_HINTS: &[&str] = &["id", "name", "nom", "label", "libelle"];

/// Knobs for the rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionOptions {
    /// `LIMIT` emitted by every rewrite.
    pub row_cap: u64,
    /// Also require `agg > 0` in the rewritten `WHERE` clause.
    pub positive_only: bool,
    /// Lowercase substrings used to pick a label column from the schema.
    pub category_hints: Vec<String>,
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        Self {
            row_cap: DEFAULT_ROW_CAP,
            positive_only: false,
            category_hints: DEFAULT_CATEGORY_HINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Everything the heuristic looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectionInput<'a> {
    pub sql: &'a str,
    /// Caller-supplied table (dataset) name; may be empty.
    pub table: &'a str,
    pub question: Option<&'a str>,
    /// Freeform column listing, one column per line.
    pub schema: Option<&'a str>,
}

impl<'a> CorrectionInput<'a> {
    pub fn new(sql: &'a str, table: &'a str) -> Self {
        Self {
            sql,
            table,
            question: None,
            schema: None,
        }
    }

    pub fn with_question(mut self, question: Option<&'a str>) -> Self {
        self.question = question;
        self
    }

    pub fn with_schema(mut self, schema: Option<&'a str>) -> Self {
        self.schema = schema;
        self
    }
}

/// Why a query was passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnchangedReason {
    /// No `MAX(`/`MIN(` without `GROUP BY`.
    NotApplicable,
    /// Correction was needed but no table could be resolved.
    NoTable,
}

/// Which branch of the chain produced a [`Correction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    Unchanged,
    RewrittenWithColumns,
    RewrittenFallback,
}

impl CorrectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrectionKind::Unchanged => "unchanged",
            CorrectionKind::RewrittenWithColumns => "rewritten_with_columns",
            CorrectionKind::RewrittenFallback => "rewritten_fallback",
        }
    }
}

/// Outcome of [`correct_sql`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    Unchanged {
        sql: String,
        reason: UnchangedReason,
    },
    RewrittenWithColumns {
        sql: String,
        table: String,
        aggregate_column: String,
        /// `None` when the rewrite selects `*` next to the aggregate column.
        category_column: Option<String>,
    },
    RewrittenFallback {
        sql: String,
        table: String,
    },
}

impl Correction {
    pub fn sql(&self) -> &str {
        match self {
            Correction::Unchanged { sql, .. }
            | Correction::RewrittenWithColumns { sql, .. }
            | Correction::RewrittenFallback { sql, .. } => sql,
        }
    }

    pub fn into_sql(self) -> String {
        match self {
            Correction::Unchanged { sql, .. }
            | Correction::RewrittenWithColumns { sql, .. }
            | Correction::RewrittenFallback { sql, .. } => sql,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        !matches!(self, Correction::Unchanged { .. })
    }

    pub fn kind(&self) -> CorrectionKind {
        match self {
            Correction::Unchanged { .. } => CorrectionKind::Unchanged,
            Correction::RewrittenWithColumns { .. } => CorrectionKind::RewrittenWithColumns,
            Correction::RewrittenFallback { .. } => CorrectionKind::RewrittenFallback,
        }
    }
}

/// Run the fallback chain over one query.
pub fn correct_sql(input: CorrectionInput<'_>, options: &CorrectionOptions) -> Correction {
    let sql = input.sql;
    if !needs_correction(sql) {
        tracing::debug!("no aggregate-without-grouping pattern; passing SQL through");
        return Correction::Unchanged {
            sql: sql.to_string(),
            reason: UnchangedReason::NotApplicable,
        };
    }

    tracing::debug!(
        question = input.question.unwrap_or_default(),
        "MAX()/MIN() without GROUP BY detected"
    );

    let resolved = extract::table_name(sql)
        .map(|t| (quote_qualified(&t), t))
        .or_else(|| usable_table(input.table).map(|t| (quote_ident(&t), t)));
    let Some((from, table)) = resolved else {
        tracing::warn!(sql, "no table resolvable; leaving SQL unchanged");
        return Correction::Unchanged {
            sql: sql.to_string(),
            reason: UnchangedReason::NoTable,
        };
    };

    let Some(aggregate) = extract::aggregate_column(sql) else {
        let rewritten = format!(
            "SELECT *\nFROM {}\nLIMIT {}",
            from,
            options.row_cap
        );
        tracing::info!(table = %table, "rewrote SQL to capped table scan");
        return Correction::RewrittenFallback {
            sql: rewritten,
            table,
        };
    };

    let category = extract::category_column(
        sql,
        Some(&aggregate),
        input.schema,
        &options.category_hints,
    );

    let agg = quote_ident(&aggregate);
    let projection = match &category {
        Some(c) => format!("{}, {agg}", quote_ident(c)),
        None => format!("*, {agg}"),
    };
    let mut filter = format!("{agg} IS NOT NULL");
    if options.positive_only {
        filter.push_str(&format!(" AND {agg} > 0"));
    }
    let rewritten = format!(
        "SELECT {projection}\nFROM {}\nWHERE {filter}\nORDER BY {agg} DESC\nLIMIT {}",
        from,
        options.row_cap
    );

    tracing::info!(
        table = %table,
        aggregate = %aggregate,
        category = category.as_deref().unwrap_or("*"),
        "rewrote SQL to ranked multi-row projection"
    );

    Correction::RewrittenWithColumns {
        sql: rewritten,
        table,
        aggregate_column: aggregate,
        category_column: category,
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote each segment of a `schema.table` reference separately.
pub fn quote_qualified(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

fn usable_table(table: &str) -> Option<String> {
    let table = table.trim();
    if table.is_empty() || table.contains(['(', ')']) {
        return None;
    }
    Some(table.to_string())
}
