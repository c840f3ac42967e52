//! Querymend SQL: textual correction of LLM-generated queries
//!
//! NL→SQL agents regularly answer "who are the top scorers?" with
//!
//! ```sql
//! SELECT MAX(Goals) FROM players
//! ```
//!
//! which collapses the result to a single row. This crate detects that shape
//! (`MAX(`/`MIN(` without `GROUP BY`) and rewrites the query into a bounded,
//! ordered, multi-row projection over the same table and column:
//!
//! ```text
//! SELECT "player_name", "Goals"
//! FROM "players"
//! WHERE "Goals" IS NOT NULL
//! ORDER BY "Goals" DESC
//! LIMIT 1000
//! ```
//!
//! ## Scope
//!
//! Everything here is a **textual heuristic**, not a SQL rewriter. It does not
//! understand comments, string literals, subqueries or dialects, and it can be
//! fooled in both directions. [`validate`] exposes a parser-backed diagnostic
//! for callers that want to know whether a query is a single `SELECT`, but it
//! never feeds back into the rewrite.
//!
//! ## Modules
//!
//! - [`detect`]: is a correction needed at all?
//! - [`extract`]: table / aggregate / category column extraction
//! - [`correct`]: the fallback chain and its tagged [`Correction`] result
//! - [`guards`]: pre-execution guards (read-only check, row cap, sampling)
//! - [`validate`]: `sqlparser`-based shape report

pub mod correct;
pub mod detect;
pub mod extract;
pub mod guards;
pub mod validate;

pub use correct::{
    correct_sql, quote_ident, quote_qualified, Correction, CorrectionInput, CorrectionKind,
    CorrectionOptions, UnchangedReason, DEFAULT_CATEGORY_HINTS, DEFAULT_ROW_CAP,
};
pub use detect::needs_correction;
pub use validate::{inspect, SqlShape};
