//! Dataset placeholder substitution.
//!
//! NL→SQL prompts tell the model to write `FROM dataset`; the real dataset
//! name only exists on the workflow side.

use regex::{NoExpand, Regex};

/// Replace every whole-word, case-insensitive `placeholder` with `dataset`.
///
/// Empty inputs leave `sql` untouched.
pub fn substitute(sql: &str, placeholder: &str, dataset: &str) -> String {
    if sql.is_empty() || placeholder.trim().is_empty() || dataset.trim().is_empty() {
        return sql.to_string();
    }
    let pattern = format!(r"(?i)\b{}\b", regex::escape(placeholder.trim()));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(sql, NoExpand(dataset.trim())).into_owned(),
        Err(err) => {
            tracing::warn!(placeholder, error = %err, "unusable placeholder pattern");
            sql.to_string()
        }
    }
}
