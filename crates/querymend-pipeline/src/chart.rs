//! Minimal chart hint attached to corrected queries.

use querymend_sql::Correction;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `{ type, x, y }` rendering hint. The frontend treats `x: "auto"` as
/// "pick the first non-numeric column".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: String,
    pub y: String,
}

impl ChartSpec {
    pub fn bar(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            kind: "bar".to_string(),
            x: x.into(),
            y: y.into(),
        }
    }
}

impl From<ChartSpec> for Value {
    fn from(spec: ChartSpec) -> Self {
        json!({ "type": spec.kind, "x": spec.x, "y": spec.y })
    }
}

/// Bar chart over the detected columns; only column rewrites carry enough
/// information to point an axis at.
pub fn synthesize(correction: &Correction) -> Option<ChartSpec> {
    match correction {
        Correction::RewrittenWithColumns {
            aggregate_column,
            category_column,
            ..
        } => Some(ChartSpec::bar(
            category_column.as_deref().unwrap_or("auto"),
            aggregate_column.as_str(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querymend_sql::UnchangedReason;

    #[test]
    fn column_rewrite_yields_bar_chart() {
        let c = Correction::RewrittenWithColumns {
            sql: String::new(),
            table: "players".into(),
            aggregate_column: "Goals".into(),
            category_column: Some("player_name".into()),
        };
        assert_eq!(synthesize(&c), Some(ChartSpec::bar("player_name", "Goals")));
    }

    #[test]
    fn star_projection_uses_auto_axis() {
        let c = Correction::RewrittenWithColumns {
            sql: String::new(),
            table: "players".into(),
            aggregate_column: "Goals".into(),
            category_column: None,
        };
        let value: Value = synthesize(&c).map(Value::from).unwrap_or(Value::Null);
        assert_eq!(value, json!({ "type": "bar", "x": "auto", "y": "Goals" }));
    }

    #[test]
    fn fallback_and_unchanged_have_no_chart() {
        let fallback = Correction::RewrittenFallback {
            sql: String::new(),
            table: "players".into(),
        };
        let unchanged = Correction::Unchanged {
            sql: String::new(),
            reason: UnchangedReason::NotApplicable,
        };
        assert_eq!(synthesize(&fallback), None);
        assert_eq!(synthesize(&unchanged), None);
    }
}
