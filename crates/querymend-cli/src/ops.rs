//! Operations shared by the CLI subcommands and the webhook server.

use querymend_pipeline::analysis::{self, AnalysisInput};
use querymend_pipeline::{process_value_with_table, PipelineConfig, PipelineError};
use querymend_sql::guards;
use querymend_sql::{needs_correction, SqlShape};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Correct one payload, or each element of an array of payloads.
///
/// `default_table` fills in the dataset for payloads that carry none.
pub fn correct_payload(payload: &Value, config: &PipelineConfig, default_table: Option<&str>) -> Value {
    match payload {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| correct_one(item, config, default_table))
                .collect(),
        ),
        other => correct_one(other, config, default_table),
    }
}

fn correct_one(payload: &Value, config: &PipelineConfig, default_table: Option<&str>) -> Value {
    to_json(&process_value_with_table(payload, config, default_table))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub sql: String,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub sample: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub read_only: bool,
    pub needs_correction: bool,
    pub shape: SqlShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limited: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled: Option<String>,
}

pub fn check_sql(req: &CheckRequest) -> CheckReport {
    let limited = req
        .limit
        .map(|n| guards::add_limit_if_missing(&req.sql, Some(n)));
    let sampled = req.sample.map(|p| {
        let base = limited.as_deref().unwrap_or(&req.sql);
        guards::wrap_sample(base, Some(p))
    });
    CheckReport {
        read_only: guards::is_read_only_select(&req.sql),
        needs_correction: needs_correction(&req.sql),
        shape: querymend_sql::inspect(&req.sql),
        limited,
        sampled,
    }
}

pub fn analysis_payload(payload: &Value, config: &PipelineConfig) -> Result<Value, PipelineError> {
    let input = AnalysisInput::from_value(payload)?;
    Ok(to_json(&analysis::prepare(&input, config.analysis_max_rows)))
}

pub fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({ "error": format!("failed to serialize record: {e}") }))
}
