//! Result analysis: executed rows → analysis prompt.
//!
//! Runs after the corrected query has been executed by the analytics backend.
//! A single returned row is the typical symptom of an aggregate query that
//! slipped past correction, so it is logged loudly.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    pub rows: Vec<Value>,
    pub question: String,
    pub chart_spec: Value,
    /// Row count reported by the backend; defaults to `rows.len()`.
    pub total_rows: usize,
}

impl AnalysisInput {
    pub fn from_value(payload: &Value) -> Result<Self, PipelineError> {
        if !payload.is_object() {
            return Err(PipelineError::NotAnObject);
        }
        let body = payload.get("body");
        let field = |key: &str| {
            body.and_then(|b| b.get(key))
                .filter(|v| !v.is_null())
                .or_else(|| payload.get(key).filter(|v| !v.is_null()))
        };

        let rows = match field("rows") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => {
                tracing::warn!(kind = json_kind(other), "`rows` is not an array; ignoring");
                Vec::new()
            }
            None => Vec::new(),
        };
        let question = field("question")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let chart_spec = field("chart_spec").cloned().unwrap_or_else(|| json!({}));
        let total_rows = field("total_rows")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(rows.len());

        Ok(Self {
            rows,
            question,
            chart_spec,
            total_rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisStep {
    /// Nothing to analyse; returned directly instead of calling the model.
    NoData { summary: String, text: String },
    /// Prompt for the analysis agent.
    Prompt {
        prompt: String,
        rows_count: usize,
        question: String,
        chart_spec: Value,
    },
}

/// Build the analysis step, forwarding at most `max_rows` rows to the prompt.
pub fn prepare(input: &AnalysisInput, max_rows: usize) -> AnalysisStep {
    tracing::info!(
        rows = input.rows.len(),
        total_rows = input.total_rows,
        "analysis input received"
    );

    if input.rows.is_empty() {
        tracing::error!("no rows received for analysis");
        return AnalysisStep::NoData {
            summary: "No data available for analysis.".to_string(),
            text: "The workflow did not receive any rows to analyse.".to_string(),
        };
    }
    if input.rows.len() == 1 {
        tracing::warn!(
            first_row = %input.rows[0],
            "only one row received; the generated SQL probably collapsed the result"
        );
    }

    let shown = &input.rows[..input.rows.len().min(max_rows)];
    let rows_json = serde_json::to_string_pretty(shown).unwrap_or_default();
    let chart_json = serde_json::to_string_pretty(&input.chart_spec).unwrap_or_default();
    let truncated = if shown.len() < input.rows.len() {
        format!(", first {} shown", shown.len())
    } else {
        String::new()
    };

    let prompt = format!(
        r#"You are an expert assistant in data analysis and visualisation.

Your role is to interpret the results of SQL queries or statistical tables.

You receive:
- a user question (natural language)
- a table of results (rows)
- a chart specification (chart_spec) with the x/y axes and chart type.

User question: {question}

Data to analyse ({total} rows in total{truncated}):
{rows_json}

Chart specification:
{chart_json}

Your task:
1. Analyse the meaning of the data provided.
2. Identify trends, extreme values and relevant comparisons.
3. Explain the main observations in clear, concise language.
4. If the data is too limited (fewer than 3 points), reply with a short explanation such as "I cannot draw a meaningful conclusion from a single data point."

Reply **only** in JSON with exactly this format:

{{
  "summary": "... your main synthesis ...",
  "text": "... a more detailed analysis (if relevant) ..."
}}

Never rephrase the question or repeat the dataset."#,
        question = input.question,
        total = input.total_rows.max(input.rows.len()),
    );

    AnalysisStep::Prompt {
        prompt,
        rows_count: input.rows.len(),
        question: input.question.clone(),
        chart_spec: input.chart_spec.clone(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
