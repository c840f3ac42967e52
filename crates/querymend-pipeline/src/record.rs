//! Normalized input/output records for the correction step.

use querymend_sql::{correct_sql, CorrectionInput, CorrectionKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chart;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::placeholder;

/// Which upstream shape a record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// Fields sit on the payload itself (or under `body` / `output`).
    Webhook,
    /// The payload carries the raw LLM reply as a JSON string in `text`.
    AgentText,
}

/// One request, as every later step sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInput {
    pub sql: String,
    /// Dataset / table name supplied alongside the SQL; may be empty.
    pub table: String,
    pub question: Option<String>,
    pub schema: Option<String>,
    pub chart_spec: Option<Value>,
    pub summary: Option<Value>,
    pub shape: PayloadShape,
    /// Untouched fields of an agent reply, echoed to the output.
    pub extra: Map<String, Value>,
}

/// Fields the output record owns; never echoed from `extra`.
const OUTPUT_KEYS: &[&str] = &["sql", "chart_spec", "summary", "insight_source", "correction"];

impl PipelineInput {
    pub fn new(sql: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            table: table.into(),
            question: None,
            schema: None,
            chart_spec: None,
            summary: None,
            shape: PayloadShape::Webhook,
            extra: Map::new(),
        }
    }

    /// Build the record from whatever shape the upstream step produced.
    pub fn from_value(payload: &Value) -> Result<Self, PipelineError> {
        if !payload.is_object() {
            return Err(PipelineError::NotAnObject);
        }

        let table = first_string(payload, &[
            &["body", "dataset"],
            &["dataset"],
            &["output", "dataset"],
            &["table"],
            &["body", "table"],
        ])
        .unwrap_or_default();
        let question = first_string(payload, &[
            &["body", "question"],
            &["question"],
            &["output", "question"],
        ]);
        let schema = first_schema(payload, &[&["body", "schema"], &["schema"]]);

        if let Some(sql) = first_string(payload, &[&["sql"], &["body", "sql"], &["output", "sql"]]) {
            return Ok(Self {
                sql,
                table,
                question,
                schema,
                chart_spec: first_present(payload, &[
                    &["chart_spec"],
                    &["body", "chart_spec"],
                    &["output", "chart_spec"],
                ]),
                summary: first_present(payload, &[
                    &["text"],
                    &["message"],
                    &["output"],
                    &["content"],
                ]),
                shape: PayloadShape::Webhook,
                extra: Map::new(),
            });
        }

        let Some(text) = payload.get("text").and_then(Value::as_str) else {
            tracing::debug!("payload carries no SQL; passing through");
            return Ok(Self {
                summary: first_present(payload, &[
                    &["text"],
                    &["message"],
                    &["output"],
                    &["content"],
                ]),
                question,
                schema,
                ..Self::new(String::new(), table)
            });
        };

        let mut reply = parse_agent_reply(text)?;
        let sql = take_string(&mut reply, "sql").unwrap_or_default();
        let chart_spec = reply.remove("chart_spec").filter(is_present);
        let summary = reply.remove("summary").filter(is_present);
        let table = if table.is_empty() {
            get_string(&reply, "dataset").unwrap_or_default()
        } else {
            table
        };
        let question = question.or_else(|| get_string(&reply, "question"));
        for key in OUTPUT_KEYS {
            reply.remove(*key);
        }

        Ok(Self {
            sql,
            table,
            question,
            schema,
            chart_spec,
            summary,
            shape: PayloadShape::AgentText,
            extra: reply,
        })
    }
}

/// What the correction step hands downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    pub insight_source: String,
    pub correction: CorrectionKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Explicit record for payloads that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl From<&PipelineError> for ErrorRecord {
    fn from(err: &PipelineError) -> Self {
        Self {
            error: err.to_string(),
            raw: err.raw().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineRecord {
    Ok(PipelineOutput),
    Error(ErrorRecord),
}

/// Placeholder substitution (agent replies only), correction, chart hint.
pub fn run(input: &PipelineInput, config: &PipelineConfig) -> PipelineOutput {
    let sql = match input.shape {
        PayloadShape::AgentText => {
            placeholder::substitute(&input.sql, &config.placeholder, &input.table)
        }
        PayloadShape::Webhook => input.sql.clone(),
    };

    let correction = correct_sql(
        CorrectionInput::new(&sql, &input.table)
            .with_question(input.question.as_deref())
            .with_schema(input.schema.as_deref()),
        &config.correction,
    );

    let chart_spec = match &input.chart_spec {
        Some(spec) => Some(spec.clone()),
        None => chart::synthesize(&correction).map(Value::from),
    };

    tracing::info!(
        shape = ?input.shape,
        correction = correction.kind().as_str(),
        table = %input.table,
        "processed pipeline record"
    );

    PipelineOutput {
        correction: correction.kind(),
        sql: correction.into_sql(),
        chart_spec,
        summary: input.summary.clone(),
        insight_source: config.insight_source.clone(),
        extra: input.extra.clone(),
    }
}

/// Boundary entry point: never fails, malformed payloads become
/// [`ErrorRecord`]s.
pub fn process_value(payload: &Value, config: &PipelineConfig) -> PipelineRecord {
    process_value_with_table(payload, config, None)
}

/// [`process_value`], with `default_table` standing in for payloads that
/// name no dataset.
pub fn process_value_with_table(
    payload: &Value,
    config: &PipelineConfig,
    default_table: Option<&str>,
) -> PipelineRecord {
    match PipelineInput::from_value(payload) {
        Ok(mut input) => {
            if input.table.is_empty() {
                if let Some(table) = default_table {
                    input.table = table.trim().to_string();
                }
            }
            PipelineRecord::Ok(run(&input, config))
        }
        Err(err) => {
            tracing::warn!(error = %err, "rejecting upstream payload");
            PipelineRecord::Error(ErrorRecord::from(&err))
        }
    }
}

fn parse_agent_reply(text: &str) -> Result<Map<String, Value>, PipelineError> {
    match serde_json::from_str::<Value>(strip_code_fence(text)) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(PipelineError::LlmOutputNotJson {
            raw: text.to_string(),
        }),
    }
}

/// Models like to wrap JSON replies in a ```json fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let body = match rest.find('\n') {
        Some(newline) if !rest[..newline].trim_start().starts_with('{') => &rest[newline + 1..],
        _ => rest,
    };
    body.trim()
}

fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |v, key| v.get(*key))
}

/// Present in the `a || b || c` sense: not null, not `false`, not `""`.
fn is_present(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn first_present(payload: &Value, paths: &[&[&str]]) -> Option<Value> {
    paths
        .iter()
        .filter_map(|p| lookup(payload, p))
        .find(|v| is_present(v))
        .cloned()
}

fn first_string(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| lookup(payload, p))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Schema listings arrive as one string or as an array of lines.
fn first_schema(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| lookup(payload, p))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let lines: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                (!lines.is_empty()).then(|| lines.join("\n"))
            }
            _ => None,
        })
}

fn get_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sql_is_found_in_nested_locations() {
        for payload in [
            json!({ "sql": "SELECT 1", "dataset": "t" }),
            json!({ "body": { "sql": "SELECT 1", "dataset": "t" } }),
            json!({ "output": { "sql": "SELECT 1", "dataset": "t" } }),
        ] {
            let input = PipelineInput::from_value(&payload).expect("record");
            assert_eq!(input.sql, "SELECT 1");
            assert_eq!(input.table, "t");
            assert_eq!(input.shape, PayloadShape::Webhook);
        }
    }

    #[test]
    fn top_level_sql_wins_and_empty_strings_are_skipped() {
        let payload = json!({
            "sql": "",
            "body": { "sql": "SELECT 2", "dataset": "" },
            "dataset": "players",
        });
        let input = PipelineInput::from_value(&payload).expect("record");
        assert_eq!(input.sql, "SELECT 2");
        assert_eq!(input.table, "players");
    }

    #[test]
    fn summary_prefers_text_then_message() {
        let payload = json!({ "sql": "SELECT 1", "text": "", "message": "hello" });
        let input = PipelineInput::from_value(&payload).expect("record");
        assert_eq!(input.summary, Some(json!("hello")));
    }

    #[test]
    fn schema_arrays_are_joined() {
        let payload = json!({ "sql": "SELECT 1", "schema": ["a | INT", "b | TEXT"] });
        let input = PipelineInput::from_value(&payload).expect("record");
        assert_eq!(input.schema.as_deref(), Some("a | INT\nb | TEXT"));
    }

    #[test]
    fn agent_text_is_parsed_and_extra_fields_kept() {
        let reply = json!({
            "sql": "SELECT MAX(Goals) FROM dataset",
            "summary": "Top scorer",
            "notes": "model notes",
            "insight_source": "model",
        });
        let payload = json!({ "text": reply.to_string(), "body": { "dataset": "players" } });
        let input = PipelineInput::from_value(&payload).expect("record");
        assert_eq!(input.shape, PayloadShape::AgentText);
        assert_eq!(input.sql, "SELECT MAX(Goals) FROM dataset");
        assert_eq!(input.table, "players");
        assert_eq!(input.summary, Some(json!("Top scorer")));
        assert_eq!(input.extra.get("notes"), Some(&json!("model notes")));
        assert!(input.extra.get("insight_source").is_none());
    }

    #[test]
    fn fenced_agent_text_is_accepted() {
        let payload = json!({ "text": "```json\n{\"sql\": \"SELECT 1\"}\n```" });
        let input = PipelineInput::from_value(&payload).expect("record");
        assert_eq!(input.sql, "SELECT 1");
    }

    #[test]
    fn malformed_agent_text_is_an_error_record() {
        let payload = json!({ "text": "Sure! Here is your SQL: SELECT 1" });
        let record = process_value(&payload, &PipelineConfig::default());
        assert_eq!(
            record,
            PipelineRecord::Error(ErrorRecord {
                error: "LLM output not JSON".to_string(),
                raw: Some("Sure! Here is your SQL: SELECT 1".to_string()),
            })
        );
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            PipelineInput::from_value(&json!(["SELECT 1"])),
            Err(PipelineError::NotAnObject)
        ));
    }

    #[test]
    fn agent_placeholder_is_replaced_before_correction() {
        let reply = json!({ "sql": "SELECT MAX(Goals) FROM dataset" });
        let payload = json!({ "text": reply.to_string(), "dataset": "players" });
        let input = PipelineInput::from_value(&payload).expect("record");
        let out = run(&input, &PipelineConfig::default());
        assert_eq!(out.correction, CorrectionKind::RewrittenWithColumns);
        assert!(out.sql.contains("FROM \"players\""));
        assert_eq!(out.chart_spec, Some(json!({ "type": "bar", "x": "auto", "y": "Goals" })));
    }

    #[test]
    fn webhook_sql_is_not_placeholder_substituted() {
        let input = PipelineInput::new("SELECT * FROM dataset", "players");
        let out = run(&input, &PipelineConfig::default());
        assert_eq!(out.sql, "SELECT * FROM dataset");
        assert_eq!(out.correction, CorrectionKind::Unchanged);
        assert_eq!(out.chart_spec, None);
    }

    #[test]
    fn existing_chart_spec_is_preserved() {
        let payload = json!({
            "sql": "SELECT MAX(Goals) FROM players",
            "chart_spec": { "type": "line", "x": "season", "y": "Goals" },
        });
        let input = PipelineInput::from_value(&payload).expect("record");
        let out = run(&input, &PipelineConfig::default());
        assert_eq!(out.correction, CorrectionKind::RewrittenWithColumns);
        assert_eq!(out.chart_spec, Some(json!({ "type": "line", "x": "season", "y": "Goals" })));
    }

    #[test]
    fn output_serializes_flat() {
        let input = PipelineInput::new("SELECT MAX(Goals) FROM players", "players");
        let out = run(&input, &PipelineConfig::default());
        let value = serde_json::to_value(&out).expect("serialize");
        assert_eq!(value["insight_source"], json!("n8n_analysis"));
        assert_eq!(value["correction"], json!("rewritten_with_columns"));
        assert_eq!(value["chart_spec"]["y"], json!("Goals"));
        assert!(value.get("summary").is_none());
    }

    #[test]
    fn non_string_text_without_sql_is_kept_as_summary() {
        let payload = json!({ "text": { "summary": "done" }, "message": "ignored" });
        let input = PipelineInput::from_value(&payload).expect("record");
        assert_eq!(input.shape, PayloadShape::Webhook);
        assert_eq!(input.summary, Some(json!({ "summary": "done" })));

        let input = PipelineInput::from_value(&json!({ "text": false, "message": "hi" }))
            .expect("record");
        assert_eq!(input.summary, Some(json!("hi")));
    }

    #[test]
    fn default_table_applies_only_when_payload_names_none() {
        let config = PipelineConfig::default();
        let PipelineRecord::Ok(out) = process_value_with_table(
            &json!({ "sql": "SELECT MAX(Goals)" }),
            &config,
            Some("players"),
        ) else {
            panic!("expected output record");
        };
        assert!(out.sql.contains("FROM \"players\""), "{}", out.sql);

        let PipelineRecord::Ok(out) = process_value_with_table(
            &json!({ "sql": "SELECT MAX(Goals)", "dataset": "squad" }),
            &config,
            Some("players"),
        ) else {
            panic!("expected output record");
        };
        assert!(out.sql.contains("FROM \"squad\""), "{}", out.sql);

        let record = process_value_with_table(&json!("nope"), &config, Some("players"));
        assert!(matches!(record, PipelineRecord::Error(_)));
    }
}
