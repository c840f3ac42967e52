//! Integration tests for the complete Querymend pipeline
//!
//! These tests verify end-to-end behaviour across crates:
//! - Upstream payload → record → correction → output record
//! - Correction → chart synthesis
//! - Output record → re-correction (idempotence)
//!
//! Run with: cargo test --test integration_tests

use querymend_pipeline::{process_value, PipelineConfig, PipelineRecord};
use querymend_sql::{correct_sql, guards, inspect, Correction, CorrectionInput, CorrectionKind, CorrectionOptions};
use serde_json::{json, Value};

fn process(payload: Value) -> Value {
    let record = process_value(&payload, &PipelineConfig::default());
    serde_json::to_value(record).expect("serialize record")
}

// ============================================================================
// Correction heuristic
// ============================================================================

#[test]
fn test_ungrouped_max_becomes_ranked_listing() {
    let out = process(json!({
        "body": {
            "sql": "SELECT MAX(Goals) FROM players",
            "dataset": "players",
            "question": "Who scored the most goals?"
        }
    }));

    assert_eq!(
        out["sql"],
        json!("SELECT *, \"Goals\"\nFROM \"players\"\nWHERE \"Goals\" IS NOT NULL\nORDER BY \"Goals\" DESC\nLIMIT 1000")
    );
    assert_eq!(out["chart_spec"], json!({ "type": "bar", "x": "auto", "y": "Goals" }));
    assert_eq!(out["insight_source"], json!("n8n_analysis"));
}

#[test]
fn test_missing_table_leaves_query_untouched() {
    let out = process(json!({ "sql": "SELECT MAX(Assists)" }));
    assert_eq!(out["sql"], json!("SELECT MAX(Assists)"));
    assert_eq!(out["correction"], json!("unchanged"));
    assert!(out.get("chart_spec").is_none());
}

#[test]
fn test_grouped_and_plain_queries_pass_through() {
    for sql in [
        "SELECT team, MAX(Goals) FROM players GROUP BY team",
        "SELECT player_name, Goals FROM players ORDER BY Goals DESC LIMIT 5",
        "SELECT COUNT(*) FROM players",
    ] {
        let out = process(json!({ "sql": sql, "dataset": "players" }));
        assert_eq!(out["sql"], json!(sql));
        assert_eq!(out["correction"], json!("unchanged"));
    }
}

#[test]
fn test_star_aggregate_falls_back_to_capped_listing() {
    let correction = correct_sql(
        CorrectionInput::new("SELECT MAX(*) FROM players", ""),
        &CorrectionOptions::default(),
    );
    assert_eq!(correction.kind(), CorrectionKind::RewrittenFallback);
    assert_eq!(correction.sql(), "SELECT *\nFROM \"players\"\nLIMIT 1000");
}

#[test]
fn test_rewritten_queries_are_read_only_single_selects() {
    let correction = correct_sql(
        CorrectionInput::new("SELECT player_name, MIN(age) FROM squad", ""),
        &CorrectionOptions::default(),
    );
    let Correction::RewrittenWithColumns {
        category_column, aggregate_column, ..
    } = &correction
    else {
        panic!("expected a ranked rewrite, got {correction:?}");
    };
    assert_eq!(category_column.as_deref(), Some("player_name"));
    assert_eq!(aggregate_column, "age");

    assert!(guards::is_read_only_select(correction.sql()));
    let shape = inspect(correction.sql());
    assert!(shape.single_select, "{shape:?}");
}

// ============================================================================
// Payload shapes
// ============================================================================

#[test]
fn test_agent_reply_placeholder_is_substituted() {
    let reply = json!({
        "sql": "SELECT MAX(Goals) FROM dataset",
        "chart_spec": { "type": "line", "x": "season", "y": "Goals" },
        "note": "kept"
    });
    let out = process(json!({ "text": reply.to_string(), "dataset": "players" }));

    assert!(out["sql"].as_str().expect("sql").contains("FROM \"players\""));
    // An existing chart is never replaced.
    assert_eq!(out["chart_spec"]["type"], json!("line"));
    assert_eq!(out["note"], json!("kept"));
}

#[test]
fn test_unparseable_agent_reply_becomes_error_record() {
    let record = process_value(
        &json!({ "text": "Sure! Here is your query: SELECT 1" }),
        &PipelineConfig::default(),
    );
    let PipelineRecord::Error(err) = record else {
        panic!("expected an error record");
    };
    assert_eq!(err.error, "LLM output not JSON");
    assert_eq!(err.raw.as_deref(), Some("Sure! Here is your query: SELECT 1"));
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_output_records_are_stable_under_reprocessing() {
    let first = process(json!({ "sql": "SELECT MIN(age) FROM squad" }));
    let second = process(first.clone());

    assert_eq!(second["sql"], first["sql"]);
    assert_eq!(second["chart_spec"], first["chart_spec"]);
    assert_eq!(second["correction"], json!("unchanged"));
}
