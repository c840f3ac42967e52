//! Pipeline configuration: defaults, overlaid by `QUERYMEND_*` environment
//! variables, overlaid by CLI flags.

use querymend_sql::CorrectionOptions;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ROW_CAP_ENV: &str = "QUERYMEND_ROW_CAP";
pub const POSITIVE_ONLY_ENV: &str = "QUERYMEND_POSITIVE_ONLY";
pub const CATEGORY_HINTS_ENV: &str = "QUERYMEND_CATEGORY_HINTS";
pub const INSIGHT_SOURCE_ENV: &str = "QUERYMEND_INSIGHT_SOURCE";
pub const PLACEHOLDER_ENV: &str = "QUERYMEND_PLACEHOLDER";
pub const ANALYSIS_MAX_ROWS_ENV: &str = "QUERYMEND_ANALYSIS_MAX_ROWS";

/// Tag written into every output record.
pub const DEFAULT_INSIGHT_SOURCE: &str = "n8n_analysis";
/// Word the NL→SQL prompt uses in place of the real dataset name.
pub const DEFAULT_PLACEHOLDER: &str = "dataset";
/// Rows forwarded to the analysis prompt.
pub const DEFAULT_ANALYSIS_MAX_ROWS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub correction: CorrectionOptions,
    pub insight_source: String,
    pub placeholder: String,
    pub analysis_max_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            correction: CorrectionOptions::default(),
            insight_source: DEFAULT_INSIGHT_SOURCE.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            analysis_max_rows: DEFAULT_ANALYSIS_MAX_ROWS,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each
    /// `QUERYMEND_*` key. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get(ROW_CAP_ENV) {
            let cap = v.trim().parse::<u64>().map_err(|e| invalid(ROW_CAP_ENV, &v, e))?;
            if cap == 0 {
                return Err(invalid(ROW_CAP_ENV, &v, "must be positive"));
            }
            config.correction.row_cap = cap;
        }
        if let Some(v) = get(POSITIVE_ONLY_ENV) {
            config.correction.positive_only = parse_bool(&v)
                .ok_or_else(|| invalid(POSITIVE_ONLY_ENV, &v, "expected true/false"))?;
        }
        if let Some(v) = get(CATEGORY_HINTS_ENV) {
            config.correction.category_hints = v
                .split(',')
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect();
        }
        if let Some(v) = get(INSIGHT_SOURCE_ENV) {
            config.insight_source = v.trim().to_string();
        }
        if let Some(v) = get(PLACEHOLDER_ENV) {
            config.placeholder = v.trim().to_string();
        }
        if let Some(v) = get(ANALYSIS_MAX_ROWS_ENV) {
            let rows = v
                .trim()
                .parse::<usize>()
                .map_err(|e| invalid(ANALYSIS_MAX_ROWS_ENV, &v, e))?;
            if rows == 0 {
                return Err(invalid(ANALYSIS_MAX_ROWS_ENV, &v, "must be positive"));
            }
            config.analysis_max_rows = rows;
        }

        Ok(config)
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
