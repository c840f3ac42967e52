//! Querymend pipeline: the workflow step around SQL correction
//!
//! ```text
//!   upstream payload (JSON)                         downstream (JSON)
//!   ─────────────────────────                       ─────────────────
//!   { sql | body.sql | output.sql,                  { sql,
//!     dataset | body.dataset | ...,     ─────►        chart_spec?,
//!     question?, schema?, chart_spec?,                summary?,
//!     text | message | output | content }             insight_source,
//!                                                     correction }
//!   or  { text: "<LLM JSON>", dataset }
//! ```
//!
//! [`record::PipelineInput::from_value`] is the only place that knows where
//! upstream steps put their fields. Everything after it works on one
//! normalized record.
//!
//! [`analysis`] covers the step that runs after execution: turning returned
//! rows into an analysis prompt.

pub mod analysis;
pub mod chart;
pub mod config;
pub mod error;
pub mod placeholder;
pub mod record;

pub use chart::ChartSpec;
pub use config::PipelineConfig;
pub use error::{ConfigError, PipelineError};
pub use record::{
    process_value, process_value_with_table, run, ErrorRecord, PayloadShape, PipelineInput,
    PipelineOutput, PipelineRecord,
};
