use thiserror::Error;

/// Upstream payloads we cannot turn into a record.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("LLM output not JSON")]
    LlmOutputNotJson { raw: String },
}

impl PipelineError {
    /// The unparsed text to echo back in an error record.
    pub fn raw(&self) -> Option<&str> {
        match self {
            PipelineError::NotAnObject => None,
            PipelineError::LlmOutputNotJson { raw } => Some(raw),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
