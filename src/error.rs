use thiserror::Error;

/// Failures raised by a `Document` backend.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("element handle is stale (generation {handle_generation}, current {current_generation})")]
    StaleHandle {
        handle_generation: u32,
        current_generation: u32,
    },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("operation not supported in this execution context: {0}")]
    Unsupported(&'static str),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("CDP error: {0}")]
    Protocol(String),
}

/// Engine-level failures. Only `FormNotReady` ends a run; the orchestrator
/// turns every other variant into a degraded outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no control matched {query} after {attempts} attempts")]
    Resolution { query: String, attempts: u32 },

    #[error("could not write into {target}: {reason}")]
    Simulation { target: String, reason: String },

    #[error("image upload failed: {0}")]
    Upload(String),

    #[error("form did not load ({found} interactive controls, needed more than {threshold})")]
    FormNotReady { found: usize, threshold: usize },

    #[error(transparent)]
    Dom(#[from] DomError),
}

impl EngineError {
    pub fn simulation(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Simulation {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}
