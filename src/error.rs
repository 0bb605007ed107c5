use thiserror::Error;

/// Failure of a single call to the reasoning oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle rate limited the request")]
    RateLimited,

    #[error("oracle request failed: {0}")]
    Transport(String),

    #[error("oracle API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("oracle returned no content")]
    EmptyReply,
}

impl OracleError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, OracleError::RateLimited)
    }
}

/// The oracle answered, but no usable JSON object could be pulled out of the reply.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no JSON object found in oracle reply")]
    NoJsonObject,

    #[error("malformed JSON in oracle reply: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("browser session error: {0}")]
    Session(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("agent gave up after {0} perception cycles without completing the form")]
    CycleBudgetExhausted(usize),
}
