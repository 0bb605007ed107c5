pub mod agent;
pub mod brain;
pub mod config;
pub mod dom;
pub mod error;
pub mod executor;
pub mod face;
pub mod hands;
pub mod jobs;
pub mod page;
pub mod planner;
pub mod types;

pub use agent::{FormFillingAgent, RunReport};
pub use brain::{OpenAiOracle, Oracle, RateLimitRetry};
pub use error::{AgentError, BrowserError, ExtractionError, OracleError};
pub use page::{Located, PageDriver, SessionFactory};
