use std::time::Duration;

use crate::types::{MARKUP_MAX_CHARS, MAX_CYCLES_PER_RUN};

/// Timings and limits for one agent run.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Pause after each field in a batch.
    pub batch_settle: Duration,
    /// Pause after opening a section.
    pub section_settle: Duration,
    /// Wait before the single retry of a rate-limited decision.
    pub rate_limit_backoff: Duration,
    /// `None` lets the loop run until the form reports completion.
    pub max_cycles: Option<usize>,
    pub markup_max_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            batch_settle: Duration::from_millis(200),
            section_settle: Duration::from_millis(500),
            rate_limit_backoff: Duration::from_secs(15),
            max_cycles: Some(MAX_CYCLES_PER_RUN),
            markup_max_chars: MARKUP_MAX_CHARS,
        }
    }
}

impl AgentSettings {
    /// No sleeps anywhere. Used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            batch_settle: Duration::ZERO,
            section_settle: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub tick: Duration,
    pub navigation_attempts: u32,
    pub navigation_backoff: Duration,
    pub navigation_timeout: Duration,
    /// Wall-clock cap on a single agent run.
    pub job_timeout: Option<Duration>,
    pub agent: AgentSettings,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(2),
            navigation_attempts: 3,
            navigation_backoff: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            job_timeout: Some(Duration::from_secs(10 * 60)),
            agent: AgentSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
