use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::model::{Job, JobId, JobResult, JobStatus};
use super::registry::JobRegistry;
use crate::agent::{FormFillingAgent, RunReport};
use crate::brain::Oracle;
use crate::config::DispatchSettings;
use crate::page::{PageDriver, SessionFactory};

/// Runs pending jobs one at a time, oldest first.
pub struct JobDispatcher {
    registry: JobRegistry,
    sessions: Arc<dyn SessionFactory>,
    oracle: Arc<dyn Oracle>,
    settings: DispatchSettings,
}

impl JobDispatcher {
    pub fn new(
        registry: JobRegistry,
        sessions: Arc<dyn SessionFactory>,
        oracle: Arc<dyn Oracle>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            sessions,
            oracle,
            settings,
        }
    }

    /// Poll until `shutdown` changes or its sender is dropped. Each job is
    /// awaited inline, so a new one never starts while another is running,
    /// and a job in flight finishes before the loop stops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick = ?self.settings.tick, "job dispatcher started");
        let mut ticker = tokio::time::interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            self.tick().await;
        }
        info!("job dispatcher stopped");
    }

    /// Run the oldest pending job to a terminal state, if there is one.
    pub async fn tick(&self) -> Option<JobId> {
        let job = self.registry.next_pending()?;
        self.process(&job).await;
        Some(job.id)
    }

    async fn process(&self, job: &Job) {
        info!(job = %job.id, name = job.name.as_deref().unwrap_or("Unnamed job"), "starting job");
        self.registry.update_status(job.id, JobStatus::Running, None);

        match self.execute(job).await {
            Ok(report) => {
                info!(job = %job.id, cycles = report.cycles, fields = report.fields_filled, "job finished");
                self.registry.update_status(
                    job.id,
                    JobStatus::Completed,
                    Some(JobResult::success(report.fields_filled)),
                );
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(job = %job.id, error = %message, "job failed");
                self.registry.update_status(
                    job.id,
                    JobStatus::Failed,
                    Some(JobResult::failed(message)),
                );
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<RunReport> {
        let page = self
            .sessions
            .open()
            .await
            .context("failed to open browser session")?;

        self.navigate_with_retry(page.as_ref(), &job.url).await?;

        let mut agent = FormFillingAgent::new(
            page,
            self.oracle.clone(),
            job.form_data.clone(),
            self.settings.agent.clone(),
        );

        // the session is released when `agent` (the last page handle) drops
        match self.settings.job_timeout {
            Some(limit) => tokio::time::timeout(limit, agent.run())
                .await
                .map_err(|_| anyhow!("agent did not finish within {:?}", limit))?
                .map_err(Into::into),
            None => agent.run().await.map_err(Into::into),
        }
    }

    async fn navigate_with_retry(&self, page: &dyn PageDriver, url: &str) -> Result<()> {
        let attempts = self.settings.navigation_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!(url, attempt, "opening page");
            match page.navigate(url, self.settings.navigation_timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => {
                    return Err(anyhow!(
                        "Failed to load page after {} attempts: {}",
                        attempts,
                        e
                    ));
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, backoff = ?self.settings.navigation_backoff, "page load failed, retrying");
                    tokio::time::sleep(self.settings.navigation_backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
