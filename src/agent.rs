use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::brain::Oracle;
use crate::config::AgentSettings;
use crate::dom::PageStateReader;
use crate::error::AgentError;
use crate::executor::ActionExecutor;
use crate::page::PageDriver;
use crate::planner::ActionPlanner;
use crate::types::{Action, ActionKind, CompletionState, Intent, SubAction, ValueMapping};

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub cycles: usize,
    pub completed_fields: BTreeSet<String>,
    pub completed_sections: BTreeSet<String>,
    /// Completed fields that came from the value mapping.
    pub fields_filled: usize,
}

/// Perceive -> decide -> act, until the page reports the form done.
pub struct FormFillingAgent {
    reader: Arc<PageStateReader>,
    planner: ActionPlanner,
    executor: ActionExecutor,
    values: ValueMapping,
    completed: CompletionState,
    settings: AgentSettings,
}

impl FormFillingAgent {
    pub fn new(
        page: Arc<dyn PageDriver>,
        oracle: Arc<dyn Oracle>,
        values: ValueMapping,
        settings: AgentSettings,
    ) -> Self {
        let reader = Arc::new(PageStateReader::new(page.clone(), settings.markup_max_chars));
        Self {
            planner: ActionPlanner::new(oracle.clone(), settings.rate_limit_backoff),
            executor: ActionExecutor::new(page, reader.clone(), oracle),
            reader,
            values,
            completed: CompletionState::new(),
            settings,
        }
    }

    pub fn completion(&self) -> &CompletionState {
        &self.completed
    }

    pub async fn run(&mut self) -> Result<RunReport, AgentError> {
        info!(fields = self.values.len(), "agent starting");
        let mut cycle = 0;

        loop {
            if let Some(max) = self.settings.max_cycles {
                if cycle >= max {
                    return Err(AgentError::CycleBudgetExhausted(max));
                }
            }
            cycle += 1;

            let state = self.reader.capture(&self.completed).await?;
            self.completed.observe(&state, &self.values);

            let action = self
                .planner
                .decide(&state, &self.completed, &self.values)
                .await;
            info!(cycle, kind = ?action.kind, reason = %action.reason, "agent decided");

            if action.kind == ActionKind::Complete {
                info!(cycle, "form completed");
                return Ok(self.report(cycle));
            }

            if let Err(e) = self.act(&action).await {
                warn!(cycle, error = %e, "action execution failed");
            }
        }
    }

    async fn act(&mut self, action: &Action) -> Result<(), AgentError> {
        match (action.kind, action.target.as_deref()) {
            (ActionKind::BatchActions, _) => {
                debug!(count = action.actions.len(), "executing batch");
                for sub in &action.actions {
                    self.executor.execute_one(Intent::Field(sub)).await?;
                    self.completed.mark_field(sub.target.clone());
                    tokio::time::sleep(self.settings.batch_settle).await;
                }
            }
            (ActionKind::OpenSection, Some(target)) => {
                if self.completed.has_section(target) {
                    info!(section = target, "section already completed, skipping");
                    return Ok(());
                }
                self.executor.open_section(target).await?;
                self.completed.mark_section(target);
                tokio::time::sleep(self.settings.section_settle).await;
            }
            (ActionKind::Submit, _) => {
                self.executor
                    .execute_one(Intent::Field(&SubAction::submit()))
                    .await?;
            }
            _ => self.executor.execute_one(Intent::Action(action)).await?,
        }
        Ok(())
    }

    fn report(&self, cycles: usize) -> RunReport {
        let completed_fields = self.completed.fields().clone();
        let fields_filled = completed_fields
            .iter()
            .filter(|name| self.values.contains_key(*name))
            .count();
        RunReport {
            cycles,
            completed_sections: self.completed.sections().clone(),
            completed_fields,
            fields_filled,
        }
    }
}
