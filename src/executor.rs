use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::brain::{Oracle, parse_reply};
use crate::dom::PageStateReader;
use crate::error::AgentError;
use crate::page::PageDriver;
use crate::types::{Command, ExecutionPlan, Intent, SECTION_CONTROL_SELECTOR, SUCCESS_MARKER};

const EXECUTION_PROMPT: &str = r#"CRITICAL: Return ONLY raw JSON. The response must start with { and end with }.

You translate one form action into exactly one browser command.
Pick a CSS selector that matches the right element in the page HTML below.

Reply with:
{"command": "click|fill|selectOption|waitForSelector", "selector": "exact_css_selector", "value": "value if needed", "reason": "why this command"}"#;

/// Turns intents into browser primitives.
///
/// The selector is re-derived from the current markup on every call, so a
/// re-rendered page never sees a stale selector.
pub struct ActionExecutor {
    page: Arc<dyn PageDriver>,
    reader: Arc<PageStateReader>,
    oracle: Arc<dyn Oracle>,
}

impl ActionExecutor {
    pub fn new(page: Arc<dyn PageDriver>, reader: Arc<PageStateReader>, oracle: Arc<dyn Oracle>) -> Self {
        Self {
            page,
            reader,
            oracle,
        }
    }

    pub async fn execute_one(&self, intent: Intent<'_>) -> Result<(), AgentError> {
        // the marker check must see the whole body, not the prompt budget
        let body = self.reader.body().await?;
        if body.contains(SUCCESS_MARKER) {
            info!("form already submitted, nothing to execute");
            return Ok(());
        }
        let markup = self.reader.fit(body);

        let prompt = format!(
            "{}\n\nAction to execute: {}\n\nCurrent page HTML:\n{}",
            EXECUTION_PROMPT,
            serde_json::to_string(&intent).unwrap_or_default(),
            markup
        );
        let reply = self.oracle.generate(&prompt).await?;
        let plan: ExecutionPlan = parse_reply(&reply)?;

        debug!(command = ?plan.command, selector = %plan.selector, reason = %plan.reason, "execution plan");
        self.run_plan(&plan).await
    }

    async fn run_plan(&self, plan: &ExecutionPlan) -> Result<(), AgentError> {
        let value = plan.value.as_deref().unwrap_or_default();
        match plan.command {
            Command::Click => self.page.click(&plan.selector).await?,
            Command::Fill => self.page.fill(&plan.selector, value).await?,
            Command::SelectOption => self.page.select_option(&plan.selector, value).await?,
            Command::WaitForSelector => self.page.wait_for_selector(&plan.selector).await?,
            Command::Unknown => warn!(selector = %plan.selector, "ignoring unknown command"),
        }
        Ok(())
    }

    /// Click the first section control whose text contains `name`.
    ///
    /// A missing or hidden control is logged, not raised.
    pub async fn open_section(&self, name: &str) -> Result<(), AgentError> {
        info!(section = name, "opening section");
        match self.page.locate_by_text(SECTION_CONTROL_SELECTOR, name).await? {
            Some(control) if control.visible => {
                self.page.click(&control.selector).await?;
                debug!(section = name, "clicked section control");
            }
            Some(_) => warn!(section = name, "section control is not visible"),
            None => warn!(section = name, "section control not found"),
        }
        Ok(())
    }
}
