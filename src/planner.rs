use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::brain::{Oracle, RateLimitRetry, parse_reply};
use crate::error::AgentError;
use crate::types::{Action, CompletionState, PageState, SubAction, ValueMapping};

const DECISION_PROMPT: &str = r#"CRITICAL: Return ONLY raw JSON. The response must start with { and end with }.

You are an agent filling out a web form. Every visible field that has data is already filled.
Decide the single next step.

First classify the form:
- SINGLE PAGE: no sections. If every field with available data is completed, SUBMIT.
- SECTIONED: collapsible sections. A section is done when all of its fields with available data
  are in completedFields. Open the first section that is NOT in completedSections.
- TABBED: treat each tab like a section.
- WIZARD: steps shown one at a time. Open (advance to) the next step; SUBMIT on the last one.

RULES:
1. NEVER choose OPEN_SECTION for a name listed in completedSections.
2. If every section is completed, SUBMIT.
3. If the page shows the form was already submitted, COMPLETE.

Choose exactly one of OPEN_SECTION, SUBMIT, COMPLETE and reply with:
{"type": "OPEN_SECTION|SUBMIT|COMPLETE", "target": "section name when opening a section", "reason": "why"}"#;

/// Decides the next action for a page snapshot.
///
/// Filling visible fields is handled here without the oracle. The oracle is
/// only consulted for structural moves (open a section, submit, finish).
pub struct ActionPlanner {
    oracle: RateLimitRetry<Arc<dyn Oracle>>,
}

impl ActionPlanner {
    pub fn new(oracle: Arc<dyn Oracle>, rate_limit_backoff: Duration) -> Self {
        Self {
            oracle: RateLimitRetry::new(oracle, rate_limit_backoff),
        }
    }

    /// Never fails: a bad oracle turn becomes a RECOVER action.
    pub async fn decide(
        &self,
        state: &PageState,
        completed: &CompletionState,
        available: &ValueMapping,
    ) -> Action {
        if state.form_completed {
            return Action::complete("Form has already been submitted successfully");
        }

        if let Some(batch) = fast_path(state, completed, available) {
            return batch;
        }

        match self.ask_oracle(state, completed, available).await {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "decision failed, recovering");
                Action::recover("AI decision failed, retrying analysis")
            }
        }
    }

    async fn ask_oracle(
        &self,
        state: &PageState,
        completed: &CompletionState,
        available: &ValueMapping,
    ) -> Result<Action, AgentError> {
        let prompt = decision_prompt(state, completed, available);
        let reply = self.oracle.generate(&prompt).await?;
        let action: Action = parse_reply(&reply)?;
        debug!(kind = ?action.kind, target = ?action.target, "oracle decision");
        Ok(action)
    }
}

/// Fill every visible, still-open field we have a value for, in page order.
pub fn fast_path(
    state: &PageState,
    completed: &CompletionState,
    available: &ValueMapping,
) -> Option<Action> {
    let mut seen = HashSet::new();
    let fills: Vec<SubAction> = state
        .visible_fields
        .iter()
        .filter(|f| f.is_visible && !completed.has_field(&f.name))
        .filter_map(|f| available.get(&f.name).map(|value| (f, value)))
        .filter(|(f, _)| seen.insert(f.name.as_str()))
        .map(|(f, value)| SubAction::fill(&f.name, value))
        .collect();

    if fills.is_empty() {
        return None;
    }

    let names: Vec<&str> = fills.iter().map(|s| s.target.as_str()).collect();
    let reason = format!("Filling {} visible fields: {}", fills.len(), names.join(", "));
    Some(Action::batch(fills, reason))
}

fn decision_prompt(state: &PageState, completed: &CompletionState, available: &ValueMapping) -> String {
    let context = json!({
        "currentState": state,
        "completedSections": completed.sections(),
        "completedFields": completed.fields(),
        "availableFormData": available,
    });
    format!("{}\n\nCONTEXT:\n{:#}", DECISION_PROMPT, context)
}
