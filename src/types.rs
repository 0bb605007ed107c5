use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Field name -> value the agent should enter into the form.
pub type ValueMapping = BTreeMap<String, String>;

/// One observed form control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub is_visible: bool,
}

/// One collapsible grouping of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub is_open: bool,
}

/// What the agent observes at the start of every cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageState {
    pub sections: Vec<Section>,
    pub visible_fields: Vec<Field>,
    pub form_completed: bool,
    pub completed_sections: Vec<String>,
    pub completed_fields: Vec<String>,
}

/// Names the agent has already handled during a run.
///
/// Marks are only ever added. A marked field or section stays marked for the
/// remainder of the run.
#[derive(Debug, Clone, Default)]
pub struct CompletionState {
    sections: BTreeSet<String>,
    fields: BTreeSet<String>,
}

impl CompletionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &BTreeSet<String> {
        &self.sections
    }

    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Returns true if the name was not already marked.
    pub fn mark_section(&mut self, name: impl Into<String>) -> bool {
        self.sections.insert(name.into())
    }

    pub fn mark_field(&mut self, name: impl Into<String>) -> bool {
        self.fields.insert(name.into())
    }

    /// Fold a fresh snapshot into the completion sets.
    ///
    /// Visible fields that already hold a value count as done, whoever filled
    /// them. An open section is done once every visible field we have a value
    /// for is done.
    pub fn observe(&mut self, state: &PageState, values: &ValueMapping) {
        for field in &state.visible_fields {
            if field.is_visible && !field.value.trim().is_empty() {
                self.fields.insert(field.name.clone());
            }
        }

        let all_mapped_done = state
            .visible_fields
            .iter()
            .filter(|f| f.is_visible && values.contains_key(&f.name))
            .all(|f| self.fields.contains(&f.name));

        if all_mapped_done {
            for section in state.sections.iter().filter(|s| s.is_open) {
                self.sections.insert(section.name.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    BatchActions,
    OpenSection,
    Submit,
    Complete,
    Recover,
    #[serde(other)]
    Unknown,
}

/// A high-level decision for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SubAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub reason: String,
}

impl Action {
    pub fn batch(actions: Vec<SubAction>, reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::BatchActions,
            actions,
            target: None,
            reason: reason.into(),
        }
    }

    pub fn complete(reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Complete,
            actions: Vec::new(),
            target: None,
            reason: reason.into(),
        }
    }

    pub fn recover(reason: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Recover,
            actions: Vec::new(),
            target: Some(RECOVER_TARGET.to_string()),
            reason: reason.into(),
        }
    }
}

/// One field mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAction {
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub value: String,
}

impl SubAction {
    pub fn fill(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action: "fill".to_string(),
            target: target.into(),
            value: value.into(),
        }
    }

    /// The synthetic intent dispatched for SUBMIT.
    pub fn submit() -> Self {
        Self {
            action: "click".to_string(),
            target: "submit".to_string(),
            value: String::new(),
        }
    }
}

/// Either kind of instruction the executor accepts.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Intent<'a> {
    Action(&'a Action),
    Field(&'a SubAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Click,
    Fill,
    SelectOption,
    WaitForSelector,
    #[serde(other)]
    Unknown,
}

/// A single browser primitive chosen by the oracle for one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub command: Command,
    pub selector: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub reason: String,
}

pub const RECOVER_TARGET: &str = "retry_analysis";
pub const SUCCESS_MARKER: &str = "Form submitted successfully!";
pub const SECTION_CONTROL_SELECTOR: &str = "button";
pub const MARKUP_MAX_CHARS: usize = 60_000;
pub const MAX_CYCLES_PER_RUN: usize = 100;
