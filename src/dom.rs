use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::BrowserError;
use crate::page::PageDriver;
use crate::types::{CompletionState, Field, PageState, Section};

/// JavaScript evaluated in the page to describe the form.
/// READ-ONLY: nothing on the page is touched.
///
/// Sections are the buttons inside a form (`aria-expanded="true"` means open).
/// Fields are every input, select and textarea, named by name, id, then
/// placeholder. Nameless ones are dropped. Completion is a coarse heuristic:
/// any success-looking class or id, or the words "success" / "complete"
/// anywhere in the body text.
pub const PAGE_STATE_JS: &str = r#"
(() => {
  const sections = [...document.querySelectorAll('form button')]
    .map(btn => ({
      name: (btn.textContent || '').trim(),
      isOpen: btn.getAttribute('aria-expanded') === 'true',
    }))
    .filter(s => s.name !== '');

  const visibleFields = [...document.querySelectorAll('input, select, textarea')]
    .map(el => {
      let name = el.name || el.id || '';
      if (!name && el.tagName !== 'SELECT' && el.placeholder) name = el.placeholder;
      return {
        name,
        type: el.type || el.tagName.toLowerCase(),
        value: el.value || '',
        isVisible: el.offsetParent !== null,
      };
    })
    .filter(f => f.name !== '');

  const indicators = document.querySelectorAll(
    '[class*="success"], [class*="complete"], [class*="done"], [id*="success"], [id*="complete"]'
  );
  const text = (document.body && document.body.textContent) || '';
  const formCompleted = indicators.length > 0 || text.includes('success') || text.includes('complete');

  return JSON.stringify({ sections, visibleFields, formCompleted });
})()
"#;

pub const BODY_MARKUP_JS: &str = "document.body ? document.body.innerHTML : ''";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    visible_fields: Vec<Field>,
    #[serde(default)]
    form_completed: bool,
}

/// Reads the form state out of a live page.
pub struct PageStateReader {
    page: Arc<dyn PageDriver>,
    markup_max_chars: usize,
}

impl PageStateReader {
    pub fn new(page: Arc<dyn PageDriver>, markup_max_chars: usize) -> Self {
        Self {
            page,
            markup_max_chars,
        }
    }

    pub async fn capture(&self, completed: &CompletionState) -> Result<PageState, BrowserError> {
        let raw = self.page.evaluate(PAGE_STATE_JS).await?;
        let snapshot: Snapshot = match raw {
            serde_json::Value::Null => Snapshot::default(),
            serde_json::Value::String(text) => serde_json::from_str(&text)
                .map_err(|e| BrowserError::Script(format!("bad page snapshot: {}", e)))?,
            other => serde_json::from_value(other)
                .map_err(|e| BrowserError::Script(format!("bad page snapshot: {}", e)))?,
        };

        debug!(
            sections = snapshot.sections.len(),
            fields = snapshot.visible_fields.len(),
            form_completed = snapshot.form_completed,
            "captured page state"
        );

        Ok(PageState {
            sections: snapshot
                .sections
                .into_iter()
                .filter(|s| !s.name.trim().is_empty())
                .collect(),
            visible_fields: snapshot
                .visible_fields
                .into_iter()
                .filter(|f| !f.name.is_empty())
                .collect(),
            form_completed: snapshot.form_completed,
            completed_sections: completed.sections().iter().cloned().collect(),
            completed_fields: completed.fields().iter().cloned().collect(),
        })
    }

    /// Current body markup, untruncated.
    pub async fn body(&self) -> Result<String, BrowserError> {
        Ok(match self.page.evaluate(BODY_MARKUP_JS).await? {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Cut markup down to the configured budget for a prompt.
    pub fn fit(&self, raw: String) -> String {
        truncate_markup(raw, self.markup_max_chars)
    }
}

fn truncate_markup(raw: String, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}\n... [truncated, {} total chars]",
            &raw[..cut],
            raw.chars().count()
        ),
        None => raw,
    }
}
