#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use form_pilot::dom::{BODY_MARKUP_JS, PAGE_STATE_JS};
use form_pilot::types::ValueMapping;
use form_pilot::{BrowserError, Located, Oracle, OracleError, PageDriver, SessionFactory};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Click(String),
    Fill(String, String),
    Select(String, String),
    Wait(String),
}

/// In-memory page: replays scripted snapshots and records every primitive.
#[derive(Default)]
pub struct FakePage {
    snapshots: Mutex<VecDeque<Value>>,
    last_snapshot: Mutex<Value>,
    markup: Mutex<String>,
    sections: Mutex<Vec<(String, bool)>>,
    ops: Mutex<Vec<Op>>,
    navigations: Mutex<Vec<String>>,
    locates: Mutex<Vec<String>>,
    nav_failures_left: AtomicUsize,
    captures: AtomicUsize,
    capture_delay: Mutex<Duration>,
}

impl FakePage {
    pub fn new(snapshots: Vec<Value>) -> Arc<Self> {
        let page = Self::default();
        *page.last_snapshot.lock().unwrap() = snapshots.last().cloned().unwrap_or(Value::Null);
        *page.snapshots.lock().unwrap() = snapshots.into();
        *page.markup.lock().unwrap() = "<form></form>".to_string();
        Arc::new(page)
    }

    /// A page whose very first snapshot already reports success.
    pub fn completed() -> Arc<Self> {
        Self::new(vec![snapshot(&[], &[], true)])
    }

    pub fn set_markup(&self, markup: &str) {
        *self.markup.lock().unwrap() = markup.to_string();
    }

    pub fn add_section_control(&self, name: &str, visible: bool) {
        self.sections.lock().unwrap().push((name.to_string(), visible));
    }

    pub fn fail_navigations(&self, count: usize) {
        self.nav_failures_left.store(count, Ordering::SeqCst);
    }

    /// Every snapshot takes `delay` before it returns.
    pub fn stall_captures(&self, delay: Duration) {
        *self.capture_delay.lock().unwrap() = delay;
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn locates(&self) -> Vec<String> {
        self.locates.lock().unwrap().clone()
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.navigations.lock().unwrap().push(url.to_string());
        let left = self.nav_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.nav_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(BrowserError::Navigation(format!("{} unreachable", url)));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        if script == PAGE_STATE_JS {
            self.captures.fetch_add(1, Ordering::SeqCst);
            let delay = *self.capture_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let next = self.snapshots.lock().unwrap().pop_front();
            return Ok(next.unwrap_or_else(|| self.last_snapshot.lock().unwrap().clone()));
        }
        if script == BODY_MARKUP_JS {
            return Ok(Value::String(self.markup.lock().unwrap().clone()));
        }
        Ok(Value::Null)
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.record(Op::Click(selector.to_string()));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.record(Op::Fill(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.record(Op::Select(selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<(), BrowserError> {
        self.record(Op::Wait(selector.to_string()));
        Ok(())
    }

    async fn locate_by_text(
        &self,
        _selector: &str,
        text: &str,
    ) -> Result<Option<Located>, BrowserError> {
        self.locates.lock().unwrap().push(text.to_string());
        Ok(self
            .sections
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name.contains(text))
            .map(|(name, visible)| Located {
                selector: format!("#section-{}", name),
                visible: *visible,
            }))
    }
}

/// Hands out the same fake page for every session.
pub struct FakeSessions {
    pub page: Arc<FakePage>,
    pub opened: AtomicUsize,
}

impl FakeSessions {
    pub fn new(page: Arc<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            opened: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(&self) -> Result<Arc<dyn PageDriver>, BrowserError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.clone())
    }
}

/// Oracle with two reply queues: execution-plan prompts (which ask for a
/// `"command"`) and decision prompts (everything else).
///
/// An empty plan queue answers with a generic fill; an empty decision queue
/// fails the call.
#[derive(Default)]
pub struct ScriptedOracle {
    decisions: Mutex<VecDeque<Result<String, OracleError>>>,
    plans: Mutex<VecDeque<String>>,
    decision_prompts: Mutex<Vec<String>>,
    plan_prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn decide(&self, reply: &str) -> &Self {
        self.decisions.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn decide_err(&self, error: OracleError) -> &Self {
        self.decisions.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn plan(&self, reply: &str) -> &Self {
        self.plans.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn decision_prompts(&self) -> Vec<String> {
        self.decision_prompts.lock().unwrap().clone()
    }

    pub fn plan_prompts(&self) -> Vec<String> {
        self.plan_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        if prompt.contains("\"command\"") {
            self.plan_prompts.lock().unwrap().push(prompt.to_string());
            let reply = self.plans.lock().unwrap().pop_front();
            return Ok(reply.unwrap_or_else(|| {
                r##"{"command":"fill","selector":"#field","value":"x","reason":"test"}"##.to_string()
            }));
        }

        self.decision_prompts.lock().unwrap().push(prompt.to_string());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Transport("no scripted decision".into())))
    }
}

/// Build a page snapshot as the in-page script would report it.
/// `fields` are (name, value, visible); `sections` are (name, open).
pub fn snapshot(fields: &[(&str, &str, bool)], sections: &[(&str, bool)], completed: bool) -> Value {
    json!({
        "sections": sections
            .iter()
            .map(|(name, open)| json!({"name": name, "isOpen": open}))
            .collect::<Vec<_>>(),
        "visibleFields": fields
            .iter()
            .map(|(name, value, visible)| json!({
                "name": name,
                "type": "text",
                "value": value,
                "isVisible": visible,
            }))
            .collect::<Vec<_>>(),
        "formCompleted": completed,
    })
}

pub fn values(pairs: &[(&str, &str)]) -> ValueMapping {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
