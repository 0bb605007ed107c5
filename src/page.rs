use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

/// An element found by visible text, addressable through `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub selector: String,
    pub visible: bool,
}

/// The browser operations the agent needs from a live page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Run a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Replace the element's current content with `value`.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    async fn wait_for_selector(&self, selector: &str) -> Result<(), BrowserError>;

    /// First element matching `selector` whose text contains `text`.
    async fn locate_by_text(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Option<Located>, BrowserError>;
}

/// Opens one fresh browser page per call. The page is released when the last handle drops.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn PageDriver>, BrowserError>;
}
