use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::BrowserError;
use crate::page::{Located, PageDriver, SessionFactory};

#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub headless: bool,
    pub window_size: (u32, u32),
    /// Falls back to headless_chrome's executable discovery when unset.
    pub chrome_path: Option<PathBuf>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1366, 768),
            chrome_path: std::env::var_os("CHROME_PATH").map(PathBuf::from),
        }
    }
}

/// One Chrome process with a single tab. Dropping it closes the browser.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
    locate_seq: AtomicU64,
}

impl ChromeSession {
    /// Blocking; call from `spawn_blocking`.
    pub fn launch(settings: &LaunchSettings) -> anyhow::Result<Self> {
        let options = LaunchOptions {
            headless: settings.headless,
            path: settings.chrome_path.clone(),
            window_size: Some(settings.window_size),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
            ],
            // agent turns can sit on the oracle for a while
            idle_browser_timeout: Duration::from_secs(10 * 60),
            ..Default::default()
        };

        debug!(headless = settings.headless, "starting Chrome");
        let browser = Browser::new(options)
            .map_err(|e| anyhow::anyhow!("Browser launch failed: {}", e))?;
        let tab = browser.new_tab()?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
            locate_seq: AtomicU64::new(0),
        })
    }

    /// Run a blocking tab operation off the async runtime.
    async fn blocking<T, F>(&self, wrap: fn(String) -> BrowserError, f: F) -> Result<T, BrowserError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| BrowserError::Session(format!("browser task panicked: {}", e)))?
            .map_err(|e| wrap(format!("{:#}", e)))
    }
}

/// Quote a Rust string as a JavaScript string literal.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[derive(Deserialize)]
struct LocateResult {
    visible: bool,
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let url = url.to_string();
        let nav = self.blocking(BrowserError::Navigation, move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            Ok(())
        });
        tokio::time::timeout(timeout, nav)
            .await
            .map_err(|_| BrowserError::Timeout(timeout))?
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let script = script.to_string();
        self.blocking(BrowserError::Script, move |tab| {
            let result = tab.evaluate(&script, false)?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        self.blocking(BrowserError::ElementNotFound, move |tab| {
            tab.find_element(&selector)?.click()?;
            Ok(())
        })
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        let value = value.to_string();
        self.blocking(BrowserError::ElementNotFound, move |tab| {
            tab.find_element(&selector)?.click()?;
            tab.evaluate(
                &format!(
                    "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
                    js_str(&selector)
                ),
                false,
            )?;
            tab.type_str(&value)?;
            Ok(())
        })
        .await
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let script = format!(
            r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  const want = {val};
  const opts = el.options ? [...el.options] : [];
  const opt = opts.find(o => o.value === want || o.text.trim() === want);
  el.value = opt ? opt.value : want;
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
            sel = js_str(selector),
            val = js_str(value),
        );
        match self.evaluate(&script).await? {
            serde_json::Value::Bool(true) => Ok(()),
            _ => Err(BrowserError::ElementNotFound(selector.to_string())),
        }
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<(), BrowserError> {
        let selector = selector.to_string();
        self.blocking(BrowserError::ElementNotFound, move |tab| {
            tab.wait_for_element(&selector)?;
            Ok(())
        })
        .await
    }

    async fn locate_by_text(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Option<Located>, BrowserError> {
        let marker = self.locate_seq.fetch_add(1, Ordering::Relaxed).to_string();
        let script = format!(
            r#"(() => {{
  const want = {text};
  const el = [...document.querySelectorAll({sel})]
    .find(e => (e.textContent || '').includes(want));
  if (!el) return null;
  el.setAttribute('data-fp-locate', {marker});
  return JSON.stringify({{ visible: el.offsetParent !== null }});
}})()"#,
            text = js_str(text),
            sel = js_str(selector),
            marker = js_str(&marker),
        );

        let raw = match self.evaluate(&script).await? {
            serde_json::Value::String(raw) => raw,
            _ => return Ok(None),
        };
        let found: LocateResult =
            serde_json::from_str(&raw).map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(Some(Located {
            selector: format!("[data-fp-locate=\"{}\"]", marker),
            visible: found.visible,
        }))
    }
}

/// Launches a fresh Chrome for every job.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    settings: LaunchSettings,
}

impl ChromeLauncher {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for ChromeLauncher {
    async fn open(&self) -> Result<Arc<dyn PageDriver>, BrowserError> {
        let settings = self.settings.clone();
        let session = tokio::task::spawn_blocking(move || ChromeSession::launch(&settings))
            .await
            .map_err(|e| BrowserError::Launch(format!("browser launch panicked: {}", e)))?
            .map_err(|e| BrowserError::Launch(format!("{:#}", e)))?;
        Ok(Arc::new(session))
    }
}
