//! Chromium-based browser using chromiumoxide.

use super::{BrowserLauncher, BrowserProcess, NavigationResult, NetworkIdle, PageContext};
use crate::config::AuditConfig;
use crate::error::AcquisitionError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a graceful close may take before the process is killed.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Find the Chromium binary path.
///
/// An explicit path wins and is not second-guessed: if it does not exist,
/// no other location is tried.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Explicit path (config or WCAG_AUDIT_CHROMIUM_PATH)
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    // 2. Per-user cache
    if let Some(cache) = dirs::cache_dir() {
        let base = cache.join("wcag-audit/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                base.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                base.join("chrome"),
            ]
        } else {
            vec![base.join("chrome-linux64/chrome"), base.join("chrome")]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome-headless-shell",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one headless Chromium per call, each with its own profile.
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    viewport: (u32, u32),
}

impl ChromiumLauncher {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            executable: config.chromium_path.clone(),
            viewport: config.viewport,
        }
    }

    /// The executable a launch would use right now.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        find_chromium(self.executable.as_deref())
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, AcquisitionError> {
        let chrome_path = self.resolve_executable().ok_or_else(|| {
            AcquisitionError::BrowserUnavailable(match &self.executable {
                Some(p) => format!("Chromium not found at {}", p.display()),
                None => "no Chromium executable found; set WCAG_AUDIT_CHROMIUM_PATH".to_string(),
            })
        })?;

        let profile = tempfile::Builder::new()
            .prefix("wcag-audit-chromium-")
            .tempdir()
            .map_err(|e| AcquisitionError::Launch(format!("failed to create profile dir: {e}")))?;

        let (width, height) = self.viewport;
        let config = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .user_data_dir(profile.path())
            .window_size(width, height)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AcquisitionError::Launch(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AcquisitionError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e}");
                }
            }
        });

        info!(executable = %chrome_path.display(), "Chromium launched");

        Ok(Box::new(ChromiumProcess {
            browser,
            handler,
            _profile: profile,
        }))
    }
}

/// A running Chromium process and its CDP handler task.
pub struct ChromiumProcess {
    browser: Browser,
    handler: JoinHandle<()>,
    // Removed from disk once the process is gone.
    _profile: tempfile::TempDir,
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    async fn new_page(&self) -> Result<Box<dyn PageContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn terminate(self: Box<Self>) -> Result<()> {
        let mut this = *self;

        let closed = match tokio::time::timeout(CLOSE_GRACE, this.browser.close()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("graceful browser close failed: {e}");
                false
            }
            Err(_) => {
                warn!("browser did not close within {}ms", CLOSE_GRACE.as_millis());
                false
            }
        };

        if !closed {
            if let Some(Err(e)) = this.browser.kill().await {
                this.handler.abort();
                return Err(anyhow!("failed to kill browser process: {e}"));
            }
        }

        match tokio::time::timeout(CLOSE_GRACE, this.browser.wait()).await {
            Ok(Ok(status)) => debug!(?status, "browser process exited"),
            Ok(Err(e)) => debug!("waiting for browser exit failed: {e}"),
            Err(_) => warn!("browser process still running after close"),
        }

        this.handler.abort();
        Ok(())
    }
}

/// Aborts a spawned task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Subscribe to network events and track when the request count last
    /// dropped to `max_inflight` or below. `None` while above it.
    async fn track_network(
        &self,
        max_inflight: usize,
    ) -> Result<(AbortOnDrop, watch::Receiver<Option<Instant>>)> {
        let mut sent = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to subscribe to request events")?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("failed to subscribe to loading events")?;
        let mut failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .context("failed to subscribe to loading failures")?;

        let (tx, rx) = watch::channel(Some(Instant::now()));

        let task = tokio::spawn(async move {
            let mut pending: HashSet<String> = HashSet::new();
            loop {
                tokio::select! {
                    Some(ev) = sent.next() => {
                        pending.insert(ev.request_id.inner().clone());
                    }
                    Some(ev) = finished.next() => {
                        pending.remove(ev.request_id.inner());
                    }
                    Some(ev) = failed.next() => {
                        pending.remove(ev.request_id.inner());
                    }
                    else => break,
                }
                let idle = pending.len() <= max_inflight;
                tx.send_if_modified(|since| match (idle, since.is_some()) {
                    (true, false) => {
                        *since = Some(Instant::now());
                        true
                    }
                    (false, true) => {
                        *since = None;
                        true
                    }
                    _ => false,
                });
            }
        });

        Ok((AbortOnDrop(task), rx))
    }
}

/// Resolve once the network has been idle for `quiet`.
async fn wait_for_idle(mut idle_since: watch::Receiver<Option<Instant>>, quiet: Duration) {
    loop {
        let since = *idle_since.borrow_and_update();
        match since {
            Some(t) => {
                let elapsed = t.elapsed();
                if elapsed >= quiet {
                    return;
                }
                tokio::select! {
                    _ = tokio::time::sleep(quiet - elapsed) => {}
                    changed = idle_since.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            None => {
                if idle_since.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl PageContext for ChromiumPage {
    async fn navigate(&mut self, url: &str, idle: NetworkIdle) -> Result<NavigationResult> {
        let start = Instant::now();

        let (_tracker, idle_since) = self.track_network(idle.max_inflight).await?;

        self.page
            .goto(url)
            .await
            .with_context(|| format!("failed to load {url}"))?;

        wait_for_idle(idle_since, idle.quiet_period).await;

        let final_url = self
            .page
            .url()
            .await
            .unwrap_or_default()
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn add_script(&self, source: &str) -> Result<()> {
        let literal = serde_json::to_string(source)?;
        let expression = format!(
            "(() => {{ const s = document.createElement('script'); s.textContent = {literal}; \
             (document.head || document.documentElement).appendChild(s); return true; }})()"
        );
        self.evaluate(&expression).await.map(|_| ())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("invalid evaluation params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }
}
