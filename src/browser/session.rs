//! Browser session management
//!
//! Handles launching and controlling the Chrome instance that serves one
//! forum account. The session owns the engine process handle and the main
//! page; extra pages opened for topic visits are owned by their callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use uuid::Uuid;

use super::BrowserError;

/// Find Chrome/Chromium executable on the system
fn find_chrome() -> Option<std::path::PathBuf> {
    let candidates: Vec<std::path::PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            std::path::PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            std::path::PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(std::path::PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![std::path::PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            std::path::PathBuf::from("/usr/bin/chromium"),
            std::path::PathBuf::from("/usr/bin/chromium-browser"),
            std::path::PathBuf::from("/usr/bin/google-chrome"),
            std::path::PathBuf::from("/usr/bin/google-chrome-stable"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// Configuration for a browser session
#[derive(Debug, Clone)]
pub struct BrowserSessionConfig {
    /// Display label, normally the account username
    pub label: String,
    /// Path to Chrome/Chromium executable
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// User data directory
    pub user_data_dir: Option<String>,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            label: "session".to_string(),
            chrome_path: None,
            headless: true,
            user_data_dir: None,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl BrowserSessionConfig {
    /// Create config for one account with its own throwaway data directory.
    /// The directory is keyed by a UUID, not the username, so odd characters
    /// in credentials never end up in a filesystem path.
    pub fn for_account(label: &str) -> Self {
        let user_data_dir = std::env::temp_dir()
            .join("linuxdo-keeper")
            .join("browser_data")
            .join(Uuid::new_v4().to_string())
            .to_string_lossy()
            .to_string();

        Self {
            label: label.to_string(),
            user_data_dir: Some(user_data_dir),
            ..Default::default()
        }
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set Chrome path
    pub fn chrome_path(mut self, path: Option<String>) -> Self {
        self.chrome_path = path;
        self
    }
}

/// A browser session for one account's run
pub struct BrowserSession {
    /// Session ID (the account label)
    id: String,
    /// The browser instance
    browser: RwLock<Option<Browser>>,
    /// Main page used for login and the topic listing
    page: RwLock<Option<Page>>,
    /// Whether the engine is still connected
    alive: Arc<AtomicBool>,
    /// Topics read during this run
    topics_visited: AtomicU64,
    /// Likes given during this run
    likes_given: AtomicU64,
}

impl BrowserSession {
    /// Launch Chrome and adopt its initial tab as the main page.
    pub async fn new(config: BrowserSessionConfig) -> Result<Self, BrowserError> {
        info!(
            "Launching browser session {} (headless: {})",
            config.label, config.headless
        );

        if config.chrome_path.is_none() && find_chrome().is_none() {
            return Err(BrowserError::LaunchFailed(
                "Chrome/Chromium not found. Install Chrome or set LINUX_DO_CHROME.".to_string(),
            ));
        }

        let mut builder = BrowserConfig::builder();

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        } else if let Some(chrome_path) = find_chrome() {
            debug!("Auto-detected Chrome at: {}", chrome_path.display());
            builder = builder.chrome_executable(chrome_path);
        }

        if let Some(ref dir) = config.user_data_dir {
            std::fs::create_dir_all(dir)?;
            builder = builder.user_data_dir(dir);
        }

        builder = builder
            .window_size(config.window_width, config.window_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-default-browser-check")
            .arg("--disable-notifications")
            // Required when running as root (e.g., in Docker or on a VPS)
            .no_sandbox();

        let browser_config = builder
            .build()
            .map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // Drive the CDP event stream in the background; when it ends, Chrome
        // has disconnected or crashed.
        let label = config.label.clone();
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Session {} browser event: {:?}", label, event);
            }
            warn!("Session {} Chrome disconnected (event handler ended)", label);
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        // Chrome opens with one blank tab; take it as the main page and close
        // any extras.
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

            let main_page = if !pages.is_empty() {
                pages.remove(0)
            } else {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?
            };

            for extra_page in pages {
                debug!("Closing extra blank tab");
                let _ = extra_page.close().await;
            }

            main_page
        };

        info!("Browser session {} created", config.label);

        Ok(Self {
            id: config.label,
            browser: RwLock::new(Some(browser)),
            page: RwLock::new(Some(page)),
            alive,
            topics_visited: AtomicU64::new(0),
            likes_given: AtomicU64::new(0),
        })
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check if the engine is still connected
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Topics read so far
    pub fn topics_visited(&self) -> u64 {
        self.topics_visited.load(Ordering::Relaxed)
    }

    /// Likes given so far
    pub fn likes_given(&self) -> u64 {
        self.likes_given.load(Ordering::Relaxed)
    }

    pub fn record_topic_visit(&self) {
        self.topics_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_like(&self) {
        self.likes_given.fetch_add(1, Ordering::Relaxed);
    }

    /// Navigate the main page to a URL and wait for the load to settle.
    pub async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let page = self.page.read().await;
        let page = page
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))?;

        debug!("Session {} navigating to: {}", self.id, url);
        page.goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    /// Click an element on the main page by selector
    pub async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let page = self.page.read().await;
        let page = page
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))?;

        let element = page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;

        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(())
    }

    /// Type text into an element on the main page
    pub async fn type_into(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let page = self.page.read().await;
        let page = page
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))?;

        let element = page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;

        element
            .click()
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(())
    }

    /// Poll the main page until `selector` matches an element or the timeout
    /// elapses. This is the only operation in the system with an explicit
    /// deadline; everything else blocks until the engine answers.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let page = self
            .page
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))?;

        let poll = async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            BrowserError::Timeout(format!(
                "{} not visible after {}s",
                selector,
                timeout.as_secs()
            ))
        })?;

        Ok(())
    }

    /// Execute JavaScript on the main page and return its JSON value.
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let page = self.page.read().await;
        let page = page
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("No active page".into()))?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::JavaScriptError(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Open a fresh tab at `url` and wait for it to load. The caller owns the
    /// page and must close it on every exit path.
    pub async fn open_page(&self, url: &str) -> Result<Page, BrowserError> {
        let browser = self.browser.read().await;
        let browser = browser
            .as_ref()
            .ok_or_else(|| BrowserError::ConnectionLost("Browser already closed".into()))?;

        debug!("Session {} opening page: {}", self.id, url);
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        Ok(page)
    }

    /// Close the browser session. Safe to call after a failed run; subsequent
    /// calls are no-ops.
    pub async fn close(&self) -> Result<(), BrowserError> {
        // Mark as not alive first to prevent new operations
        self.alive.store(false, Ordering::Relaxed);

        {
            let mut page = self.page.write().await;
            if let Some(p) = page.take() {
                let _ = p.close().await;
            }
        }

        {
            let mut browser = self.browser.write().await;
            if let Some(mut b) = browser.take() {
                // Graceful close first, brief grace period for Chrome child
                // processes to exit, then force kill so nothing is left behind.
                let _ = b.close().await;
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = b.kill().await;
            }
        }

        info!("Browser session {} closed", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_account_uses_unique_data_dirs() {
        let a = BrowserSessionConfig::for_account("alice");
        let b = BrowserSessionConfig::for_account("alice");
        assert_eq!(a.label, "alice");
        assert!(a.user_data_dir.is_some());
        assert_ne!(a.user_data_dir, b.user_data_dir);
    }

    #[test]
    fn builder_setters_apply() {
        let config = BrowserSessionConfig::for_account("bob")
            .headless(false)
            .chrome_path(Some("/opt/chrome".to_string()));
        assert!(!config.headless);
        assert_eq!(config.chrome_path.as_deref(), Some("/opt/chrome"));
    }
}
