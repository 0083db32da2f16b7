//! Browser session and page driving
//!
//! Adapters and the authentication controller talk to the browser only
//! through the object-safe `PageDriver` and `BrowserSession` traits. The
//! production implementation drives Chrome over the DevTools protocol
//! (`cdp`); `scripted` serves canned pages from memory.
//!
//! Extraction never happens through the driver: adapters take an HTML
//! snapshot with `content()` and parse it with `scraper`, so the driver
//! surface stays small (navigate, count, click, type, scroll, evaluate).

mod cdp;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
mod stealth;

pub use cdp::{CdpPage, CdpSession};
pub use stealth::STEALTH_SCRIPTS;

use crate::BrowserResult;
use async_trait::async_trait;
use std::time::Duration;

/// One open browser tab
#[async_trait]
pub trait PageDriver: Send {
    /// Navigates and waits for the document to become interactive
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;

    /// Current location of the tab
    async fn current_url(&mut self) -> BrowserResult<String>;

    /// Current document title
    async fn title(&mut self) -> BrowserResult<String>;

    /// Serialized HTML of the current document
    async fn content(&mut self) -> BrowserResult<String>;

    /// Number of elements matching a CSS selector
    async fn count(&mut self, selector: &str) -> BrowserResult<usize>;

    /// Clicks the first match; `Ok(false)` when nothing matches
    async fn click(&mut self, selector: &str) -> BrowserResult<bool>;

    /// Scrolls the `index`-th match into view and clicks it
    async fn click_nth(&mut self, selector: &str, index: usize) -> BrowserResult<bool>;

    /// Replaces the value of the first matching input by typing into it
    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<bool>;

    /// Scrolls to the bottom of the document to trigger lazy loading
    async fn scroll_to_bottom(&mut self) -> BrowserResult<()>;

    /// Sends an Escape key press to the document
    async fn press_escape(&mut self) -> BrowserResult<()>;

    /// Runs a script for its side effects
    async fn evaluate(&mut self, script: &str) -> BrowserResult<()>;

    /// Opens another tab in the same browser context
    async fn open_sibling(&mut self) -> BrowserResult<Box<dyn PageDriver>>;

    /// Closes the tab
    async fn close(self: Box<Self>) -> BrowserResult<()>;

    /// Polls until `selector` matches or `timeout` elapses
    ///
    /// Returns whether the selector appeared. Transient script errors while
    /// the page is mid-navigation count as "not yet".
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if matches!(self.count(selector).await, Ok(n) if n > 0) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }
}

/// Interval between polls in `PageDriver::wait_for`
pub const WAIT_POLL: Duration = Duration::from_millis(250);

/// The run's single browser context
#[async_trait]
pub trait BrowserSession: Send {
    /// Opens a fresh tab
    async fn new_page(&mut self) -> BrowserResult<Box<dyn PageDriver>>;

    /// Closes the browser
    async fn shutdown(self: Box<Self>) -> BrowserResult<()>;
}

/// Quotes a string for embedding in a script
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
