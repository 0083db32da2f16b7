//! In-memory page driver
//!
//! `ScriptedBrowser` serves canned HTML per URL and lets callers attach
//! hooks to clicks, scrolls and the passage of time, so adapter and
//! authentication flows can run without Chrome. Every page opened from one
//! browser shares its routes, hooks and journal; each page keeps its own
//! view (URL, title, HTML).
//!
//! Selector counting uses `scraper`, so a selector that matches in a
//! fixture matches exactly as it would during extraction.

use super::{BrowserSession, PageDriver};
use crate::{BrowserError, BrowserResult};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// What one scripted tab is currently showing
#[derive(Debug, Clone, Default)]
pub struct PageView {
    pub url: String,
    pub title: String,
    pub html: String,
}

/// Callback run against a page view
///
/// The `usize` argument is the element index for clicks, the running scroll
/// count for scrolls, and zero otherwise.
pub type Hook = Box<dyn FnMut(&mut PageView, usize) + Send>;

/// Everything the driver was asked to do
#[derive(Debug, Clone, Default)]
pub struct Journal {
    pub visited: Vec<String>,
    pub clicked: Vec<String>,
    pub filled: Vec<(String, String)>,
    pub evaluated: Vec<String>,
    pub scrolls: usize,
    pub escapes: usize,
    pub pages_opened: usize,
}

#[derive(Default)]
struct Shared {
    routes: HashMap<String, (String, String)>,
    broken: Vec<String>,
    click_hooks: HashMap<String, Hook>,
    scroll_hook: Option<Hook>,
    tick_hook: Option<Hook>,
    escape_hook: Option<Hook>,
    journal: Journal,
}

/// Browser whose pages are served from memory
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serves `html` with `title` whenever `url` is visited
    pub fn route(&self, url: &str, title: &str, html: &str) {
        self.lock()
            .routes
            .insert(url.to_string(), (title.to_string(), html.to_string()));
    }

    /// Makes navigation to any URL containing `fragment` fail
    pub fn break_route(&self, fragment: &str) {
        self.lock().broken.push(fragment.to_string());
    }

    pub fn on_click(&self, selector: &str, hook: impl FnMut(&mut PageView, usize) + Send + 'static) {
        self.lock()
            .click_hooks
            .insert(selector.to_string(), Box::new(hook));
    }

    pub fn on_scroll(&self, hook: impl FnMut(&mut PageView, usize) + Send + 'static) {
        self.lock().scroll_hook = Some(Box::new(hook));
    }

    /// Runs before every read of the page, e.g. to make a change appear after a delay
    pub fn on_tick(&self, hook: impl FnMut(&mut PageView, usize) + Send + 'static) {
        self.lock().tick_hook = Some(Box::new(hook));
    }

    pub fn on_escape(&self, hook: impl FnMut(&mut PageView, usize) + Send + 'static) {
        self.lock().escape_hook = Some(Box::new(hook));
    }

    /// Snapshot of the actions recorded so far
    pub fn journal(&self) -> Journal {
        self.lock().journal.clone()
    }

    pub fn page(&self) -> ScriptedPage {
        ScriptedPage {
            view: PageView::default(),
            browser: self.clone(),
        }
    }
}

#[async_trait]
impl BrowserSession for ScriptedBrowser {
    async fn new_page(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        self.lock().journal.pages_opened += 1;
        Ok(Box::new(self.page()))
    }

    async fn shutdown(self: Box<Self>) -> BrowserResult<()> {
        Ok(())
    }
}

/// One scripted tab
pub struct ScriptedPage {
    view: PageView,
    browser: ScriptedBrowser,
}

impl ScriptedPage {
    pub fn view(&self) -> &PageView {
        &self.view
    }

    fn tick(&mut self) {
        let mut shared = self.browser.lock();
        if let Some(hook) = shared.tick_hook.as_mut() {
            hook(&mut self.view, 0);
        }
    }

    fn count_now(&self, selector: &str) -> BrowserResult<usize> {
        let parsed = Selector::parse(selector)
            .map_err(|e| BrowserError::Script(format!("bad selector {}: {:?}", selector, e)))?;
        let document = Html::parse_document(&self.view.html);
        Ok(document.select(&parsed).count())
    }

    fn run_click(&mut self, selector: &str, index: usize) -> BrowserResult<bool> {
        self.tick();
        let mut shared = self.browser.lock();
        shared.journal.clicked.push(selector.to_string());
        if let Some(hook) = shared.click_hooks.get_mut(selector) {
            hook(&mut self.view, index);
            return Ok(true);
        }
        drop(shared);
        Ok(self.count_now(selector)? > index)
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        let mut guard = self.browser.lock();
        let shared = &mut *guard;
        shared.journal.visited.push(url.to_string());

        if shared.broken.iter().any(|fragment| url.contains(fragment.as_str())) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "scripted failure".to_string(),
            });
        }

        let (title, html) = shared
            .routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| (String::new(), "<html><body></body></html>".to_string()));
        self.view = PageView {
            url: url.to_string(),
            title,
            html,
        };
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        self.tick();
        Ok(self.view.url.clone())
    }

    async fn title(&mut self) -> BrowserResult<String> {
        self.tick();
        Ok(self.view.title.clone())
    }

    async fn content(&mut self) -> BrowserResult<String> {
        self.tick();
        Ok(self.view.html.clone())
    }

    async fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        self.tick();
        self.count_now(selector)
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<bool> {
        self.run_click(selector, 0)
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> BrowserResult<bool> {
        self.run_click(selector, index)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<bool> {
        self.tick();
        if self.count_now(selector)? == 0 {
            return Ok(false);
        }
        self.browser
            .lock()
            .journal
            .filled
            .push((selector.to_string(), value.to_string()));
        Ok(true)
    }

    async fn scroll_to_bottom(&mut self) -> BrowserResult<()> {
        let mut shared = self.browser.lock();
        shared.journal.scrolls += 1;
        let scrolls = shared.journal.scrolls;
        if let Some(hook) = shared.scroll_hook.as_mut() {
            hook(&mut self.view, scrolls);
        }
        Ok(())
    }

    async fn press_escape(&mut self) -> BrowserResult<()> {
        let mut shared = self.browser.lock();
        shared.journal.escapes += 1;
        if let Some(hook) = shared.escape_hook.as_mut() {
            hook(&mut self.view, 0);
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<()> {
        self.browser.lock().journal.evaluated.push(script.to_string());
        Ok(())
    }

    async fn open_sibling(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        self.browser.lock().journal.pages_opened += 1;
        Ok(Box::new(self.browser.page()))
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        Ok(())
    }
}
