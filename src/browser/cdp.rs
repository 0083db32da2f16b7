//! Chrome DevTools Protocol implementation of the page driver

use super::{js_string, BrowserSession, PageDriver, STEALTH_SCRIPTS};
use crate::config::BrowserSettings;
use crate::{BrowserError, BrowserResult};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Settings each new tab is prepared with
#[derive(Debug, Clone)]
struct PageSetup {
    user_agent: String,
    stealth: bool,
    nav_timeout: Duration,
}

/// A launched (or attached) Chrome instance
pub struct CdpSession {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
    setup: PageSetup,
}

impl CdpSession {
    /// Launches Chrome, or attaches to `remote_url` when configured
    ///
    /// # Arguments
    ///
    /// * `settings` - Browser section of the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CdpSession)` - Browser is up and its event handler is running
    /// * `Err(BrowserError::Launch)` - Chrome could not be started or reached
    pub async fn open(settings: &BrowserSettings) -> BrowserResult<Self> {
        let (browser, mut handler) = match &settings.remote_url {
            Some(ws_url) => {
                info!("Connecting to remote browser at {}", ws_url);
                Browser::connect(ws_url.clone())
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?
            }
            None => {
                info!("Launching browser (headless={})", settings.headless);
                Browser::launch(launch_config(settings)?)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
            setup: PageSetup {
                user_agent: settings.user_agent.clone(),
                stealth: settings.stealth,
                nav_timeout: Duration::from_secs(settings.page_timeout_secs),
            },
        })
    }
}

fn launch_config(settings: &BrowserSettings) -> BrowserResult<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .window_size(settings.window_width, settings.window_height)
        .request_timeout(Duration::from_secs(settings.page_timeout_secs));

    if !settings.headless {
        builder = builder.with_head();
    }
    if let Some(path) = &settings.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    builder = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--lang=zh-TW");

    for arg in &settings.chrome_args {
        builder = builder.arg(arg.clone());
    }

    builder.build().map_err(BrowserError::Launch)
}

async fn prepare_page(browser: &Arc<Mutex<Browser>>, setup: &PageSetup) -> BrowserResult<CdpPage> {
    let page = browser
        .lock()
        .await
        .new_page("about:blank")
        .await
        .map_err(protocol)?;

    page.execute(SetUserAgentOverrideParams::new(setup.user_agent.clone()))
        .await
        .map_err(protocol)?;

    if setup.stealth {
        for script in STEALTH_SCRIPTS {
            if let Err(e) = page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
                .await
            {
                warn!("Failed to register stealth script: {}", e);
            }
        }
    }

    Ok(CdpPage {
        page: Some(page),
        browser: Arc::clone(browser),
        setup: setup.clone(),
    })
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn new_page(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        let page = prepare_page(&self.browser, &self.setup).await?;
        Ok(Box::new(page))
    }

    async fn shutdown(self: Box<Self>) -> BrowserResult<()> {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                debug!("Browser close returned: {}", e);
            }
            let _ = browser.wait().await;
        }
        self.handler.abort();
        Ok(())
    }
}

/// One Chrome tab
pub struct CdpPage {
    page: Option<Page>,
    browser: Arc<Mutex<Browser>>,
    setup: PageSetup,
}

impl CdpPage {
    fn page(&self) -> BrowserResult<&Page> {
        self.page.as_ref().ok_or(BrowserError::PageClosed)
    }

    async fn eval_value<T: serde::de::DeserializeOwned>(&self, script: String) -> BrowserResult<T> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        let timeout = self.setup.nav_timeout;
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.page()?.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn title(&mut self) -> BrowserResult<String> {
        Ok(self
            .page()?
            .get_title()
            .await
            .map_err(protocol)?
            .unwrap_or_default())
    }

    async fn content(&mut self) -> BrowserResult<String> {
        self.page()?.content().await.map_err(protocol)
    }

    async fn count(&mut self, selector: &str) -> BrowserResult<usize> {
        self.eval_value(format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        ))
        .await
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<bool> {
        self.click_nth(selector, 0).await
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> BrowserResult<bool> {
        let elements = match self.page()?.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(false),
        };
        let Some(element) = elements.get(index) else {
            return Ok(false);
        };

        let _ = element.scroll_into_view().await;
        if element.click().await.is_ok() {
            return Ok(true);
        }

        // Covered or zero-sized elements refuse a pointer click; fall back to a DOM click
        self.eval_value(format!(
            "(() => {{ const el = document.querySelectorAll({})[{}]; if (!el) return false; el.click(); return true; }})()",
            js_string(selector),
            index
        ))
        .await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<bool> {
        let page = self.page()?;
        let element = match page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element.click().await.map_err(protocol)?;
        page.evaluate(format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
            js_string(selector)
        ))
        .await
        .map_err(|e| BrowserError::Script(e.to_string()))?;
        element.type_str(value).await.map_err(protocol)?;
        Ok(true)
    }

    async fn scroll_to_bottom(&mut self) -> BrowserResult<()> {
        self.evaluate("window.scrollTo(0, document.documentElement.scrollHeight);")
            .await
    }

    async fn press_escape(&mut self) -> BrowserResult<()> {
        let body = self.page()?.find_element("body").await.map_err(protocol)?;
        body.press_key("Escape").await.map_err(protocol)?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<()> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(())
    }

    async fn open_sibling(&mut self) -> BrowserResult<Box<dyn PageDriver>> {
        let page = prepare_page(&self.browser, &self.setup).await?;
        Ok(Box::new(page))
    }

    async fn close(mut self: Box<Self>) -> BrowserResult<()> {
        if let Some(page) = self.page.take() {
            page.close().await.map_err(protocol)?;
        }
        Ok(())
    }
}
