//! Authentication controller
//!
//! Drives one site family's login through the `AuthState` machine:
//! probe for an existing session, reveal and fill the login form, then wait
//! a bounded time for a human operator to clear any challenge. The wait
//! always ends, either signed in or degraded to guest access.
//!
//! Credentials are held in `Credentials`, whose `Debug` output is redacted;
//! the password is only ever typed into the page, never logged or shown in
//! the operator banner.

mod flows;

pub use flows::{LoginFlow, SignedInProbe};

use crate::browser::PageDriver;
use crate::config::AuthConfig;
use crate::record::SiteFamily;
use crate::state::{AuthEvent, AuthState};
use crate::Result;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Login for one family
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Timing bounds for one login attempt
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    /// How long the login form may take to render
    pub form_timeout: Duration,

    /// How long the operator has to clear a challenge
    pub challenge_timeout: Duration,

    /// Interval between signed-in probes while waiting
    pub poll_interval: Duration,
}

impl From<&AuthConfig> for AuthPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            form_timeout: Duration::from_secs(config.form_timeout_secs),
            challenge_timeout: Duration::from_secs(config.challenge_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Result of one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Terminal state: `Authenticated` or `GuestFallback`
    pub state: AuthState,

    /// Every state visited, starting with `Unauthenticated`
    pub trace: Vec<AuthState>,
}

/// Tracks the machine and its trace for one attempt
struct Attempt {
    family: SiteFamily,
    state: AuthState,
    trace: Vec<AuthState>,
}

impl Attempt {
    fn new(family: SiteFamily) -> Self {
        Self {
            family,
            state: AuthState::Unauthenticated,
            trace: vec![AuthState::Unauthenticated],
        }
    }

    fn step(&mut self, event: AuthEvent) -> Result<()> {
        let next = self.state.on(event)?;
        debug!("{} auth: {} --{:?}--> {}", self.family, self.state, event, next);
        self.state = next;
        self.trace.push(next);
        Ok(())
    }

    fn finish(self) -> AuthOutcome {
        AuthOutcome {
            state: self.state,
            trace: self.trace,
        }
    }
}

/// Runs the login flow for `family` on `page`
///
/// # Arguments
///
/// * `page` - Tab to log in with; left on whatever page the flow ends on
/// * `family` - Family being authenticated (for logging and the banner)
/// * `flow` - Selectors and URLs of the family's login
/// * `credentials` - Optional credentials; without them the operator logs in by hand
/// * `policy` - Timing bounds
///
/// # Returns
///
/// * `Ok(AuthOutcome)` - The attempt reached `Authenticated` or `GuestFallback`
/// * `Err(SweepError)` - Navigation to the login page failed
pub async fn authenticate(
    page: &mut dyn PageDriver,
    family: SiteFamily,
    flow: &LoginFlow,
    credentials: Option<&Credentials>,
    policy: &AuthPolicy,
) -> Result<AuthOutcome> {
    let mut attempt = Attempt::new(family);

    info!("Authenticating {} via {}", family, flow.login_url);
    page.goto(flow.login_url).await?;

    if let Some(marker) = flow.interstitial_title {
        wait_out_interstitial(page, family, marker, policy).await;
    }

    if is_signed_in(page, &flow.probe).await {
        attempt.step(AuthEvent::AlreadySignedIn)?;
        info!("{} session already signed in", family);
        return Ok(attempt.finish());
    }

    for opener in flow.openers {
        if page.wait_for(opener, policy.form_timeout).await? {
            page.click(opener).await?;
        } else {
            debug!("{} login opener {} not found", family, opener);
        }
    }

    if !page.wait_for(flow.username_field, policy.form_timeout).await? {
        warn!("{} login form did not appear", family);
        attempt.step(AuthEvent::FormUnavailable)?;
        return await_operator(page, attempt, flow, policy).await;
    }
    attempt.step(AuthEvent::FormShown)?;

    let Some(credentials) = credentials else {
        info!(
            "No credentials configured for {}; waiting for manual login",
            family
        );
        attempt.step(AuthEvent::CredentialsUnavailable)?;
        return await_operator(page, attempt, flow, policy).await;
    };

    let typed_user = page.fill(flow.username_field, credentials.username()).await?;
    let typed_pass = page.fill(flow.password_field, credentials.password()).await?;
    if !(typed_user && typed_pass) {
        warn!("{} login fields could not be filled", family);
        attempt.step(AuthEvent::CredentialsUnavailable)?;
        return await_operator(page, attempt, flow, policy).await;
    }
    page.click(flow.submit).await?;
    attempt.step(AuthEvent::CredentialsEntered)?;
    info!("Submitted {} login for {}", family, credentials.username());

    if poll_signed_in(page, &flow.probe, policy.form_timeout, policy.poll_interval).await {
        attempt.step(AuthEvent::SignedIn)?;
        info!("{} login succeeded", family);
        return Ok(attempt.finish());
    }

    attempt.step(AuthEvent::ChallengeDetected)?;
    await_operator(page, attempt, flow, policy).await
}

/// Bounded wait in `ChallengePending` with the operator banner shown
async fn await_operator(
    page: &mut dyn PageDriver,
    mut attempt: Attempt,
    flow: &LoginFlow,
    policy: &AuthPolicy,
) -> Result<AuthOutcome> {
    let family = attempt.family;
    warn!(
        "{} needs the operator: complete login or verification in the browser window within {}s",
        family,
        policy.challenge_timeout.as_secs()
    );
    show_banner(page, family, policy.challenge_timeout).await;

    let signed_in = poll_signed_in(
        page,
        &flow.probe,
        policy.challenge_timeout,
        policy.poll_interval,
    )
    .await;
    hide_banner(page).await;

    if signed_in {
        attempt.step(AuthEvent::SignedIn)?;
        info!("{} signed in after operator action", family);
    } else {
        attempt.step(AuthEvent::DeadlineElapsed)?;
        warn!("{} login not completed in time; continuing as guest", family);
    }
    Ok(attempt.finish())
}

/// Checks the signed-in probe once; probe errors count as "not signed in"
pub async fn is_signed_in(page: &mut dyn PageDriver, probe: &SignedInProbe) -> bool {
    match probe {
        SignedInProbe::Selector(selector) => {
            matches!(page.count(selector).await, Ok(n) if n > 0)
        }
        SignedInProbe::UrlLacks(fragment) => match page.current_url().await {
            Ok(url) => !url.is_empty() && !url.contains(fragment),
            Err(_) => false,
        },
    }
}

/// Polls the probe every `interval` until it matches or `limit` elapses
async fn poll_signed_in(
    page: &mut dyn PageDriver,
    probe: &SignedInProbe,
    limit: Duration,
    interval: Duration,
) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if is_signed_in(page, probe).await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Waits, bounded by the challenge timeout, for a bot-check page to clear
async fn wait_out_interstitial(
    page: &mut dyn PageDriver,
    family: SiteFamily,
    marker: &str,
    policy: &AuthPolicy,
) {
    let deadline = Instant::now() + policy.challenge_timeout;
    let mut announced = false;
    loop {
        let title = page.title().await.unwrap_or_default();
        if !title.contains(marker) {
            if announced {
                hide_banner(page).await;
            }
            return;
        }
        if !announced {
            warn!("{} is showing a bot check; waiting for it to clear", family);
            show_banner(page, family, policy.challenge_timeout).await;
            announced = true;
        }
        if Instant::now() >= deadline {
            warn!("{} bot check did not clear in time", family);
            return;
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

const BANNER_ID: &str = "review-sweep-operator-banner";

/// Script that pins the operator banner to the top of the page
///
/// Carries only the family name and the deadline.
pub fn banner_script(family: SiteFamily, timeout: Duration) -> String {
    let message = format!(
        "review-sweep: please sign in to {} or complete the verification in this window. Waiting up to {} seconds before continuing as guest.",
        family,
        timeout.as_secs()
    );
    format!(
        r#"(() => {{
    let el = document.getElementById('{id}');
    if (!el) {{
        el = document.createElement('div');
        el.id = '{id}';
        el.style.cssText = 'position:fixed;top:0;left:0;right:0;z-index:2147483647;padding:10px;background:#b00020;color:#fff;font:bold 15px sans-serif;text-align:center;';
        (document.body || document.documentElement).appendChild(el);
    }}
    el.textContent = {message};
}})()"#,
        id = BANNER_ID,
        message = crate::browser::js_string(&message),
    )
}

async fn show_banner(page: &mut dyn PageDriver, family: SiteFamily, timeout: Duration) {
    if let Err(e) = page.evaluate(&banner_script(family, timeout)).await {
        debug!("Could not show operator banner: {}", e);
    }
}

async fn hide_banner(page: &mut dyn PageDriver) {
    let script = format!(
        "(() => {{ const el = document.getElementById('{}'); if (el) el.remove(); }})()",
        BANNER_ID
    );
    if let Err(e) = page.evaluate(&script).await {
        debug!("Could not remove operator banner: {}", e);
    }
}
