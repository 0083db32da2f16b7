//! Login flows per site family

use crate::record::SiteFamily;

/// How to tell that the browser context is signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedInProbe {
    /// An element only rendered for signed-in users
    Selector(&'static str),

    /// The login page redirects away once signed in
    UrlLacks(&'static str),
}

/// Selectors and URLs of one family's login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginFlow {
    pub login_url: &'static str,
    pub probe: SignedInProbe,

    /// Elements clicked in order to reveal the form (dialog buttons, tabs)
    pub openers: &'static [&'static str],

    pub username_field: &'static str,
    pub password_field: &'static str,
    pub submit: &'static str,

    /// Title shown by a bot-check interstitial that must clear first
    pub interstitial_title: Option<&'static str>,
}

pub const BAHAMUT: LoginFlow = LoginFlow {
    login_url: "https://user.gamer.com.tw/login.php",
    probe: SignedInProbe::UrlLacks("login.php"),
    openers: &[],
    username_field: "#userid",
    password_field: "#password",
    submit: "#btn-login",
    interstitial_title: Some("Just a moment"),
};

pub const TIEBA: LoginFlow = LoginFlow {
    login_url: "https://tieba.baidu.com/index.html",
    probe: SignedInProbe::Selector(".u_username_title, .u_username"),
    // Header login link opens the passport dialog; the footer link switches it to the password tab
    openers: &[".u_login a", "#TANGRAM__PSP_11__footerULoginBtn"],
    username_field: "#TANGRAM__PSP_11__userName",
    password_field: "#TANGRAM__PSP_11__password",
    submit: "#TANGRAM__PSP_11__submit",
    interstitial_title: None,
};

pub const DISCORD: LoginFlow = LoginFlow {
    login_url: "https://discord.com/login",
    probe: SignedInProbe::UrlLacks("/login"),
    openers: &[],
    username_field: "input[name='email']",
    password_field: "input[name='password']",
    submit: "button[type='submit']",
    interstitial_title: None,
};

impl LoginFlow {
    /// The family's login, if it has one
    pub fn for_family(family: SiteFamily) -> Option<&'static LoginFlow> {
        match family {
            SiteFamily::Bahamut => Some(&BAHAMUT),
            SiteFamily::Tieba => Some(&TIEBA),
            SiteFamily::Discord => Some(&DISCORD),
            SiteFamily::TapTapCn
            | SiteFamily::TapTapIntl
            | SiteFamily::QooApp
            | SiteFamily::YouTube => None,
        }
    }
}
