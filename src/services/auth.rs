// src/services/auth.rs

//! Portal login protocol.
//!
//! Authenticates profiles against the portal's cookie-based web login and
//! keeps their identity fields in sync. The only reconnection strategy is
//! check-then-fallback-to-login: a failed session check falls back to a
//! full login exactly once; a failure there invalidates the profile.

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{PortalConfig, Profile};
use crate::services::session::{ResponseKind, Session};
use crate::utils::extract_id_param;

/// Primary identity cookie set by the portal.
pub const SESSION_COOKIE: &str = "MoodleSession";

/// "Remember username" cookie set when logging in with the remember flag.
pub const REMEMBER_COOKIE: &str = "MOODLEID1_";

// Page shape of the portal. An unversioned but stable external contract;
// a change here is a parse error, not something to recover from.
const SEL_NOTICE: &str = "div.notice, #notice";
const SEL_LOGIN_ERROR: &str = "a#loginerrormessage, div.loginerrors";
const SEL_NAV_NAME: &str = ".usermenu .usertext";
const SEL_NAV_PROFILE: &str = ".usermenu a[href*=\"profile.php\"]";

/// Identity scraped from the logged-in navigation menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavIdentity {
    pub display_name: String,
    pub profile_url: String,
}

/// What a returned login page means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPageOutcome {
    /// The portal showed a notice (usually "you are already logged in")
    Notice(String),
    /// The portal rejected the credentials with the given message
    Rejected(String),
    /// The page carries a logged-in navigation menu
    Authenticated(NavIdentity),
}

/// Log a profile in: clear cookies, POST credentials with the remember
/// flag, interpret the returned page, and capture the identity cookie pair.
///
/// Any failure invalidates the profile before the error is returned.
pub async fn login(
    session: &mut Session,
    profile: &mut Profile,
    portal: &PortalConfig,
) -> Result<()> {
    session.clear_cookies();

    let request = session.build_post(
        &portal.login_url(),
        &[
            ("username", profile.username.as_str()),
            ("password", profile.password.as_str()),
            ("rememberusername", "1"),
            ("anchor", ""),
        ],
    )?;
    let document = session.execute(request, ResponseKind::Html).await?.into_html()?;

    match classify_login_page(&document)? {
        LoginPageOutcome::Notice(text) => {
            profile.invalidate();
            Err(AppError::login(
                &profile.username,
                format!("portal notice: {text}"),
            ))
        }
        LoginPageOutcome::Rejected(text) => {
            profile.invalidate();
            Err(AppError::login(&profile.username, text))
        }
        LoginPageOutcome::Authenticated(nav) => {
            let session_cookie = session.cookie_value(SESSION_COOKIE).ok_or_else(|| {
                AppError::protocol(
                    "login",
                    format!("no {SESSION_COOKIE} cookie after login of '{}'", profile.username),
                )
            })?;

            apply_identity(profile, nav);
            profile.session_cookie = Some(session_cookie);
            profile.remember_cookie = session.cookie_value(REMEMBER_COOKIE);
            profile.valid = true;
            log::info!(
                "Logged in '{}' as {}",
                profile.username,
                profile.display_name.as_deref().unwrap_or("?")
            );
            Ok(())
        }
    }
}

/// Verify that a profile's stored cookies still carry a live portal
/// session; fall back to a fresh login once if not.
pub async fn check(
    session: &mut Session,
    profile: &mut Profile,
    portal: &PortalConfig,
) -> Result<()> {
    match check_once(session, profile, portal).await {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!(
                "Session check failed for '{}': {}. Falling back to login.",
                profile.username,
                e
            );
            login(session, profile, portal).await
        }
    }
}

async fn check_once(
    session: &mut Session,
    profile: &mut Profile,
    portal: &PortalConfig,
) -> Result<()> {
    session.select_profile(profile);
    let request = session.build_get(&portal.index_url(), &[])?;
    let document = session.execute(request, ResponseKind::Html).await?.into_html()?;

    let nav = scrape_nav(&document)?;
    apply_identity(profile, nav);
    profile.valid = true;
    Ok(())
}

fn apply_identity(profile: &mut Profile, nav: NavIdentity) {
    profile.profile_id = extract_id_param(&nav.profile_url);
    profile.display_name = Some(nav.display_name);
    profile.profile_url = Some(nav.profile_url);
}

/// Classify a page returned by the login POST.
pub fn classify_login_page(document: &Html) -> Result<LoginPageOutcome> {
    if let Some(text) = select_text(document, SEL_NOTICE)? {
        return Ok(LoginPageOutcome::Notice(text));
    }
    if let Some(text) = select_text(document, SEL_LOGIN_ERROR)? {
        return Ok(LoginPageOutcome::Rejected(text));
    }
    // Neither notice nor error: the page must carry the logged-in nav.
    // Failure to find it is a parse error, distinct from bad credentials.
    Ok(LoginPageOutcome::Authenticated(scrape_nav(document)?))
}

/// Scrape display name and profile link from the logged-in navigation.
pub fn scrape_nav(document: &Html) -> Result<NavIdentity> {
    let display_name = select_text(document, SEL_NAV_NAME)?.ok_or_else(|| {
        AppError::protocol("navigation", "logged-in user menu not found")
    })?;

    let profile_sel = parse_selector(SEL_NAV_PROFILE)?;
    let profile_url = document
        .select(&profile_sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string)
        .ok_or_else(|| AppError::protocol("navigation", "profile link not found"))?;

    Ok(NavIdentity {
        display_name,
        profile_url,
    })
}

/// Trimmed text of the first element matching the selector, if any.
fn select_text(document: &Html, selector: &str) -> Result<Option<String>> {
    let sel = parse_selector(selector)?;
    Ok(document.select(&sel).next().map(|el| {
        el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
    }))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
