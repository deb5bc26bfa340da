// src/services/session.rs

//! Cookie-carrying HTTP session.
//!
//! One `Session` serves every account of the bot. Only one account's
//! identity can be active in the shared cookie jar at a time, so callers
//! select a profile (copying its stored cookies into the jar) immediately
//! before building each request. Request descriptors snapshot the jar at
//! build time, which keeps spawned fetches independent of later identity
//! switches.
//!
//! Redirects are followed by hand (the client's built-in policy is
//! disabled): the portal sets cookies on intermediate redirect hops during
//! login, and those must be captured per hop. The chain is bounded by the
//! configured redirect limit.
//!
//! All jar mutation happens on the engine task. Spawned fetches report
//! their outcome as a [`FetchReply`] on the engine's reply queue and never
//! touch shared state themselves.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Method, header, redirect};
use scraper::Html;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{HttpConfig, Profile};
use crate::services::auth::{REMEMBER_COOKIE, SESSION_COOKIE};
use crate::services::connection::FetchTarget;

/// How a response body is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Raw text
    Text,
    /// Parsed HTML document
    Html,
    /// Parsed JSON value
    Json,
}

/// A decoded response body.
#[derive(Debug)]
pub enum ResponseBody {
    Text(String),
    Html(Html),
    Json(Value),
}

impl ResponseBody {
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(AppError::protocol(
                "response body",
                format!("expected text, got {}", other.kind_name()),
            )),
        }
    }

    pub fn into_html(self) -> Result<Html> {
        match self {
            Self::Html(document) => Ok(document),
            other => Err(AppError::protocol(
                "response body",
                format!("expected HTML, got {}", other.kind_name()),
            )),
        }
    }

    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            other => Err(AppError::protocol(
                "response body",
                format!("expected JSON, got {}", other.kind_name()),
            )),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Html(_) => "HTML",
            Self::Json(_) => "JSON",
        }
    }
}

/// An unexecuted request descriptor with a cookie snapshot.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    form: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
}

impl PreparedRequest {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Raw outcome of a performed request, before body decoding.
#[derive(Debug)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: Url,
    pub text: String,
    /// Cookies the server set along the redirect chain
    pub set_cookies: Vec<(String, String)>,
}

/// Completion message of a spawned fetch, delivered on the engine's reply
/// queue.
#[derive(Debug)]
pub struct FetchReply {
    pub target: FetchTarget,
    pub outcome: Result<FetchedPage>,
}

/// The shared cookie jar.
#[derive(Debug, Clone, Default)]
struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    fn set(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    fn value(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn clear(&mut self) {
        self.cookies.clear();
    }

    fn pairs(&self) -> Vec<(String, String)> {
        self.cookies
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Process-wide HTTP session: client, cookie jar, active identity.
pub struct Session {
    client: Client,
    jar: CookieJar,
    /// Username whose cookies currently occupy the jar
    active: Option<String>,
    redirect_limit: usize,
    replies: mpsc::UnboundedSender<FetchReply>,
}

impl Session {
    /// Create the session. Redirect handling is done by [`perform`], so the
    /// client's own policy is disabled.
    pub fn new(http: &HttpConfig, replies: mpsc::UnboundedSender<FetchReply>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            jar: CookieJar::default(),
            active: None,
            redirect_limit: http.redirect_limit,
            replies,
        })
    }

    /// Make a profile's identity the active one: replace the jar contents
    /// with the profile's stored cookie pair. Must be called before
    /// building requests on the profile's behalf.
    pub fn select_profile(&mut self, profile: &Profile) {
        self.jar.clear();
        if let Some(value) = &profile.session_cookie {
            self.jar.set(SESSION_COOKIE, value);
        }
        if let Some(value) = &profile.remember_cookie {
            self.jar.set(REMEMBER_COOKIE, value);
        }
        self.active = Some(profile.username.clone());
    }

    /// Username of the currently selected identity, if any.
    pub fn active_identity(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.jar.set(name, value);
    }

    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.jar.value(name)
    }

    pub fn clear_cookies(&mut self) {
        self.jar.clear();
        self.active = None;
    }

    /// Build an unexecuted GET request carrying the current jar snapshot.
    pub fn build_get(&self, url: &str, params: &[(&str, &str)]) -> Result<PreparedRequest> {
        let mut url = Url::parse(url)?;
        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(PreparedRequest {
            method: Method::GET,
            url,
            form: Vec::new(),
            cookies: self.jar.pairs(),
        })
    }

    /// Build an unexecuted form POST request carrying the current jar
    /// snapshot.
    pub fn build_post(&self, url: &str, form: &[(&str, &str)]) -> Result<PreparedRequest> {
        Ok(PreparedRequest {
            method: Method::POST,
            url: Url::parse(url)?,
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cookies: self.jar.pairs(),
        })
    }

    /// Execute a request inline, merging captured cookies back into the
    /// jar. This is the deliberate blocking path, used for login and
    /// session checks on the engine task.
    pub async fn execute(
        &mut self,
        request: PreparedRequest,
        kind: ResponseKind,
    ) -> Result<ResponseBody> {
        let page = perform(&self.client, request, self.redirect_limit).await?;
        for (name, value) in &page.set_cookies {
            self.jar.set(name, value);
        }
        decode(kind, page)
    }

    /// Execute a request on a spawned task and deliver the outcome as a
    /// [`FetchReply`] on the engine's reply queue. Never blocks the caller;
    /// captured cookies are reported but not merged.
    pub fn spawn_fetch(&self, request: PreparedRequest, target: FetchTarget) {
        let client = self.client.clone();
        let limit = self.redirect_limit;
        let replies = self.replies.clone();
        tokio::spawn(async move {
            let outcome = perform(&client, request, limit).await;
            // A closed receiver means the engine is shutting down.
            let _ = replies.send(FetchReply { target, outcome });
        });
    }
}

/// Decode a fetched page according to the expected response kind.
pub fn decode(kind: ResponseKind, page: FetchedPage) -> Result<ResponseBody> {
    match kind {
        ResponseKind::Text => Ok(ResponseBody::Text(page.text)),
        ResponseKind::Html => Ok(ResponseBody::Html(Html::parse_document(&page.text))),
        ResponseKind::Json => serde_json::from_str(&page.text)
            .map(ResponseBody::Json)
            .map_err(|e| {
                AppError::protocol(page.final_url.to_string(), format!("expected JSON: {e}"))
            }),
    }
}

/// Perform a request, following redirects by hand up to the limit and
/// recording every cookie the server sets along the way.
async fn perform(
    client: &Client,
    request: PreparedRequest,
    redirect_limit: usize,
) -> Result<FetchedPage> {
    let mut url = request.url.clone();
    let mut cookies = request.cookies.clone();
    let mut set_cookies: Vec<(String, String)> = Vec::new();
    let mut redirects = 0usize;

    loop {
        // Redirected POSTs are re-issued as GETs, like a browser would.
        let mut builder = if redirects == 0 && request.method == Method::POST {
            client.post(url.clone()).form(&request.form)
        } else {
            client.get(url.clone())
        };
        if !cookies.is_empty() {
            builder = builder.header(header::COOKIE, cookie_header(&cookies));
        }

        let response = builder.send().await?;

        for value in response.headers().get_all(header::SET_COOKIE) {
            if let Some((name, cookie_value)) =
                parse_set_cookie(value.to_str().unwrap_or_default())
            {
                upsert(&mut cookies, &name, &cookie_value);
                upsert(&mut set_cookies, &name, &cookie_value);
            }
        }

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    AppError::protocol(
                        url.to_string(),
                        format!("{status} response without a Location header"),
                    )
                })?;
            redirects += 1;
            url = redirect_target(&url, location, redirects, redirect_limit)?;
            continue;
        }

        if status.as_u16() != 200 {
            return Err(AppError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await?;
        return Ok(FetchedPage {
            status: status.as_u16(),
            final_url: url,
            text,
            set_cookies,
        });
    }
}

/// Resolve the next hop of a redirect chain, enforcing the hop limit.
/// Relative and circular targets are legal; hop `limit + 1` is not.
fn redirect_target(current: &Url, location: &str, hop: usize, limit: usize) -> Result<Url> {
    if hop > limit {
        return Err(AppError::RedirectLimit {
            limit,
            url: current.to_string(),
        });
    }
    Ok(current.join(location)?)
}

/// Join cookie pairs into a `Cookie` header value.
fn cookie_header(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Extract the name/value pair from a `Set-Cookie` header value.
fn parse_set_cookie(header_value: &str) -> Option<(String, String)> {
    let first = header_value.split(';').next()?;
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

fn upsert(cookies: &mut Vec<(String, String)>, name: &str, value: &str) {
    match cookies.iter_mut().find(|(k, _)| k == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => cookies.push((name.to_string(), value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        let (tx, _rx) = mpsc::unbounded_channel();
        Session::new(&HttpConfig::default(), tx).unwrap()
    }

    #[test]
    fn test_parse_set_cookie() {
        assert_eq!(
            parse_set_cookie("MoodleSession=abc123; path=/; HttpOnly"),
            Some(("MoodleSession".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("MOODLEID1_=deleted"),
            Some(("MOODLEID1_".to_string(), "deleted".to_string()))
        );
        assert_eq!(parse_set_cookie("garbage"), None);
        assert_eq!(parse_set_cookie("=value"), None);
    }

    #[test]
    fn test_cookie_header_join() {
        let cookies = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        assert_eq!(cookie_header(&cookies), "a=1; b=2");
    }

    #[test]
    fn test_select_profile_replaces_jar() {
        let mut session = test_session();
        session.set_cookie("stale", "x");

        let mut profile = Profile::new("alice", "pw");
        profile.session_cookie = Some("sess-a".into());
        profile.remember_cookie = Some("rem-a".into());
        session.select_profile(&profile);

        assert_eq!(session.cookie_value(SESSION_COOKIE), Some("sess-a".into()));
        assert_eq!(session.cookie_value(REMEMBER_COOKIE), Some("rem-a".into()));
        assert_eq!(session.cookie_value("stale"), None);
        assert_eq!(session.active_identity(), Some("alice"));
    }

    #[test]
    fn test_build_get_appends_params_and_snapshots_cookies() {
        let mut session = test_session();
        session.set_cookie("k", "v");

        let request = session
            .build_get("https://eos.example.edu/index.php", &[("lang", "en")])
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://eos.example.edu/index.php?lang=en"
        );
        assert_eq!(request.cookies, vec![("k".to_string(), "v".to_string())]);

        // later jar changes must not affect the snapshot
        session.set_cookie("k", "other");
        assert_eq!(request.cookies, vec![("k".to_string(), "v".to_string())]);
    }

    #[test]
    fn test_redirect_target_respects_limit() {
        let base = Url::parse("https://eos.example.edu/a").unwrap();

        // hop 10 of 10 is fine, including relative targets
        assert!(redirect_target(&base, "b", 10, 10).is_ok());
        // circular target is legal as long as the bound holds
        assert!(redirect_target(&base, "/a", 5, 10).is_ok());

        // hop 11 of 10 fails
        let err = redirect_target(&base, "b", 11, 10).unwrap_err();
        assert!(matches!(err, AppError::RedirectLimit { limit: 10, .. }));
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let page = FetchedPage {
            status: 200,
            final_url: Url::parse("https://eos.example.edu/x").unwrap(),
            text: "<html>not json</html>".to_string(),
            set_cookies: Vec::new(),
        };
        assert!(decode(ResponseKind::Json, page).is_err());
    }

    #[test]
    fn test_decode_text_passthrough() {
        let page = FetchedPage {
            status: 200,
            final_url: Url::parse("https://eos.example.edu/x").unwrap(),
            text: "true".to_string(),
            set_cookies: Vec::new(),
        };
        let body = decode(ResponseKind::Text, page).unwrap();
        assert_eq!(body.into_text().unwrap(), "true");
    }
}
