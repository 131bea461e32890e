//! Authentication state machine for the portal session.
//!
//! ```text
//! Uninitialized -> Authenticating -> Authenticated
//!                       ^                 |
//!                       |          (login route seen)
//!                       |                 v
//!                       +-------- SessionExpired
//! Authenticating -> LoginFailed (terminal)
//! ```
//!
//! The portal never announces expiry; it is inferred from a redirect to a
//! login-looking URL, so transitions are driven by URL observations.

use std::fmt;

/// Default substrings that identify a login route.
pub const DEFAULT_LOGIN_MARKERS: &[&str] = &["sign", "login"];

/// Portal credentials kept for transparent re-authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Phase of the portal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Authenticating,
    Authenticated,
    SessionExpired,
    LoginFailed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::SessionExpired => "session_expired",
            Self::LoginFailed => "login_failed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring matcher for login routes.
///
/// Matches against the lower-cased full URL. Legitimate routes containing a
/// marker (e.g. "design" contains "sign") are false positives; the portal
/// offers no better signal.
#[derive(Debug, Clone)]
pub struct LoginRouteDetector {
    markers: Vec<String>,
}

impl LoginRouteDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.into().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn is_login_route(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }
}

impl Default for LoginRouteDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_MARKERS.iter().copied())
    }
}

/// Outcome of checking the current URL against the session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// Not on a login route; carry on.
    Valid,
    /// On a login route with stored credentials; replay login.
    NeedsLogin(Credentials),
    /// On a login route and no login can help.
    Unrecoverable,
}

/// Authentication state owned by one fetcher.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: SessionPhase,
    credentials: Option<Credentials>,
    login_attempts: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            credentials: None,
            login_attempts: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn login_attempts(&self) -> u32 {
        self.login_attempts
    }

    /// Start a login attempt, remembering the credentials for later replay.
    pub fn begin_login(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
        self.login_attempts += 1;
        self.phase = SessionPhase::Authenticating;
    }

    pub fn login_succeeded(&mut self) {
        self.phase = SessionPhase::Authenticated;
    }

    pub fn login_failed(&mut self) {
        self.phase = SessionPhase::LoginFailed;
    }

    /// Mark a session restored from disk as usable once a page loads off the login route.
    pub fn restored(&mut self) {
        if self.phase == SessionPhase::Uninitialized {
            self.phase = SessionPhase::Authenticated;
        }
    }

    /// Feed the result of a login-route check on the current URL.
    pub fn observe(&mut self, on_login_route: bool) -> SessionCheck {
        if !on_login_route {
            if self.phase == SessionPhase::SessionExpired {
                self.phase = SessionPhase::Authenticated;
            }
            return SessionCheck::Valid;
        }

        if self.phase == SessionPhase::LoginFailed {
            return SessionCheck::Unrecoverable;
        }

        if self.phase == SessionPhase::Authenticated {
            self.phase = SessionPhase::SessionExpired;
        }

        match &self.credentials {
            Some(creds) => SessionCheck::NeedsLogin(creds.clone()),
            None => SessionCheck::Unrecoverable,
        }
    }
}
