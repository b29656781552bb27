use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

use crate::config::SESSION_TTL;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";
/// Holds the CSRF token and PKCE verifier during the Google redirect.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_TTL: TimeDuration = TimeDuration::minutes(10);

/// Builds the `token` cookie. Outside production, browsers drop `Secure`
/// cookies on plain HTTP, so `secure` and the cross-site `SameSite=None`
/// are only set there.
#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    secure: bool,
}

impl SessionCookies {
    pub fn new(production: bool) -> Self {
        Self { secure: production }
    }

    fn same_site(&self) -> SameSite {
        if self.secure {
            SameSite::None
        } else {
            SameSite::Strict
        }
    }

    fn base(&self, value: String) -> Cookie<'static> {
        Cookie::build((TOKEN_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site())
            .build()
    }

    pub fn issue(&self, token: String) -> Cookie<'static> {
        let mut cookie = self.base(token);
        cookie.set_max_age(TimeDuration::seconds(SESSION_TTL.as_secs() as i64));
        cookie
    }

    /// Expired cookie with the same attributes, for logout.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = self.base(String::new());
        cookie.make_removal();
        cookie
    }

    fn oauth_base(&self, value: String) -> Cookie<'static> {
        // Lax so the cookie survives the top-level redirect back from Google.
        Cookie::build((OAUTH_STATE_COOKIE, value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }

    pub fn oauth_state(&self, value: String) -> Cookie<'static> {
        let mut cookie = self.oauth_base(value);
        cookie.set_max_age(OAUTH_STATE_TTL);
        cookie
    }

    pub fn clear_oauth_state(&self) -> Cookie<'static> {
        let mut cookie = self.oauth_base(String::new());
        cookie.make_removal();
        cookie
    }
}
