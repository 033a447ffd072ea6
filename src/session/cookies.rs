//! HttpOnly, Secure cookies carrying the session tokens.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "accessToken";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

fn auth_cookie(name: &'static str, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

fn lifetime(lifetime: std::time::Duration) -> Duration {
    Duration::try_from(lifetime).unwrap_or(Duration::MAX)
}

/// Access token cookie, expiring together with the token.
pub fn access_cookie(token: &str, max_age: std::time::Duration) -> Cookie<'static> {
    auth_cookie(ACCESS_COOKIE, token.to_string(), lifetime(max_age))
}

/// Refresh token cookie, expiring together with the token.
pub fn refresh_cookie(token: &str, max_age: std::time::Duration) -> Cookie<'static> {
    auth_cookie(REFRESH_COOKIE, token.to_string(), lifetime(max_age))
}

pub fn clear_access_cookie() -> Cookie<'static> {
    auth_cookie(ACCESS_COOKIE, String::new(), Duration::ZERO)
}

pub fn clear_refresh_cookie() -> Cookie<'static> {
    auth_cookie(REFRESH_COOKIE, String::new(), Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_cookie_flags() {
        let cookie = access_cookie("tok", std::time::Duration::from_secs(900));

        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(900)));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie();

        assert_eq!(cookie.name(), "refreshToken");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
