//! Cookie header parsing and `set-cookie` formatting.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};

/// Cookie name for the access token (short-lived, 5 minutes).
pub const ACCESS_COOKIE_NAME: &str = "token";

/// Cookie name for the refresh token (long-lived, 2 weeks).
pub const REFRESH_COOKIE_NAME: &str = "refresh";

/// Parse a raw `Cookie` header into a name to value map.
///
/// Pairs without `=` or with an empty name are skipped. Values are
/// percent-decoded; values that do not decode to UTF-8 are kept as sent.
/// When a name repeats, the first value wins.
pub fn parse_cookies(header: Option<&str>) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    let Some(header) = header else {
        return cookies;
    };

    for part in header.split(';') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let value = urlencoding::decode(value)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| value.to_string());
        cookies.entry(name.to_string()).or_insert(value);
    }
    cookies
}

/// Parse the `Cookie` header of a request. Non-ASCII headers count as absent.
pub fn request_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let raw = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    parse_cookies(raw)
}

/// Extract a single cookie value from the request headers.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    request_cookies(headers).remove(name)
}

fn session_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, value, max_age, secure
    )
}

/// `set-cookie` value carrying an access token.
pub fn access_cookie(token: &str, max_age: u64, secure: bool) -> String {
    session_cookie(ACCESS_COOKIE_NAME, token, max_age, secure)
}

/// `set-cookie` value carrying a refresh token.
pub fn refresh_cookie(token: &str, max_age: u64, secure: bool) -> String {
    session_cookie(REFRESH_COOKIE_NAME, token, max_age, secure)
}

/// `set-cookie` value that removes a cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}
