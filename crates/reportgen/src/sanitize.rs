//! Helpers for sanitizing values before they reach log lines and span
//! attributes.
//!
//! Database URLs carry passwords and pre-signed storage URLs carry
//! signatures; neither may be logged verbatim.

/// Masks the password in a connection URL.
///
/// - `postgres://app:secret@db:5432/tms` → `postgres://app:****@db:5432/tms`
/// - `postgres://app@db/tms` → unchanged
/// - `sqlite::memory:` → unchanged
pub fn redact_database_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let after_scheme = &url[scheme_end + 3..];
    let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
    let authority = &after_scheme[..authority_end];

    match authority.rfind('@') {
        Some(at_pos) => {
            let userinfo = &authority[..at_pos];
            match userinfo.find(':') {
                Some(colon) => format!(
                    "{}{}:****{}",
                    &url[..scheme_end + 3],
                    &userinfo[..colon],
                    &after_scheme[at_pos..]
                ),
                None => url.to_string(),
            }
        }
        None => url.to_string(),
    }
}

/// Drops the query string of a URL (signatures, tokens).
///
/// - `https://s3/reports/k?X-Amz-Signature=abc` → `https://s3/reports/k?****`
pub fn redact_url_query(url: &str) -> String {
    match url.find('?') {
        Some(pos) => format!("{}?****", &url[..pos]),
        None => url.to_string(),
    }
}
