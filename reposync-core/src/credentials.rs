//! Credential injection for git transport URLs
//!
//! The token travels as the password of an `https` URL, with a fixed
//! placeholder username. Plaintext schemes are refused outright.

use url::Url;

use crate::{Error, Result};

/// Username paired with a bearer token in transport URLs
pub const TOKEN_USERNAME: &str = "oauth2";

/// Number of token characters kept by [`redact_token`]
const REDACTED_PREFIX_LEN: usize = 6;

/// Embed `bearer_token` into `remote_url` as transport credentials
///
/// Any userinfo already present in the URL is replaced. Host and path are
/// preserved.
pub fn inject(remote_url: &str, bearer_token: &str) -> Result<String> {
    if bearer_token.is_empty() {
        return Err(Error::InvalidUrl("bearer token is empty".to_string()));
    }

    let mut url = Url::parse(remote_url.trim()).map_err(|e| {
        Error::InvalidUrl(format!("{}: {}", redact_url_credentials(remote_url), e))
    })?;

    if url.scheme() != "https" {
        return Err(Error::InvalidUrl(format!(
            "refusing to embed a credential in a '{}' URL; only https is allowed",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidUrl(format!("{} has no host", remote_url)));
    }

    url.set_username(TOKEN_USERNAME)
        .and_then(|_| url.set_password(Some(bearer_token)))
        .map_err(|_| Error::InvalidUrl(format!("{} cannot carry credentials", remote_url)))?;

    Ok(url.into())
}

/// Remove any userinfo from a URL
///
/// Strings that do not parse as URLs are returned unchanged.
pub fn strip_credentials(remote_url: &str) -> String {
    match Url::parse(remote_url) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            // Both setters only fail for cannot-be-a-base URLs, which have no userinfo
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.into()
        }
        _ => remote_url.to_string(),
    }
}

/// Short, log-safe form of a token
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(REDACTED_PREFIX_LEN).collect();
    if token.chars().count() <= REDACTED_PREFIX_LEN {
        "***".to_string()
    } else {
        format!("{}...", prefix)
    }
}

/// Mask the userinfo of every URL found in free-form text
///
/// Applied to git arguments and captured output before they reach logs or
/// error messages.
pub fn redact_url_credentials(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find("://") {
        let (head, tail) = rest.split_at(idx + 3);
        out.push_str(head);

        let authority_end = tail
            .find(|c: char| c == '/' || c.is_whitespace() || c == '\'' || c == '"')
            .unwrap_or(tail.len());
        let authority = &tail[..authority_end];

        match authority.rfind('@') {
            Some(at) => {
                out.push_str("***");
                out.push_str(&authority[at..]);
            }
            None => out.push_str(authority),
        }
        rest = &tail[authority_end..];
    }

    out.push_str(rest);
    out
}
