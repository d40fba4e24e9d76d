//! Central-token verification (§4.6 path 2): only attempted when
//! `CENTRAL_URL` is configured and the server-JWT path didn't produce a
//! valid claim set. A positive result is cached in-memory for 5 minutes
//! and upserts a `CachedProfile` row.

use ecto_domain::{EctoError, Result};
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CentralVerifyResponse {
    pub valid: bool,
    pub user_id: Option<Uuid>,
    pub tag: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct CentralVerified {
    pub user_id: Uuid,
    pub username: String,
    pub discriminator: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// POSTs the raw token to `{central_url}/api/verify-token`. Returns `Ok(None)`
/// for a well-formed "not valid" response; network/parse failures are
/// `Err` so callers can distinguish "definitely invalid" from "couldn't ask".
pub async fn verify(client: &Client, central_url: &str, token: &str) -> Result<Option<CentralVerified>> {
    let url = format!("{}/api/verify-token", central_url.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .body(token.to_string())
        .send()
        .await
        .map_err(|e| EctoError::Auth(format!("central auth unreachable: {e}")))?;

    let body: CentralVerifyResponse = resp
        .json()
        .await
        .map_err(|e| EctoError::Auth(format!("central auth malformed response: {e}")))?;

    if !body.valid {
        return Ok(None);
    }
    let user_id = body.user_id.ok_or_else(|| EctoError::Auth("central auth: valid=true missing user_id".into()))?;
    let (username, discriminator) = split_tag(body.tag.unwrap_or_default());

    Ok(Some(CentralVerified { user_id, username, discriminator, display_name: body.display_name, avatar_url: body.avatar_url }))
}

/// Splits a `"username#discriminator"` tag as returned by central auth.
/// A tag with no `#` (malformed, or central auth omitted it) falls back to
/// discriminator `"0000"` rather than rejecting the whole verification.
fn split_tag(tag: String) -> (String, String) {
    tag.split_once('#').map(|(u, d)| (u.to_string(), d.to_string())).unwrap_or((tag, "0000".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_username_and_discriminator() {
        assert_eq!(split_tag("alice#1234".to_string()), ("alice".to_string(), "1234".to_string()));
    }

    #[test]
    fn missing_hash_falls_back_to_zero_discriminator() {
        assert_eq!(split_tag("alice".to_string()), ("alice".to_string(), "0000".to_string()));
    }

    #[test]
    fn empty_tag_yields_empty_username() {
        assert_eq!(split_tag(String::new()), (String::new(), "0000".to_string()));
    }
}
