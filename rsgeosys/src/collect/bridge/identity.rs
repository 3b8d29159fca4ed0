//! Password-grant token exchange against the identity server.

use serde::Deserialize;
use tracing::info;

use crate::collect::global_variables::{GRANT_TYPE, IDENTITY_API_VERSION, SCOPE};
use crate::collect::http::{status_message, HttpClient};
use crate::error::{GeosysError, Result};

/// Account used to obtain an access token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub fn token_url(identity_server: &str) -> String {
    format!(
        "{}/v{}/connect/token",
        identity_server.trim_end_matches('/'),
        IDENTITY_API_VERSION
    )
}

/// Exchanges `credentials` for a bearer token.
pub fn request_access_token<C: HttpClient>(
    client: &C,
    identity_server: &str,
    credentials: &Credentials,
) -> Result<String> {
    let url = token_url(identity_server);
    info!(url = %url, user = %credentials.username, "Requesting access token");

    let form = [
        ("grant_type", GRANT_TYPE),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
        ("scope", SCOPE),
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.as_str()),
    ];
    let response = client.post_form(&url, &[], &form)?;

    let parsed: Option<TokenResponse> = serde_json::from_slice(&response.body).ok();
    match parsed {
        Some(TokenResponse {
            access_token: Some(token),
            ..
        }) if response.is_success() => Ok(token),
        Some(TokenResponse {
            error,
            error_description,
            ..
        }) => {
            let reason = error_description
                .or(error)
                .unwrap_or_else(|| status_message(response.status));
            Err(GeosysError::Remote(format!("Authentication failed. {}", reason)))
        }
        None => Err(GeosysError::Http(status_message(response.status))),
    }
}
