// DMP authentication
//
// Email/password login against `/auth/login`. The response carries a
// bearer token that every other endpoint expects in `Authorization`.
// Tokens are never cached: callers log in once per operation.

use reqwest::multipart::Form;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::client::DmpClient;
use crate::error::Error;

/// The fixed service identity used to log in to the DMP.
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
    pub password: SecretString,
}

/// A bearer token returned by a successful login.
#[derive(Debug, Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn as_secret(&self) -> &SecretString {
        &self.0
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    authorization_token: Option<String>,
}

impl DmpClient {
    /// Log in with the service identity and return a bearer token.
    ///
    /// `POST /auth/login` with a multipart form (`email`, `password`).
    /// A non-2xx status, an unparseable body, or a missing/blank
    /// `authorization_token` all map to [`Error::Authentication`].
    pub async fn login(&self, identity: &Identity) -> Result<BearerToken, Error> {
        let url = self.url(&["auth", "login"])?;
        debug!(email = %identity.email, "logging in at {url}");

        let form = Form::new()
            .text("email", identity.email.clone())
            .text("password", identity.password.expose_secret().to_owned());

        let resp = self.http().post(url).multipart(form).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                message: format!("failed to parse login response: {e}"),
            })?;

        match parsed.authorization_token {
            Some(token) if !token.trim().is_empty() => {
                debug!("login successful");
                Ok(BearerToken::new(token))
            }
            _ => Err(Error::Authentication {
                message: "token not found in login response".into(),
            }),
        }
    }
}
