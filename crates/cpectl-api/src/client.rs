// DMP HTTP client
//
// Wraps `reqwest::Client` with DMP URL construction and bearer-token
// request plumbing. Endpoint groups (auth, cpe) are implemented as
// inherent methods in separate files to keep this module focused on
// transport mechanics.

use reqwest::header::ACCEPT;
use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

use crate::auth::BearerToken;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Default DMP API root.
pub const DEFAULT_BASE_URL: &str = "https://api.dataremote.com";

/// Raw HTTP client for the DMP cloud API.
///
/// Holds one long-lived `reqwest::Client`. The client carries no per-call
/// state: tokens are passed into every request, never cached here.
#[derive(Debug, Clone)]
pub struct DmpClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DmpClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{segments...}`, percent-encoding every segment.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// Build a device-scoped URL: `{base}/ngacs/cpe/{serial}/{leaf}`.
    pub(crate) fn cpe_url(&self, serial: &str, leaf: &str) -> Result<Url, Error> {
        self.url(&["ngacs", "cpe", serial, leaf])
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and return the raw body on success.
    pub(crate) async fn get_authorized(
        &self,
        url: Url,
        token: &BearerToken,
        query: &[(&str, String)],
    ) -> Result<String, Error> {
        debug!("GET {url} params={query:?}");

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.as_secret().expose_secret())
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        Self::success_body(resp).await
    }

    /// Send an authenticated POST without a body.
    pub(crate) async fn post_authorized(
        &self,
        url: Url,
        token: &BearerToken,
    ) -> Result<(u16, String), Error> {
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .bearer_auth(token.as_secret().expose_secret())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = Self::success_body(resp).await?;
        Ok((status, body))
    }

    /// Read the body, mapping non-2xx statuses to `Error::Api`.
    pub(crate) async fn success_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
