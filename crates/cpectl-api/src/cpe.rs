// DMP device (CPE) endpoints
//
// Per-device telemetry parameter queries and the reboot trigger.
// Responses from the parameter endpoint have no fixed schema; they are
// handed back as raw `serde_json::Value` trees for the extractor.

use serde_json::{Value, json};
use tracing::debug;

use crate::auth::BearerToken;
use crate::client::DmpClient;
use crate::error::Error;

/// Server-side wait hint, in seconds, sent with every parameter query.
pub const PARAMETER_TIMEOUT_SECS: u64 = 60;

/// Acknowledgement of an accepted reboot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootAck {
    pub status: u16,
}

impl DmpClient {
    /// Query one telemetry parameter path for a device.
    ///
    /// `GET /ngacs/cpe/{serial}/parameter?timeout=60&data={"data":{"path":...}}`
    pub async fn query_parameter(
        &self,
        token: &BearerToken,
        serial: &str,
        path: &str,
    ) -> Result<Value, Error> {
        let url = self.cpe_url(serial, "parameter")?;
        let selector = json!({ "data": { "path": path } }).to_string();
        debug!(serial, path, "querying telemetry parameter");

        let body = self
            .get_authorized(
                url,
                token,
                &[
                    ("timeout", PARAMETER_TIMEOUT_SECS.to_string()),
                    ("data", selector),
                ],
            )
            .await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Ask the DMP to reboot a device.
    ///
    /// `POST /ngacs/cpe/{serial}/reboot` with no body.
    pub async fn reboot(&self, token: &BearerToken, serial: &str) -> Result<RebootAck, Error> {
        let url = self.cpe_url(serial, "reboot")?;
        debug!(serial, "requesting reboot");

        let (status, _body) = self.post_authorized(url, token).await?;
        Ok(RebootAck { status })
    }
}
