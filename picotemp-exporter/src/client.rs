//! HTTP client for the remote temperature sensor.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use picotemp_common::Reading;

/// Upper bound on a single round trip to the sensor.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Error returned when a reading cannot be obtained.
///
/// Transport failures, non-200 statuses and malformed bodies all collapse into
/// [`SensorError::Unreachable`]; the message only feeds the logs.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor unreachable: {0}")]
    Unreachable(String),
}

/// Something that can produce a reading for an endpoint.
pub trait SensorSource: Send + Sync {
    /// Perform one round trip to `endpoint`. No retries.
    fn fetch(&self, endpoint: &str) -> impl Future<Output = Result<Reading, SensorError>> + Send;
}

/// `reqwest`-backed sensor client.
#[derive(Debug, Clone)]
pub struct SensorClient {
    http: reqwest::Client,
}

impl SensorClient {
    /// Create a client with the fixed [`FETCH_TIMEOUT`].
    pub fn new() -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { http })
    }
}

impl SensorSource for SensorClient {
    async fn fetch(&self, endpoint: &str) -> Result<Reading, SensorError> {
        let response = self.http.get(endpoint).send().await.map_err(|e| {
            warn!(endpoint, error = %e, "Sensor request failed");
            SensorError::Unreachable(format!("request failed: {}", e))
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(endpoint, %status, "Unexpected response from the sensor");
            return Err(SensorError::Unreachable(format!(
                "invalid status code: {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            warn!(endpoint, error = %e, "Failed to read sensor response body");
            SensorError::Unreachable(format!("body read failed: {}", e))
        })?;

        picotemp_common::decode(&body).map_err(|e| {
            warn!(endpoint, error = %e, "Malformed sensor response");
            SensorError::Unreachable(format!("malformed body: {}", e))
        })
    }
}
