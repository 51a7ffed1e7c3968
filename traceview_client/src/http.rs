//! HTTP control plane - talks to the trace/control service over REST.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use traceview_env::{
    ApiError, BoundingBox, ControlPlane, PlaybackStatus, StartLocation, TracePoint, WaypointRecord,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Control plane backed by the remote HTTP service.
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    /// `base_url` without a trailing slash, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(self.endpoint(path))
            .query(query)
            .send()
            .await
            .map_err(from_reqwest)?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        resp.json::<T>().await.map_err(from_reqwest)
    }

    async fn post_command(&self, path: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .send()
            .await
            .map_err(from_reqwest)?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

fn from_reqwest(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(REQUEST_TIMEOUT.as_millis() as u64)
    } else if e.is_decode() {
        ApiError::decode(e.to_string())
    } else {
        ApiError::transport(e.to_string())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn ready(&self) -> Result<(), ApiError> {
        let resp = self
            .client
            .get(self.endpoint("/readyz"))
            .send()
            .await
            .map_err(from_reqwest)?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn bounding_box(&self) -> Result<BoundingBox, ApiError> {
        self.get_json("/api/bbox", &[]).await
    }

    async fn start_location(&self, drone_id: &str) -> Result<StartLocation, ApiError> {
        self.get_json("/api/start_location", &[("drone_id", drone_id.to_string())])
            .await
    }

    async fn resampled_trace(
        &self,
        drone_id: &str,
        interval: &str,
    ) -> Result<Vec<TracePoint>, ApiError> {
        // The `_` timestamp defeats intermediary caching, so a regenerated
        // trace is always observed.
        self.get_json(
            "/api/resample",
            &[
                ("drone_id", drone_id.to_string()),
                ("interval", interval.to_string()),
                ("_", now_millis().to_string()),
            ],
        )
        .await
    }

    async fn waypoints(&self) -> Result<Vec<WaypointRecord>, ApiError> {
        self.get_json("/api/waypoints", &[]).await
    }

    async fn status(&self) -> Result<PlaybackStatus, ApiError> {
        self.get_json("/status", &[]).await
    }

    async fn play(&self) -> Result<(), ApiError> {
        self.post_command("/api/play").await
    }

    async fn pause(&self) -> Result<(), ApiError> {
        self.post_command("/api/pause").await
    }

    async fn reset(&self) -> Result<(), ApiError> {
        self.post_command("/api/reset").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let api = HttpControlPlane::new("http://localhost:8000/").unwrap();
        assert_eq!(api.endpoint("/api/bbox"), "http://localhost:8000/api/bbox");
    }

    #[test]
    fn test_now_millis_is_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000); // sanity: after 2020
    }
}
