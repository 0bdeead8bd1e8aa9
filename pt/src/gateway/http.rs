//! HTTP implementation of the progress service client

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::domain::{ActionId, DutyId, ProgPoint};

use super::types::{BulkResponse, CompletionStatus, RawCatalog, RejectionBody};
use super::{BulkOutcome, ProgressClient, RemoteError};

/// Client against the hosted progress service
///
/// Requests carry a bearer key and a bounded timeout; the cooldown gate
/// upstream is the back-pressure device, so there is no retry loop here.
pub struct HttpProgressClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpProgressClient {
    /// Create a client from the remote section of the config
    ///
    /// The API key is read from the environment variable the config names.
    pub fn from_config(config: &RemoteConfig) -> eyre::Result<Self> {
        debug!(base_url = %config.base_url, "HttpProgressClient::from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| eyre::eyre!("API key not found. Set the {} environment variable.", config.api_key_env))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self
            .http
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, %path, "get_json: unexpected status");
            return Err(RemoteError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|error| RemoteError::Decode(error.to_string()))
    }

    async fn post(&self, path: &str, body: Option<serde_json::Value>) -> Result<Response, RemoteError> {
        let mut request = self
            .http
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_key));
        if let Some(body) = body {
            request = request.json(&body);
        }
        Ok(request.send().await?)
    }

    /// Interpret a completion write response
    ///
    /// 201 means newly recorded; 200 and 409 mean the mark was already on
    /// record. 422 is a content rejection with a reason body. Every other
    /// status is a server error.
    async fn interpret_mark(response: Response) -> Result<bool, RemoteError> {
        let status = response.status().as_u16();
        match status {
            201 => Ok(true),
            200 | 409 => Ok(false),
            422 => {
                let body: RejectionBody = response.json().await.unwrap_or_default();
                Err(RemoteError::Rejected { reason: body.reason })
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(RemoteError::Server { status, message })
            }
        }
    }
}

#[async_trait]
impl ProgressClient for HttpProgressClient {
    async fn duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
        debug!(%duty, "duty_completed: called");
        let status: CompletionStatus = self.get_json(&format!("v1/duties/{}/completion", duty)).await?;
        Ok(status.completed)
    }

    async fn point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
        debug!(%duty, %point, "point_completed: called");
        let status: CompletionStatus = self
            .get_json(&format!("v1/duties/{}/points/{}", duty, point))
            .await?;
        Ok(status.completed)
    }

    async fn point_catalog(&self, duty: DutyId) -> Result<Vec<ProgPoint>, RemoteError> {
        debug!(%duty, "point_catalog: called");
        let catalog: RawCatalog = self.get_json(&format!("v1/duties/{}/points", duty)).await?;

        let total = catalog.points.len();
        let points: Vec<ProgPoint> = catalog.points.into_iter().filter_map(|raw| raw.into_point()).collect();
        if points.len() < total {
            warn!(%duty, dropped = total - points.len(), "point_catalog: dropped entries with unparseable ids");
        }
        Ok(points)
    }

    async fn mark_duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
        debug!(%duty, "mark_duty_completed: called");
        let response = self.post(&format!("v1/duties/{}/completion", duty), None).await?;
        Self::interpret_mark(response).await
    }

    async fn mark_point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
        debug!(%duty, %point, "mark_point_completed: called");
        let response = self
            .post(&format!("v1/duties/{}/points/{}/completion", duty, point), None)
            .await?;
        Self::interpret_mark(response).await
    }

    async fn mark_duties_completed(&self, duties: &[DutyId]) -> Result<BulkOutcome, RemoteError> {
        debug!(count = duties.len(), "mark_duties_completed: called");
        let ids: Vec<u32> = duties.iter().map(|duty| duty.0).collect();
        let response = self
            .post("v1/duties/completion", Some(serde_json::json!({ "ids": ids })))
            .await?;

        let status = response.status().as_u16();
        match status {
            200 | 201 => Ok(BulkOutcome::AllAccepted {
                accepted: duties.to_vec(),
            }),
            207 => {
                let body: BulkResponse = response
                    .json()
                    .await
                    .map_err(|error| RemoteError::Decode(error.to_string()))?;
                Ok(body.into_outcome())
            }
            422 => {
                let body: RejectionBody = response.json().await.unwrap_or_default();
                Err(RemoteError::Rejected { reason: body.reason })
            }
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(RemoteError::Server { status, message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> HttpProgressClient {
        HttpProgressClient {
            http: Client::new(),
            base_url: "https://progress.example.test".to_string(),
            api_key: "test-key".to_string(),
        }
    }

    #[test]
    fn test_url_building() {
        let client = test_client();
        assert_eq!(
            client.url("v1/duties/42/points"),
            "https://progress.example.test/v1/duties/42/points"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpProgressClient {
            http: Client::new(),
            base_url: "https://progress.example.test/api/".trim_end_matches('/').to_string(),
            api_key: "test-key".to_string(),
        };
        assert_eq!(
            client.url("v1/duties/1/completion"),
            "https://progress.example.test/api/v1/duties/1/completion"
        );
    }
}
