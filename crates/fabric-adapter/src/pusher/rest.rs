//! REST pusher for ONOS netconfig.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tracing::{debug, info, instrument};

use super::ControllerPusher;
use crate::error::{PushError, PushOperation};

const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Pushes JSON documents over HTTP.
#[derive(Debug, Clone)]
pub struct RestPusher {
    client: Client,
}

impl RestPusher {
    /// Creates a pusher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn check(endpoint: &str, operation: PushOperation, resp: Response) -> Result<(), PushError> {
        let status = resp.status();
        info!(endpoint, %operation, %status, "Push returned status");
        if status.is_success() {
            Ok(())
        } else {
            Err(PushError::new(
                endpoint,
                operation,
                Some(status.as_u16()),
                status.to_string(),
            ))
        }
    }

    fn transport(endpoint: &str, operation: PushOperation, err: reqwest::Error) -> PushError {
        PushError::new(
            endpoint,
            operation,
            err.status().map(|s| s.as_u16()),
            err.to_string(),
        )
    }
}

#[async_trait]
impl ControllerPusher for RestPusher {
    #[instrument(skip(self, password, payload), fields(bytes = payload.len()))]
    async fn push_update(
        &self,
        endpoint: &str,
        username: &str,
        password: &str,
        payload: &[u8],
    ) -> Result<(), PushError> {
        debug!(data = %String::from_utf8_lossy(payload), "Push update");
        let resp = self
            .client
            .post(endpoint)
            .basic_auth(username, Some(password))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| Self::transport(endpoint, PushOperation::Post, e))?;

        Self::check(endpoint, PushOperation::Post, resp)
    }

    #[instrument(skip(self))]
    async fn push_delete(&self, endpoint: &str) -> Result<(), PushError> {
        let resp = self
            .client
            .delete(endpoint)
            .send()
            .await
            .map_err(|e| Self::transport(endpoint, PushOperation::Delete, e))?;

        Self::check(endpoint, PushOperation::Delete, resp)
    }
}
