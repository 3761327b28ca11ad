//! In-memory pushers.
//!
//! Both record every call and can be told to fail the next N pushes, which
//! is all the engine tests need to drive retries. Clones share state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChassisPusher, ControllerPusher};
use crate::error::{PushError, PushOperation};

/// A recorded controller push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerPush {
    /// Endpoint pushed to.
    pub endpoint: String,
    /// Username sent.
    pub username: String,
    /// Body sent.
    pub payload: Vec<u8>,
}

impl ControllerPush {
    /// Parses the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    pushes: Vec<ControllerPush>,
    deletes: Vec<String>,
    attempts: usize,
    fail_remaining: usize,
    fail_status: u16,
}

/// Controller pusher that records instead of sending.
#[derive(Debug, Clone, Default)]
pub struct MemoryControllerPusher {
    state: Arc<Mutex<ControllerState>>,
    delay: Option<Duration>,
}

impl MemoryControllerPusher {
    /// Creates a pusher that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call take `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails the next `count` calls with HTTP `status_code`.
    pub fn fail_next(&self, count: usize, status_code: u16) {
        let mut state = self.state.lock();
        state.fail_remaining = count;
        state.fail_status = status_code;
    }

    /// Successful pushes, oldest first.
    pub fn pushes(&self) -> Vec<ControllerPush> {
        self.state.lock().pushes.clone()
    }

    /// Successful deletes, oldest first.
    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().deletes.clone()
    }

    /// Number of calls made, failed ones included.
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn take_failure(&self, endpoint: &str, operation: PushOperation) -> Result<(), PushError> {
        let mut state = self.state.lock();
        state.attempts += 1;
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            let code = state.fail_status;
            return Err(PushError::new(
                endpoint,
                operation,
                Some(code),
                format!("{} injected failure", code),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ControllerPusher for MemoryControllerPusher {
    async fn push_update(
        &self,
        endpoint: &str,
        username: &str,
        _password: &str,
        payload: &[u8],
    ) -> Result<(), PushError> {
        self.pause().await;
        self.take_failure(endpoint, PushOperation::Post)?;
        self.state.lock().pushes.push(ControllerPush {
            endpoint: endpoint.to_string(),
            username: username.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn push_delete(&self, endpoint: &str) -> Result<(), PushError> {
        self.pause().await;
        self.take_failure(endpoint, PushOperation::Delete)?;
        self.state.lock().deletes.push(endpoint.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ChassisState {
    pushes: Vec<(String, String)>,
    fail_remaining: usize,
}

/// Chassis pusher that records instead of sending.
#[derive(Debug, Clone, Default)]
pub struct MemoryChassisPusher {
    state: Arc<Mutex<ChassisState>>,
}

impl MemoryChassisPusher {
    /// Creates a pusher that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` pushes.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_remaining = count;
    }

    /// Successful pushes as `(endpoint, payload)`, oldest first.
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.state.lock().pushes.clone()
    }
}

#[async_trait]
impl ChassisPusher for MemoryChassisPusher {
    async fn push_update(&self, endpoint: &str, payload: &str) -> Result<(), PushError> {
        let mut state = self.state.lock();
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(PushError::new(
                endpoint,
                PushOperation::Set,
                Some(500),
                "injected failure",
            ));
        }
        state.pushes.push((endpoint.to_string(), payload.to_string()));
        Ok(())
    }

    async fn push_delete(&self, _endpoint: &str) -> Result<(), PushError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_controller_records_and_fails() {
        let pusher = MemoryControllerPusher::new();
        pusher.fail_next(1, 503);

        let err = pusher
            .push_update("http://onos/", "onos", "rocks", b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.status_code, Some(503));

        pusher
            .push_update("http://onos/", "onos", "rocks", b"{\"a\":1}")
            .await
            .unwrap();
        pusher.push_delete("http://onos/").await.unwrap();

        assert_eq!(pusher.attempts(), 3);
        assert_eq!(pusher.pushes().len(), 1);
        assert_eq!(pusher.pushes()[0].json().unwrap()["a"], 1);
        assert_eq!(pusher.deletes(), vec!["http://onos/".to_string()]);
    }

    #[tokio::test]
    async fn test_chassis_clones_share_state() {
        let pusher = MemoryChassisPusher::new();
        let clone = pusher.clone();
        clone.fail_next(1);

        assert!(pusher.push_update("http://sw:9339", "x").await.is_err());
        pusher.push_update("http://sw:9339", "y").await.unwrap();
        assert_eq!(
            clone.pushes(),
            vec![("http://sw:9339".to_string(), "y".to_string())]
        );
    }
}
