//! Downstream stage gateway.
//!
//! Every outbound call to a processing stage goes through here and comes
//! back normalized: either a [`StageResponse`] whose `status` is in the
//! agreed success vocabulary, or a typed [`StageError`]. The orchestrator
//! never inspects raw transport results.
//!
//! The gateway performs no retries and no backoff; each call carries one
//! bounded timeout (configured on the transport). Failure policy belongs
//! to the caller: variant A aborts on any stage error, variant B degrades
//! and continues.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Stage statuses accepted as success. Anything else, including a missing
/// `status` field, normalizes to [`StageError::NonSuccess`].
pub const SUCCESS_VOCABULARY: &[&str] = &[
    "success",
    "ok",
    "confirmed",
    "processed",
    "distributed",
    "harmonized",
    "generated",
    "resolved",
    "completed",
    "cleared",
];

/// Whether a stage-reported status counts as success.
pub fn is_success_status(status: &str) -> bool {
    SUCCESS_VOCABULARY.contains(&status)
}

/// Downstream call failure, transport-level or stage-reported.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("stage returned HTTP {0}")]
    Status(u16),
    #[error("stage response was not valid JSON: {0}")]
    Decode(String),
    #[error("stage reported status {0:?}")]
    NonSuccess(String),
}

/// Normalized successful stage response.
#[derive(Debug, Clone)]
pub struct StageResponse {
    /// The stage-reported status, guaranteed to be in the success vocabulary.
    pub status: String,
    /// Full response body as returned by the stage.
    pub body: Value,
}

/// Transport seam for stage dispatch. The production implementation is
/// [`HttpTransport`]; tests drive full cycles through an in-process fake.
#[async_trait]
pub trait StageTransport: Send + Sync {
    /// Deliver one request payload and return the raw response body.
    async fn dispatch(&self, url: &str, payload: &Value) -> Result<Value, StageError>;
}

/// HTTP POST transport with a bounded per-request timeout.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build the client. The timeout applies to every dispatched request.
    pub fn new(timeout: Duration) -> Result<Self, StageError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StageError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl StageTransport for HttpTransport {
    async fn dispatch(&self, url: &str, payload: &Value) -> Result<Value, StageError> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| StageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StageError::Decode(e.to_string()))
    }
}

/// Gateway over an arbitrary transport.
#[derive(Clone)]
pub struct StageGateway {
    transport: Arc<dyn StageTransport>,
}

impl StageGateway {
    pub fn new(transport: Arc<dyn StageTransport>) -> Self {
        Self { transport }
    }

    /// Production gateway over HTTP with the given per-request timeout.
    pub fn over_http(timeout: Duration) -> Result<Self, StageError> {
        Ok(Self::new(Arc::new(HttpTransport::new(timeout)?)))
    }

    /// Call `endpoint/route` with a JSON payload and normalize the result.
    pub async fn call(
        &self,
        endpoint: &str,
        route: &str,
        payload: Value,
    ) -> Result<StageResponse, StageError> {
        let url = format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            route.trim_start_matches('/')
        );
        debug!(url = %url, "dispatching stage request");

        let body = self.transport.dispatch(&url, &payload).await?;
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("missing")
            .to_string();

        if is_success_status(&status) {
            Ok(StageResponse { status, body })
        } else {
            Err(StageError::NonSuccess(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every dispatched URL and replies with a fixed body.
    struct CannedTransport {
        reply: Value,
        urls: Mutex<Vec<String>>,
    }

    impl CannedTransport {
        fn new(reply: Value) -> Self {
            Self {
                reply,
                urls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StageTransport for CannedTransport {
        async fn dispatch(&self, url: &str, _payload: &Value) -> Result<Value, StageError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl StageTransport for FailingTransport {
        async fn dispatch(&self, _url: &str, _payload: &Value) -> Result<Value, StageError> {
            Err(StageError::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_success_status_passes_through() {
        let transport = Arc::new(CannedTransport::new(
            json!({"status": "confirmed", "confidence": 0.92}),
        ));
        let gateway = StageGateway::new(transport);

        let response = gateway
            .call("http://localhost:8001", "/confirm_verdict", json!({}))
            .await
            .unwrap();
        assert_eq!(response.status, "confirmed");
        assert_eq!(response.body["confidence"], 0.92);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let transport = Arc::new(CannedTransport::new(json!({"status": "rejected"})));
        let gateway = StageGateway::new(transport);

        let err = gateway
            .call("http://localhost:8001", "confirm_verdict", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::NonSuccess(ref s) if s == "rejected"));
    }

    #[tokio::test]
    async fn test_missing_status_is_an_error() {
        let transport = Arc::new(CannedTransport::new(json!({"data": 1})));
        let gateway = StageGateway::new(transport);

        let err = gateway
            .call("http://localhost:8001", "confirm_verdict", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::NonSuccess(ref s) if s == "missing"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let gateway = StageGateway::new(Arc::new(FailingTransport));
        let err = gateway
            .call("http://localhost:8001", "x", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Transport(_)));
    }

    #[test]
    fn test_url_join_strips_duplicate_slashes() {
        let transport = Arc::new(CannedTransport::new(json!({"status": "ok"})));
        let gateway = StageGateway::new(Arc::clone(&transport) as Arc<dyn StageTransport>);

        tokio_test::block_on(async {
            gateway
                .call("http://localhost:8020/", "/gyro_cortical_process", json!({}))
                .await
                .unwrap();
        });

        let urls = transport.urls.lock().unwrap();
        assert_eq!(urls[0], "http://localhost:8020/gyro_cortical_process");
    }

    #[test]
    fn test_success_vocabulary() {
        assert!(is_success_status("success"));
        assert!(is_success_status("distributed"));
        assert!(!is_success_status("error"));
        assert!(!is_success_status(""));
        assert!(!is_success_status("SUCCESS"));
    }
}
