//! # Server Gateway
//!
//! The seam between the engine and the central server.
//!
//! ## Error Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   HTTP outcome → SyncError                              │
//! │                                                                         │
//! │  2xx, body understood           → Ok                                   │
//! │  2xx, body not understood       → InvalidResponse                      │
//! │  2xx, body says status "error"  → InvalidResponse                      │
//! │  non-2xx                        → ServerRejected { status, message }   │
//! │  request/connect timeout        → Timeout(ms)                          │
//! │  DNS, refused, reset, ...       → NetworkUnavailable                   │
//! │                                                                         │
//! │  All four are "network class": the caller falls back to the offline   │
//! │  queue (entries) or leaves the queue untouched (drains).               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use parkgate_core::{EntryRecord, EntryRequest};

use crate::config::GateConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    BatchPayload, BatchReceipt, ServerTicket, BATCH_PATH, ENTRY_PATH, HEALTH_PATH,
};

/// Longest server error body kept in a `ServerRejected` message.
const MAX_ERROR_BODY: usize = 200;

// =============================================================================
// Gateway Trait
// =============================================================================

/// Operations the engine needs from the central server.
///
/// The batch endpoint must be idempotent per ticket number: a drain that
/// times out after the server committed will resend the same records.
#[async_trait]
pub trait ServerGateway: Send + Sync {
    /// Submits one entry and returns the server's ticket.
    async fn submit_entry(&self, request: &EntryRequest) -> SyncResult<ServerTicket>;

    /// Submits queued records in one request.
    async fn submit_batch(&self, records: &[EntryRecord]) -> SyncResult<BatchReceipt>;

    /// Checks that the server answers at all.
    async fn health_check(&self) -> SyncResult<()>;
}

// =============================================================================
// HTTP Gateway
// =============================================================================

/// [`ServerGateway`] over the server's REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http_client: reqwest::Client,
    base_url: Url,
    device_id: String,
    request_timeout: Duration,
}

impl HttpGateway {
    /// Creates a gateway from the gate configuration.
    pub fn new(config: &GateConfig) -> SyncResult<Self> {
        Self::with_base_url(
            config.server_url()?,
            config.device_id(),
            config.request_timeout(),
            config.connect_timeout(),
        )
    }

    /// Creates a gateway for an explicit API root.
    pub fn with_base_url(
        mut base_url: Url,
        device_id: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> SyncResult<Self> {
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpGateway {
            http_client,
            base_url,
            device_id: device_id.into(),
            request_timeout,
        })
    }

    /// API root with a trailing slash.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::timeout(self.request_timeout)
        } else {
            SyncError::NetworkUnavailable(err.to_string())
        }
    }

    /// Turns a non-2xx response into `ServerRejected`.
    async fn reject(response: reqwest::Response) -> SyncError {
        let status = response.status().as_u16();
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        SyncError::ServerRejected { status, message }
    }
}

#[async_trait]
impl ServerGateway for HttpGateway {
    async fn submit_entry(&self, request: &EntryRequest) -> SyncResult<ServerTicket> {
        let url = self.endpoint(ENTRY_PATH)?;

        let response = self
            .http_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::timeout(self.request_timeout)
            } else {
                SyncError::InvalidResponse(e.to_string())
            }
        })?;

        ServerTicket::from_response(&body).map_err(SyncError::InvalidResponse)
    }

    async fn submit_batch(&self, records: &[EntryRecord]) -> SyncResult<BatchReceipt> {
        let url = self.endpoint(BATCH_PATH)?;
        let payload = BatchPayload::new(records, &self.device_id);

        debug!(
            batch_id = %payload.batch_id,
            count = records.len(),
            "Submitting offline batch"
        );

        let response = self
            .http_client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(Self::reject(response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let body = serde_json::from_str::<Value>(&text).ok();

        BatchReceipt::from_response(body.as_ref(), records.len())
            .map_err(SyncError::InvalidResponse)
    }

    async fn health_check(&self) -> SyncResult<()> {
        let url = self.endpoint(HEALTH_PATH)?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::reject(response).await)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parkgate_core::{EntryImage, VehicleType};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server_uri: &str, timeout: Duration) -> HttpGateway {
        let base = Url::parse(&format!("{}/api", server_uri)).unwrap();
        HttpGateway::with_base_url(base, "GATE_01", timeout, Duration::from_secs(1)).unwrap()
    }

    fn request() -> EntryRequest {
        EntryRequest {
            plate: "B1234XYZ".to_string(),
            vehicle_type: VehicleType::Motor,
            device_id: "GATE_01".to_string(),
            entry_image: None,
        }
    }

    fn record(ticket: &str) -> EntryRecord {
        EntryRecord::offline(request(), ticket, Utc::now())
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let gateway = gateway_for("http://192.168.2.6:8000", Duration::from_secs(5));
        assert_eq!(gateway.base_url().as_str(), "http://192.168.2.6:8000/api/");
        assert_eq!(
            gateway.endpoint(BATCH_PATH).unwrap().as_str(),
            "http://192.168.2.6:8000/api/entry/sync_offline_entries/"
        );
    }

    #[tokio::test]
    async fn test_submit_entry_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/"))
            .and(body_partial_json(json!({
                "plat": "B1234XYZ",
                "jenis": "Motor",
                "device_id": "GATE_01",
                "entry_image": "AQID"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "status": "success",
                "data": { "ticket_number": "TKT-000123", "entry_time": "2024-03-01T08:30:00Z" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        let mut req = request();
        req.entry_image = Some(EntryImage::new(vec![1, 2, 3]));

        let ticket = gateway.submit_entry(&req).await.unwrap();
        assert_eq!(ticket.ticket_number, "TKT-000123");
        assert!(ticket.entry_time.is_some());
    }

    #[tokio::test]
    async fn test_submit_entry_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        let err = gateway.submit_entry(&request()).await.unwrap_err();

        assert!(matches!(err, SyncError::ServerRejected { status: 500, .. }));
        assert!(err.is_network_class());
    }

    #[tokio::test]
    async fn test_submit_entry_garbage_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/"))
            .respond_with(ResponseTemplate::new(201).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        let err = gateway.submit_entry(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_submit_entry_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_millis(200));
        let err = gateway.submit_entry(&request()).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout(200)));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };

        let gateway = gateway_for(&uri, Duration::from_secs(2));
        let err = gateway.submit_entry(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::NetworkUnavailable(_) | SyncError::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn test_submit_batch_payload_and_receipt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/sync_offline_entries/"))
            .and(body_partial_json(json!({
                "device_id": "GATE_01",
                "entries": [
                    { "ticket_number": "OFF0001", "plat": "B1234XYZ", "is_offline": true },
                    { "ticket_number": "OFF0002" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        let receipt = gateway
            .submit_batch(&[record("OFF0001"), record("OFF0002")])
            .await
            .unwrap();
        assert_eq!(receipt.accepted, 2);
    }

    #[tokio::test]
    async fn test_submit_batch_empty_body_accepts_all() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/sync_offline_entries/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        let receipt = gateway.submit_batch(&[record("OFF0001")]).await.unwrap();
        assert_eq!(receipt.accepted, 1);
    }

    #[tokio::test]
    async fn test_submit_batch_error_status_in_success_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/sync_offline_entries/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "error", "message": "db down"})),
            )
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        let err = gateway.submit_batch(&[record("OFF0001")]).await.unwrap_err();
        match &err {
            SyncError::InvalidResponse(message) => assert!(message.contains("db down")),
            other => panic!("expected InvalidResponse, got {:?}", other),
        }
        assert!(err.is_network_class());
    }

    #[tokio::test]
    async fn test_submit_batch_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/entry/sync_offline_entries/"))
            .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(1000)))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        match gateway.submit_batch(&[record("OFF0001")]).await {
            Err(SyncError::ServerRejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message.len(), MAX_ERROR_BODY);
            }
            other => panic!("expected ServerRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        assert!(gateway.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_check_non_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/test"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), Duration::from_secs(5));
        assert!(matches!(
            gateway.health_check().await,
            Err(SyncError::ServerRejected { status: 503, .. })
        ));
    }
}
