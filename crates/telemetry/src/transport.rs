//! Network hand-off for serialized events.
//!
//! A [`Transport`] accepts a body and returns immediately. The request runs
//! on a detached task whose outcome is dropped without inspection.

use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;

use crate::error::{Result, TelemetryError};

const USER_AGENT: &str = concat!("pennant-telemetry/", env!("CARGO_PKG_VERSION"));

/// Submits one event body to a URL without waiting for the response.
pub trait Transport: Send + Sync {
    /// Hand `body` off for delivery to `url`. Errors only when the hand-off
    /// itself fails, never because of the response.
    fn submit(&self, url: &str, body: Vec<u8>) -> Result<()>;
}

/// Fire-and-forget JSON POST over reqwest.
///
/// Inside a tokio runtime the request is spawned onto it; otherwise it runs
/// on a detached thread with its own single-threaded runtime. Either way the
/// caller does not wait, and nothing is retried.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the client. Fails only when the TLS backend cannot initialize.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn submit(&self, url: &str, body: Vec<u8>) -> Result<()> {
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = request.send().await;
                });
            }
            Err(_) => {
                std::thread::Builder::new()
                    .name("pennant-telemetry".into())
                    .spawn(move || {
                        if let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            let _ = runtime.block_on(request.send());
                        }
                    })?;
            }
        }
        Ok(())
    }
}

/// Stands in when no HTTP client could be built. Every submit fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableTransport;

impl Transport for UnavailableTransport {
    fn submit(&self, _url: &str, _body: Vec<u8>) -> Result<()> {
        Err(TelemetryError::Transport("no HTTP client available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let received = server.received_requests().await.unwrap_or_default();
            if received.len() >= count || Instant::now() > deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn transport_posts_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/event"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        transport
            .submit(
                &format!("{}/v1/event", server.uri()),
                br#"{"eventType":"dev"}"#.to_vec(),
            )
            .unwrap();

        let received = wait_for_requests(&server, 1).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, br#"{"eventType":"dev"}"#.to_vec());
    }

    #[tokio::test]
    async fn submit_returns_before_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let start = Instant::now();
        transport
            .submit(&format!("{}/v1/event", server.uri()), b"{}".to_vec())
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn server_error_is_ignored() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let result = transport.submit(&format!("{}/v1/event", server.uri()), b"{}".to_vec());
        assert!(result.is_ok());
        wait_for_requests(&server, 1).await;
    }

    #[tokio::test]
    async fn connection_refused_is_ignored() {
        let transport = HttpTransport::new().unwrap();
        let result = transport.submit("http://127.0.0.1:1/v1/event", b"{}".to_vec());
        assert!(result.is_ok());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[test]
    fn submit_outside_runtime_uses_thread() {
        let transport = HttpTransport::new().unwrap();
        let start = Instant::now();
        let result = transport.submit("http://127.0.0.1:1/v1/event", b"{}".to_vec());
        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn unavailable_transport_errors() {
        let err = UnavailableTransport.submit("http://x", Vec::new()).unwrap_err();
        assert!(matches!(err, TelemetryError::Transport(_)));
    }
}
