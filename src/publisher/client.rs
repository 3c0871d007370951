use super::ContentPublisher;
use crate::error::PublishError;
use crate::models::{Blob, ContentRef, DEFAULT_GATEWAY_URL, DEFAULT_PINATA_ENDPOINT};
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// Pins files through Pinata's `pinFileToIPFS` endpoint.
pub struct PinataPublisher {
    client: Client,
    jwt: String,
    endpoint: String,
    gateway_url: String,
}

impl PinataPublisher {
    pub fn new(jwt: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(jwt, client))
    }

    pub fn new_with_client(jwt: String, client: Client) -> Self {
        Self {
            client,
            jwt,
            endpoint: DEFAULT_PINATA_ENDPOINT.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: String) -> Self {
        self.gateway_url = gateway_url;
        self
    }

    fn build_form(blob: Blob) -> std::result::Result<Form, PublishError> {
        let part = Part::bytes(blob.data.to_vec())
            .file_name(blob.file_name)
            .mime_str(&blob.mime_type)
            .map_err(|e| {
                PublishError::Transport(format!("Invalid content type {}: {}", blob.mime_type, e))
            })?;
        Ok(Form::new().part("file", part))
    }
}

#[async_trait]
impl ContentPublisher for PinataPublisher {
    async fn publish(&self, blob: Blob) -> std::result::Result<ContentRef, PublishError> {
        let size = blob.data.len();
        let form = Self::build_form(blob)?;

        tracing::debug!("Pinning {} bytes to {}", size, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send pin request: {}", e);
                PublishError::Transport(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Pinning API error (status {}): {}", status, error_text);
            return Err(PublishError::Transport(format!(
                "Pinning API error (status {}): {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let pinned: PinResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse pin response: {}\nBody: {}", e, body);
            PublishError::EmptyResponse(format!("Failed to parse pin response: {}", e))
        })?;

        let cid = pinned.ipfs_hash.trim();
        if cid.is_empty() {
            return Err(PublishError::EmptyResponse(
                "Pin response carried a blank IpfsHash".to_string(),
            ));
        }

        Ok(ContentRef::new(&self.gateway_url, cid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(server: &MockServer) -> PinataPublisher {
        PinataPublisher::new("test-jwt".to_string(), Duration::from_secs(5))
            .unwrap()
            .with_endpoint(format!("{}/pinning/pinFileToIPFS", server.uri()))
            .with_gateway_url("https://gateway.test/ipfs".to_string())
    }

    fn blob() -> Blob {
        Blob {
            file_name: "cat.png".to_string(),
            mime_type: "image/png".to_string(),
            data: bytes::Bytes::from_static(&[0x89, 0x50, 0x4E, 0x47]),
        }
    }

    #[tokio::test]
    async fn test_publish_returns_gateway_uri() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .and(header("authorization", "Bearer test-jwt"))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("filename=\"cat.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "IpfsHash": "QmTestHash",
                "PinSize": 4,
                "Timestamp": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reference = publisher(&server).publish(blob()).await.unwrap();
        assert_eq!(reference.cid, "QmTestHash");
        assert_eq!(reference.uri, "https://gateway.test/ipfs/QmTestHash");
    }

    #[tokio::test]
    async fn test_publish_non_success_status_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = publisher(&server).publish(blob()).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_publish_unparseable_body_is_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = publisher(&server).publish(blob()).await.unwrap_err();
        assert!(matches!(err, PublishError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_publish_blank_hash_is_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pinning/pinFileToIPFS"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "IpfsHash": " " })),
            )
            .mount(&server)
            .await;

        let err = publisher(&server).publish(blob()).await.unwrap_err();
        assert!(matches!(err, PublishError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_publish_unreachable_endpoint_is_transport_error() {
        let publisher = PinataPublisher::new("jwt".to_string(), Duration::from_secs(2))
            .unwrap()
            .with_endpoint("http://127.0.0.1:1/pin".to_string());

        let err = publisher.publish(blob()).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }
}
