// src/blob/walrus.rs

//! Walrus HTTP client
//!
//! Uploads go to a publisher (`PUT /v1/blobs`), reads to an aggregator
//! (`GET /v1/blobs/<id>`), and balances come from a Sui full node over
//! JSON-RPC (`suix_getBalance`).

use super::{BlobAttributes, BlobStore};
use crate::error::{Error, Result, UploadFailure};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_PUBLISHER_URL: &str = "https://publisher.walrus-mainnet.walrus.space";
pub const DEFAULT_AGGREGATOR_URL: &str = "https://aggregator.walrus-mainnet.walrus.space";
pub const DEFAULT_SUI_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";

/// Timeout for uploads, which include encoding and certification
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for reads and RPC calls
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum attempts for aggregator reads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

pub struct WalrusStore {
    client: Client,
    publisher_url: String,
    aggregator_url: Url,
    rpc_url: String,
    /// Address that receives the blob object created by the publisher
    send_object_to: Option<String>,
    max_retries: u32,
}

impl WalrusStore {
    pub fn new(
        publisher_url: impl Into<String>,
        aggregator_url: impl Into<String>,
        rpc_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let aggregator_url = aggregator_url.into();
        let aggregator_url = Url::parse(&aggregator_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| Error::Config(format!("invalid aggregator URL '{}'", aggregator_url)))?;

        Ok(Self {
            client,
            publisher_url: trim_base(publisher_url.into()),
            aggregator_url,
            rpc_url: rpc_url.into(),
            send_object_to: None,
            max_retries: MAX_RETRIES,
        })
    }

    /// Mainnet publisher, aggregator and full node
    pub fn mainnet() -> Result<Self> {
        Self::new(DEFAULT_PUBLISHER_URL, DEFAULT_AGGREGATOR_URL, DEFAULT_SUI_RPC_URL)
    }

    pub fn send_object_to(mut self, address: impl Into<String>) -> Self {
        self.send_object_to = Some(address.into());
        self
    }

    fn upload_url(&self, epochs: u32) -> String {
        let mut url = format!("{}/v1/blobs?epochs={}", self.publisher_url, epochs);
        if let Some(owner) = &self.send_object_to {
            url.push_str("&send_object_to=");
            url.push_str(owner);
        }
        url
    }

    /// Aggregator URL for a blob, with the id percent-encoded as one segment
    fn blob_url(&self, blob_id: &str) -> Url {
        let mut url = self.aggregator_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v1", "blobs", blob_id]);
        }
        url
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn transport_failure(e: &reqwest::Error) -> UploadFailure {
    if e.is_timeout() {
        UploadFailure::Timeout
    } else if e.is_connect() {
        UploadFailure::Connection
    } else {
        UploadFailure::Internal
    }
}

/// Extract the blob id from a publisher response
///
/// Fresh uploads answer `{"newlyCreated": {"blobObject": {"blobId": ..}}}`,
/// repeated content answers `{"alreadyCertified": {"blobId": ..}}`.
pub fn parse_publisher_response(body: &Value) -> Option<String> {
    body.pointer("/newlyCreated/blobObject/blobId")
        .or_else(|| body.pointer("/alreadyCertified/blobId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract `totalBalance` from a `suix_getBalance` response
pub fn parse_balance_response(body: &Value) -> Result<u128> {
    if let Some(error) = body.get("error") {
        return Err(Error::Http(format!("balance query failed: {}", error)));
    }
    let total = body
        .pointer("/result/totalBalance")
        .ok_or_else(|| Error::Http("balance response has no totalBalance".to_string()))?;

    match total {
        Value::String(s) => s
            .parse()
            .map_err(|e| Error::Http(format!("invalid totalBalance '{}': {}", s, e))),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| Error::Http(format!("invalid totalBalance {}", n))),
        other => Err(Error::Http(format!("invalid totalBalance {}", other))),
    }
}

impl BlobStore for WalrusStore {
    fn write_blob(&self, data: &[u8], attributes: &BlobAttributes, epochs: u32) -> Result<String> {
        let url = self.upload_url(epochs);
        info!("Uploading {} bytes to {}", data.len(), self.publisher_url);
        // The HTTP publisher has no attribute parameter
        debug!("Blob attributes: {:?}", attributes);

        let response = self
            .client
            .put(&url)
            .timeout(UPLOAD_TIMEOUT)
            .body(data.to_vec())
            .send()
            .map_err(|e| Error::BlobUploadFailed {
                reason: transport_failure(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Error::BlobUploadFailed {
                reason: UploadFailure::from_status(status.as_u16()),
                message: format!("HTTP {}: {}", status, message.trim()),
            });
        }

        let body: Value = response.json().map_err(|e| Error::BlobUploadFailed {
            reason: UploadFailure::Internal,
            message: format!("unreadable publisher response: {}", e),
        })?;

        parse_publisher_response(&body).ok_or_else(|| Error::BlobUploadFailed {
            reason: UploadFailure::Internal,
            message: format!("publisher response carries no blobId: {}", body),
        })
    }

    fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        let url = self.blob_url(blob_id);
        debug!("Fetching {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url.clone()).send() {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NOT_FOUND {
                        return Err(Error::BlobNotFound(blob_id.to_string()));
                    }
                    if !status.is_success() {
                        return Err(Error::BlobDownloadFailed(format!(
                            "HTTP {} from {}",
                            status, url
                        )));
                    }
                    return response
                        .bytes()
                        .map(|b| b.to_vec())
                        .map_err(|e| Error::BlobDownloadFailed(e.to_string()));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::BlobDownloadFailed(format!(
                            "failed to fetch {} after {} attempts: {}",
                            blob_id, attempt, e
                        )));
                    }
                    warn!("Blob fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn balance(&self, owner: &str, coin_type: &str) -> Result<u128> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "suix_getBalance",
            "params": [owner, coin_type],
        });

        let body: Value = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| Error::Http(format!("balance query to {} failed: {}", self.rpc_url, e)))?;

        parse_balance_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let store = WalrusStore::new("https://pub.example/", "https://agg.example", "https://rpc.example")
            .unwrap()
            .send_object_to("0xabc");
        assert_eq!(
            store.upload_url(3),
            "https://pub.example/v1/blobs?epochs=3&send_object_to=0xabc"
        );
        assert_eq!(store.blob_url("xyz").as_str(), "https://agg.example/v1/blobs/xyz");
    }

    #[test]
    fn test_blob_url_escapes_id() {
        let store = WalrusStore::new("https://pub.example", "https://agg.example/walrus/", "https://rpc.example").unwrap();
        let url = store.blob_url("abc?x=1#frag/../y");
        assert_eq!(url.as_str(), "https://agg.example/walrus/v1/blobs/abc%3Fx=1%23frag%2F..%2Fy");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_invalid_aggregator_url_is_config_error() {
        let result = WalrusStore::new("https://pub.example", "not a url", "https://rpc.example");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_publisher_response() {
        let created = json!({"newlyCreated": {"blobObject": {"id": "0x1", "blobId": "abc"}}});
        assert_eq!(parse_publisher_response(&created).as_deref(), Some("abc"));

        let certified = json!({"alreadyCertified": {"blobId": "def", "endEpoch": 40}});
        assert_eq!(parse_publisher_response(&certified).as_deref(), Some("def"));

        assert_eq!(parse_publisher_response(&json!({"other": 1})), None);
    }

    #[test]
    fn test_parse_balance_response() {
        let ok = json!({"jsonrpc": "2.0", "id": 1, "result": {"coinType": "0x2::sui::SUI", "totalBalance": "2500000"}});
        assert_eq!(parse_balance_response(&ok).unwrap(), 2_500_000);

        let err = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "bad"}});
        assert!(matches!(parse_balance_response(&err), Err(Error::Http(_))));
    }
}
