// src/blob/mod.rs

//! Blob publishing and retrieval
//!
//! `BlobStore` is the seam to the content-addressed network. `BlobService`
//! layers the application rules on top: payload encoding, upload
//! attributes, the balance gate, text decoding and content sniffing.

pub mod memory;
pub mod signer;
pub mod walrus;

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub use memory::MemoryBlobStore;
pub use walrus::WalrusStore;

/// Native SUI coin type
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// WAL token used to pay for storage
pub const WAL_COIN_TYPE: &str =
    "0x8270feb7375eee355e64fdb69c50abb6b5f9393a722883c1cf45f8e26048810a::wal::WAL";

/// Minimum native balance (in MIST) required before an upload
pub const MIN_NATIVE_BALANCE: u128 = 1_000_000;

/// Default storage duration in epochs
pub const DEFAULT_EPOCHS: u32 = 3;

/// Key/value attributes attached to an uploaded blob
pub type BlobAttributes = BTreeMap<String, String>;

/// Content-addressed blob network
pub trait BlobStore: Send + Sync {
    /// Store bytes for `epochs` epochs and return the blob id
    fn write_blob(&self, data: &[u8], attributes: &BlobAttributes, epochs: u32) -> Result<String>;

    /// Fetch the bytes of a blob
    fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>>;

    /// Total balance of `coin_type` owned by `owner`
    fn balance(&self, owner: &str, coin_type: &str) -> Result<u128>;
}

/// Data accepted for upload
#[derive(Debug, Clone)]
pub enum BlobPayload {
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl BlobPayload {
    /// Serialize a value as a JSON payload
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(BlobPayload::Json(serde_json::to_value(value)?))
    }

    fn content_type(&self) -> &'static str {
        match self {
            BlobPayload::Text(_) => "text/plain",
            BlobPayload::Bytes(_) => "application/octet-stream",
            BlobPayload::Json(_) => "application/json",
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>> {
        Ok(match self {
            BlobPayload::Text(text) => text.into_bytes(),
            BlobPayload::Bytes(bytes) => bytes,
            BlobPayload::Json(value) => serde_json::to_vec(&value)?,
        })
    }
}

/// Signer balances, in the smallest unit of each coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balances {
    /// SUI, in MIST
    pub native: u128,
    /// WAL
    pub utility: u128,
}

impl Balances {
    pub fn can_upload(&self) -> bool {
        self.native >= MIN_NATIVE_BALANCE && self.utility > 0
    }
}

/// Text encodings accepted by `read_blob_as_text`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Base64,
    Hex,
}

impl std::str::FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin1" | "binary" => Ok(TextEncoding::Latin1),
            "base64" => Ok(TextEncoding::Base64),
            "hex" => Ok(TextEncoding::Hex),
            other => Err(Error::Validation(format!("unsupported encoding '{}'", other))),
        }
    }
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::BlobDownloadFailed(format!("blob is not valid UTF-8: {}", e))),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            TextEncoding::Base64 => Ok(STANDARD.encode(bytes)),
            TextEncoding::Hex => Ok(hex::encode(bytes)),
        }
    }
}

/// Guess a content type from the leading bytes of a blob
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.len() <= 4 {
        return "application/octet-stream";
    }
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return "image/jpeg";
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if bytes.starts_with(b"GIF8") {
        return "image/gif";
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let text = text.trim();
            if text.starts_with('{')
                && text.ends_with('}')
                && serde_json::from_str::<serde_json::Value>(text).is_ok()
            {
                "application/json"
            } else if text.starts_with('<') && text.ends_with('>') {
                "text/html"
            } else {
                "text/plain"
            }
        }
        Err(_) => "application/octet-stream",
    }
}

/// Application-level access to the blob network
#[derive(Clone)]
pub struct BlobService {
    store: Arc<dyn BlobStore>,
    signer: String,
    epochs: u32,
}

impl BlobService {
    pub fn new(store: Arc<dyn BlobStore>, signer: impl Into<String>) -> Self {
        Self {
            store,
            signer: signer.into(),
            epochs: DEFAULT_EPOCHS,
        }
    }

    pub fn with_epochs(mut self, epochs: u32) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn signer_address(&self) -> &str {
        &self.signer
    }

    /// SUI and WAL balances of the signer
    pub fn check_balance(&self) -> Result<Balances> {
        let balances = Balances {
            native: self.store.balance(&self.signer, SUI_COIN_TYPE)?,
            utility: self.store.balance(&self.signer, WAL_COIN_TYPE)?,
        };
        debug!(
            "Balances for {}: {} MIST, {} WAL",
            self.signer, balances.native, balances.utility
        );
        Ok(balances)
    }

    fn ensure_balance(&self) -> Result<()> {
        let balances = self.check_balance()?;
        if !balances.can_upload() {
            return Err(Error::InsufficientBalance(format!(
                "signer {} holds {} MIST and {} WAL; uploads need at least {} MIST and some WAL",
                self.signer, balances.native, balances.utility, MIN_NATIVE_BALANCE
            )));
        }
        Ok(())
    }

    /// Upload a payload and return its blob id
    pub fn upload_blob(&self, payload: BlobPayload, description: Option<&str>) -> Result<String> {
        let content_type = payload.content_type();
        let bytes = payload.into_bytes()?;

        let mut extra = BlobAttributes::new();
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            extra.insert("description".to_string(), description.to_string());
        }
        self.upload_with_attributes(bytes, content_type, extra)
    }

    /// Upload raw bytes with a caller-chosen content type and extra attributes
    pub fn upload_with_attributes(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        mut attributes: BlobAttributes,
    ) -> Result<String> {
        self.ensure_balance()?;

        attributes.insert("contentType".to_string(), content_type.to_string());
        attributes.insert("contentLength".to_string(), bytes.len().to_string());

        let blob_id = self.store.write_blob(&bytes, &attributes, self.epochs)?;
        info!("Uploaded {} bytes as blob {}", bytes.len(), blob_id);
        Ok(blob_id)
    }

    pub fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        let blob_id = blob_id.trim();
        if blob_id.is_empty() {
            return Err(Error::Validation("blobId is required".to_string()));
        }
        self.store.read_blob(blob_id)
    }

    /// Read a blob and decode it as text (UTF-8 unless told otherwise)
    pub fn read_blob_as_text(&self, blob_id: &str, encoding: Option<&str>) -> Result<String> {
        let encoding: TextEncoding = encoding.unwrap_or("utf-8").parse()?;
        let bytes = self.read_blob(blob_id)?;
        encoding.decode(&bytes)
    }

    /// Read a blob together with a best-effort content type
    pub fn read_blob_raw(&self, blob_id: &str) -> Result<(Vec<u8>, &'static str)> {
        let bytes = self.read_blob(blob_id)?;
        let content_type = sniff_content_type(&bytes);
        Ok((bytes, content_type))
    }
}
