// src/blob/memory.rs

//! In-process blob store
//!
//! Blob ids are the URL-safe base64 SHA-256 of the content, so identical
//! uploads share an id the way they do on the real network.

use super::{BlobAttributes, BlobStore, MIN_NATIVE_BALANCE, SUI_COIN_TYPE};
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

struct StoredBlob {
    data: Vec<u8>,
    attributes: BlobAttributes,
}

pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, StoredBlob>>,
    native: u128,
    utility: u128,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    /// Store whose signer can always afford uploads
    pub fn new() -> Self {
        Self::with_balances(MIN_NATIVE_BALANCE * 1000, 1_000_000_000)
    }

    pub fn with_balances(native: u128, utility: u128) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            native,
            utility,
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful `write_blob` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn attributes(&self, blob_id: &str) -> Option<BlobAttributes> {
        self.blobs.lock().get(blob_id).map(|b| b.attributes.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a blob directly, bypassing upload rules
    pub fn insert(&self, data: impl Into<Vec<u8>>) -> String {
        let data = data.into();
        let blob_id = content_id(&data);
        self.blobs.lock().insert(
            blob_id.clone(),
            StoredBlob {
                data,
                attributes: BlobAttributes::new(),
            },
        );
        blob_id
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn content_id(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

impl BlobStore for MemoryBlobStore {
    fn write_blob(&self, data: &[u8], attributes: &BlobAttributes, _epochs: u32) -> Result<String> {
        let blob_id = content_id(data);
        self.blobs.lock().insert(
            blob_id.clone(),
            StoredBlob {
                data: data.to_vec(),
                attributes: attributes.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(blob_id)
    }

    fn read_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .get(blob_id)
            .map(|b| b.data.clone())
            .ok_or_else(|| Error::BlobNotFound(blob_id.to_string()))
    }

    fn balance(&self, _owner: &str, coin_type: &str) -> Result<u128> {
        Ok(if coin_type == SUI_COIN_TYPE {
            self.native
        } else {
            self.utility
        })
    }
}
