//! Keyed store of uploaded binary artifacts with delivery tracking
//!
//! An upload payload is a text header line `<name> <id> <format>` followed
//! by raw bytes. Artifacts are stored under the key `<name>-<id>.<format>`,
//! one slot per key: re-uploading overwrites the prior artifact and resets
//! its delivery record. Each artifact is handed to a given requester at most
//! once. Bytes are mirrored to a local directory so uploads survive restart;
//! delivery tracking does not.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

/// A stored upload
#[derive(Debug, Clone)]
struct FileArtifact {
    /// Key and on-disk name: `<name>-<id>.<format>`
    filename: String,
    bytes: Bytes,
    /// Identity ids this artifact has been delivered to
    delivered_to: HashSet<String>,
}

/// Encode an upload payload (client side)
pub fn encode_upload(name: &str, file_id: &str, format: &str, bytes: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(name.len() + file_id.len() + format.len() + 3 + bytes.len());
    out.extend_from_slice(format!("{} {} {}\n", name, file_id, format).as_bytes());
    out.extend_from_slice(bytes);
    Bytes::from(out)
}

/// In-memory artifact store mirrored to a local directory
#[derive(Debug)]
pub struct FileRelay {
    artifacts: RwLock<BTreeMap<String, FileArtifact>>,
    storage_dir: PathBuf,
}

impl FileRelay {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            artifacts: RwLock::new(BTreeMap::new()),
            storage_dir,
        }
    }

    /// Parse an upload payload and store the artifact
    ///
    /// Returns the artifact filename. Overwrites any prior artifact at the
    /// same key, resetting its delivery record. The relay performs no size
    /// check: the upload ceiling is enforced by the sending client.
    pub async fn ingest(&self, payload: &[u8]) -> Result<String> {
        let newline = payload
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| RelayError::parse("Upload payload missing header line"))?;
        let header = std::str::from_utf8(&payload[..newline])
            .map_err(|_| RelayError::parse("Upload header is not UTF-8"))?;

        let mut tokens = header.split_whitespace();
        let (name, file_id, format) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(name), Some(file_id), Some(format)) if tokens.next().is_none() => {
                (name, file_id, format)
            }
            _ => {
                return Err(RelayError::parse(format!(
                    "Bad upload header: {:?}",
                    header
                )))
            }
        };

        let filename = format!("{}-{}.{}", name, file_id, format);
        let bytes = Bytes::copy_from_slice(&payload[newline + 1..]);

        // Mirror to disk; the in-memory slot is authoritative for delivery
        if let Err(e) = self.persist(&filename, &bytes).await {
            warn!("Failed to mirror artifact '{}' to disk: {}", filename, e);
        }

        let mut artifacts = self.artifacts.write().await;
        debug!("Stored artifact '{}' ({} bytes)", filename, bytes.len());
        artifacts.insert(
            filename.clone(),
            FileArtifact {
                filename: filename.clone(),
                bytes,
                delivered_to: HashSet::new(),
            },
        );
        Ok(filename)
    }

    async fn persist(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        tokio::fs::write(self.storage_dir.join(filename), bytes).await?;
        Ok(())
    }

    /// Hand the requester the first artifact it has not yet received
    ///
    /// Artifacts are scanned in key order, so fetch order is deterministic.
    /// The returned artifact is marked delivered to this requester.
    pub async fn fetch(&self, requester_id: &str) -> Option<(String, Bytes)> {
        let mut artifacts = self.artifacts.write().await;
        let artifact = artifacts
            .values_mut()
            .find(|a| !a.delivered_to.contains(requester_id))?;
        artifact.delivered_to.insert(requester_id.to_string());
        Some((artifact.filename.clone(), artifact.bytes.clone()))
    }

    /// Number of stored artifacts
    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}
