//! Session persistence.
//!
//! The reserve/mint flow survives restarts by keeping five string values
//! under fixed keys. [`KeyValueStore`] is the storage seam with two
//! backends:
//! - **MemoryStore**: in-process, gone when the process exits.
//! - **JsonFileStore**: one JSON object on disk, rewritten atomically
//!   (temp file + rename) on every mutation.
//!
//! [`Session`] layers typed accessors over either backend.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bitcoin::Txid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::merkle::MerkleProof;
use crate::types::BlockDetails;

// ==============================================================================
// Keys
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Txid,
    TxStatus,
    BlockDetails,
    TxRaw,
    TxMerkleProof,
}

impl StoreKey {
    pub const ALL: [StoreKey; 5] = [
        StoreKey::Txid,
        StoreKey::TxStatus,
        StoreKey::BlockDetails,
        StoreKey::TxRaw,
        StoreKey::TxMerkleProof,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Txid => "txid",
            Self::TxStatus => "txStatus",
            Self::BlockDetails => "blockDetails",
            Self::TxRaw => "txRaw",
            Self::TxMerkleProof => "txMerkleProof",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// Store Trait and Backends
// ==============================================================================

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Option<String>;
    fn set(&mut self, key: StoreKey, value: String) -> Result<(), CoreError>;
    fn remove(&mut self, key: StoreKey) -> Result<(), CoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        self.entries.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StoreKey, value: String) -> Result<(), CoreError> {
        self.entries.insert(key.as_str().to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: StoreKey) -> Result<(), CoreError> {
        self.entries.remove(key.as_str());
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Load `path` if it exists; a missing file starts an empty session.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                CoreError::Store(format!("{}: not a JSON object of strings: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CoreError::Io(e)),
        };
        debug!(path = %path.display(), keys = entries.len(), "opened session file");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| CoreError::Store(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        self.entries.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StoreKey, value: String) -> Result<(), CoreError> {
        self.entries.insert(key.as_str().to_owned(), value);
        self.flush()
    }

    fn remove(&mut self, key: StoreKey) -> Result<(), CoreError> {
        if self.entries.remove(key.as_str()).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

// ==============================================================================
// Typed Session
// ==============================================================================

/// Stored confirmation state of the reservation payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Pending,
    Confirmed,
}

impl TxState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }
}

impl FromStr for TxState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(format!("unknown tx status `{other}`")),
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Session {
    store: Box<dyn KeyValueStore>,
}

impl Session {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn txid(&self) -> Option<Txid> {
        self.parsed(StoreKey::Txid)
    }

    pub fn set_txid(&mut self, txid: &Txid) -> Result<(), CoreError> {
        self.store.set(StoreKey::Txid, txid.to_string())
    }

    pub fn tx_state(&self) -> Option<TxState> {
        self.parsed(StoreKey::TxStatus)
    }

    /// The stored status string exactly as written, known or not.
    pub fn raw_tx_status(&self) -> Option<String> {
        self.store.get(StoreKey::TxStatus)
    }

    pub fn set_tx_state(&mut self, state: TxState) -> Result<(), CoreError> {
        self.store.set(StoreKey::TxStatus, state.as_str().to_owned())
    }

    pub fn block_details(&self) -> Option<BlockDetails> {
        self.json(StoreKey::BlockDetails)
    }

    pub fn set_block_details(&mut self, details: &BlockDetails) -> Result<(), CoreError> {
        self.set_json(StoreKey::BlockDetails, details)
    }

    pub fn tx_raw(&self) -> Option<String> {
        self.store.get(StoreKey::TxRaw)
    }

    pub fn set_tx_raw(&mut self, hex: &str) -> Result<(), CoreError> {
        self.store.set(StoreKey::TxRaw, hex.to_owned())
    }

    pub fn merkle_proof(&self) -> Option<MerkleProof> {
        self.json(StoreKey::TxMerkleProof)
    }

    pub fn set_merkle_proof(&mut self, proof: &MerkleProof) -> Result<(), CoreError> {
        self.set_json(StoreKey::TxMerkleProof, proof)
    }

    /// Remove every session key.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        for key in StoreKey::ALL {
            self.store.remove(key)?;
        }
        Ok(())
    }

    fn parsed<T: FromStr>(&self, key: StoreKey) -> Option<T>
    where
        T::Err: fmt::Display,
    {
        let raw = self.store.get(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%key, value = %raw, error = %e, "ignoring unparseable session value");
                None
            }
        }
    }

    fn json<T: DeserializeOwned>(&self, key: StoreKey) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%key, error = %e, "ignoring unparseable session value");
                None
            }
        }
    }

    fn set_json<T: Serialize>(&mut self, key: StoreKey, value: &T) -> Result<(), CoreError> {
        let encoded = serde_json::to_string(value).map_err(|e| CoreError::Store(e.to_string()))?;
        self.store.set(key, encoded)
    }
}
