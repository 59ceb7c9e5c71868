use async_trait::async_trait;
use quiz_core::model::{TRAIL_SCHEMA_VERSION, TrailRecord, UserId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stored record has schema version {found}, expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

/// Auth state kept on the device between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            user_id: None,
            username: None,
        }
    }
}

/// Durable slot for the trail of the last finished session.
///
/// Each save overwrites the previous record wholesale.
#[async_trait]
pub trait TrailStore: Send + Sync {
    /// Replace the stored trail.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be encoded or written.
    async fn save_trail(&self, record: &TrailRecord) -> Result<(), StorageError>;

    /// Load the stored trail, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SchemaMismatch` for records written by another
    /// schema version, or other storage errors.
    async fn load_trail(&self) -> Result<Option<TrailRecord>, StorageError>;

    /// Remove the stored trail. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_trail(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the credentials cannot be written.
    async fn save_credentials(&self, credentials: &Credentials) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failures.
    async fn load_credentials(&self) -> Result<Option<Credentials>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_credentials(&self) -> Result<(), StorageError>;
}

//
// ─── CODEC ─────────────────────────────────────────────────────────────────────
//

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

pub(crate) fn encode_trail(record: &TrailRecord) -> Result<String, StorageError> {
    serde_json::to_string(record).map_err(ser)
}

/// Checks the schema version before decoding the body, so a layout change
/// surfaces as `SchemaMismatch` instead of a confusing field error.
pub(crate) fn decode_trail(raw: &str) -> Result<TrailRecord, StorageError> {
    let probe: VersionProbe = serde_json::from_str(raw).map_err(ser)?;
    if probe.schema_version != TRAIL_SCHEMA_VERSION {
        return Err(StorageError::SchemaMismatch {
            found: probe.schema_version,
            expected: TRAIL_SCHEMA_VERSION,
        });
    }
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn encode_credentials(credentials: &Credentials) -> Result<String, StorageError> {
    serde_json::to_string(credentials).map_err(ser)
}

pub(crate) fn decode_credentials(raw: &str) -> Result<Credentials, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// In-memory backend for tests and prototyping.
///
/// Records go through the same JSON codec as `SQLite` so schema checks behave
/// identically.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    trail: Arc<Mutex<Option<String>>>,
    credentials: Arc<Mutex<Option<String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw JSON in the trail slot, bypassing the encoder.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_raw_trail(&self, raw: impl Into<String>) -> Result<(), StorageError> {
        let mut guard = lock(&self.trail)?;
        *guard = Some(raw.into());
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl TrailStore for InMemoryRepository {
    async fn save_trail(&self, record: &TrailRecord) -> Result<(), StorageError> {
        let encoded = encode_trail(record)?;
        *lock(&self.trail)? = Some(encoded);
        Ok(())
    }

    async fn load_trail(&self) -> Result<Option<TrailRecord>, StorageError> {
        let guard = lock(&self.trail)?;
        guard.as_deref().map(decode_trail).transpose()
    }

    async fn clear_trail(&self) -> Result<(), StorageError> {
        *lock(&self.trail)? = None;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryRepository {
    async fn save_credentials(&self, credentials: &Credentials) -> Result<(), StorageError> {
        let encoded = encode_credentials(credentials)?;
        *lock(&self.credentials)? = Some(encoded);
        Ok(())
    }

    async fn load_credentials(&self) -> Result<Option<Credentials>, StorageError> {
        let guard = lock(&self.credentials)?;
        guard.as_deref().map(decode_credentials).transpose()
    }

    async fn clear_credentials(&self) -> Result<(), StorageError> {
        *lock(&self.credentials)? = None;
        Ok(())
    }
}

/// Aggregates the stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub trails: Arc<dyn TrailStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let trails: Arc<dyn TrailStore> = Arc::new(repo.clone());
        let credentials: Arc<dyn CredentialStore> = Arc::new(repo);
        Self {
            trails,
            credentials,
        }
    }
}
