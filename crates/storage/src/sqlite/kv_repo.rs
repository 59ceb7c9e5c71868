use async_trait::async_trait;
use chrono::Utc;
use quiz_core::model::TrailRecord;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{
    CredentialStore, Credentials, StorageError, TrailStore, decode_credentials, decode_trail,
    encode_credentials, encode_trail,
};

const TRAIL_KEY: &str = "session_trail";
const CREDENTIALS_KEY: &str = "credentials";

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM key_values WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|r| {
            r.try_get::<String, _>("value")
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn put_value(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO key_values (key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn delete_value(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM key_values WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}

#[async_trait]
impl TrailStore for SqliteRepository {
    async fn save_trail(&self, record: &TrailRecord) -> Result<(), StorageError> {
        let encoded = encode_trail(record)?;
        self.put_value(TRAIL_KEY, &encoded).await
    }

    async fn load_trail(&self) -> Result<Option<TrailRecord>, StorageError> {
        self.get_value(TRAIL_KEY)
            .await?
            .as_deref()
            .map(decode_trail)
            .transpose()
    }

    async fn clear_trail(&self) -> Result<(), StorageError> {
        self.delete_value(TRAIL_KEY).await
    }
}

#[async_trait]
impl CredentialStore for SqliteRepository {
    async fn save_credentials(&self, credentials: &Credentials) -> Result<(), StorageError> {
        let encoded = encode_credentials(credentials)?;
        self.put_value(CREDENTIALS_KEY, &encoded).await
    }

    async fn load_credentials(&self) -> Result<Option<Credentials>, StorageError> {
        self.get_value(CREDENTIALS_KEY)
            .await?
            .as_deref()
            .map(decode_credentials)
            .transpose()
    }

    async fn clear_credentials(&self) -> Result<(), StorageError> {
        self.delete_value(CREDENTIALS_KEY).await
    }
}
