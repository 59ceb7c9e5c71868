#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CredentialStore, Credentials, InMemoryRepository, Storage, StorageError, TrailStore,
};
