//! File content storage.
//!
//! File metadata lives in the [`crate::db`] repositories; the bytes live in a
//! [`BlobStore`] keyed by the same [`FileId`].

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::instrument;

use crate::errors::Error;
use crate::types::{FileId, abbrev_uuid};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store content for a file, replacing anything already there
    async fn put(&self, id: FileId, content: Bytes) -> Result<(), Error>;

    async fn get(&self, id: FileId) -> Result<Option<Bytes>, Error>;

    /// Drop a file's content. Missing content is not an error.
    async fn delete(&self, id: FileId) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<FileId, Bytes>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    #[instrument(skip(self, content), fields(file_id = %abbrev_uuid(&id), size = content.len()), err)]
    async fn put(&self, id: FileId, content: Bytes) -> Result<(), Error> {
        self.blobs.insert(id, content);
        Ok(())
    }

    #[instrument(skip(self), fields(file_id = %abbrev_uuid(&id)), err)]
    async fn get(&self, id: FileId) -> Result<Option<Bytes>, Error> {
        Ok(self.blobs.get(&id).map(|b| b.value().clone()))
    }

    #[instrument(skip(self), fields(file_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: FileId) -> Result<(), Error> {
        self.blobs.remove(&id);
        Ok(())
    }
}
