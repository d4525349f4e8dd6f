//! Base repository trait for data access.

use std::collections::HashMap;

/// Contains the Repository trait.
///
/// A repository is the data access layer for one kind of record. It provides
/// methods for creating, reading, updating and listing entities with simple
/// filters. Deletion is entity-specific (roles and files have different
/// reference rules), so it lives on the concrete repositories.
use crate::db::errors::Result;

/// Base repository trait providing common operations
///
/// This trait has separate associated types for create requests, update requests, and responses.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Get lots of entities by their IDs, keyed by ID
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    /// List entities with filtering and pagination
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Update an entity by ID
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
