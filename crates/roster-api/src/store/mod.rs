//! # Profile Persistence
//!
//! The [`ProfileStore`] trait is the single seam between request handlers and
//! the document store. Handlers hold an `Arc<dyn ProfileStore>` injected
//! through [`AppState`](crate::state::AppState), so the PostgreSQL backend and
//! the in-memory backend are interchangeable.
//!
//! ## Semantics shared by every backend
//!
//! - Documents come back in insertion order, fields in stored order.
//! - Filters are parsed [`Filter`]s: equality containment plus the comparison
//!   operators, evaluated identically by every backend (see [`Filter::matches`]).
//! - `name` is unique across the collection. A write that would break this
//!   fails with [`StoreError::Conflict`], even when a handler's preliminary
//!   lookup raced with another writer.
//! - Faults never masquerade as absence: a missing document is `Ok(None)` or
//!   [`StoreError::NotFound`], a broken connection is [`StoreError::Database`].

pub mod memory;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use roster_core::{Document, Filter, Profile, ProfileId};
use serde_json::Value;
use thiserror::Error;

use crate::config::{AppConfig, StoreBackend};

pub use memory::InMemoryProfileStore;
pub use postgres::PgProfileStore;

/// Errors raised by a [`ProfileStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// No profile exists with the given identifier.
    #[error("profile {0} not found")]
    NotFound(ProfileId),

    /// The write would violate the uniqueness of `field`.
    #[error("unique constraint violated: {field} = {value}")]
    Conflict { field: String, value: String },

    /// A stored document could not be decoded.
    #[error("corrupt stored document: {0}")]
    Corrupt(String),

    /// Connection, query, or protocol failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Selection for [`ProfileStore::find_many`].
///
/// `skip` and `limit` left unset return every match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    /// The whole collection, unpaged.
    pub fn all() -> Self {
        Self::default()
    }

    /// A single page of the profiles matching `filter`.
    pub fn paged(filter: Filter, skip: u64, limit: u64) -> Self {
        Self {
            filter,
            skip: Some(skip),
            limit: Some(limit),
        }
    }
}

/// Result of [`ProfileStore::find_many`].
///
/// `total` counts every profile matching the filter, ignoring skip and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePage {
    pub profiles: Vec<Profile>,
    pub total: u64,
}

/// Document store holding the profile collection.
#[async_trait]
pub trait ProfileStore: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// First profile whose `field` equals `value`.
    async fn find_by_field(&self, field: &str, value: &Value)
        -> Result<Option<Profile>, StoreError>;

    async fn find_by_id(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;

    async fn find_many(&self, query: &ListQuery) -> Result<ProfilePage, StoreError>;

    /// Insert a new profile and return the identifier the store assigned.
    ///
    /// Any `_id` in `fields` is discarded.
    async fn insert(&self, fields: Document) -> Result<ProfileId, StoreError>;

    /// Merge `fields` into the stored profile, leaving omitted fields intact.
    async fn update_by_id(&self, id: ProfileId, fields: Document) -> Result<(), StoreError>;

    /// Remove a profile, returning it as it was immediately before deletion.
    async fn delete_by_id(&self, id: ProfileId) -> Result<Profile, StoreError>;
}

/// Open the store selected by the configuration.
///
/// For PostgreSQL this connects the pool, creates the table and indexes when
/// missing, and pings the server once.
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn ProfileStore>, StoreError> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory profile store; data will not survive restarts");
            Ok(Arc::new(InMemoryProfileStore::new()))
        }
        StoreBackend::Postgres => {
            let store =
                PgProfileStore::connect(&config.database_url, &config.table, config.max_connections)
                    .await?;
            store.ensure_schema().await?;
            store.ping().await?;
            tracing::info!(table = %config.table, "connected to PostgreSQL");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_query_all_is_unpaged_and_unfiltered() {
        let q = ListQuery::all();
        assert!(q.filter.is_empty());
        assert_eq!(q.skip, None);
        assert_eq!(q.limit, None);
    }

    #[test]
    fn list_query_paged_sets_bounds() {
        let q = ListQuery::paged(Filter::eq("name", json!("A")), 10, 5);
        assert_eq!(q.skip, Some(10));
        assert_eq!(q.limit, Some(5));
        assert_eq!(q.filter.conditions()[0].operand, json!("A"));
    }

    #[test]
    fn store_error_display() {
        let id = ProfileId::new();
        assert_eq!(StoreError::NotFound(id).to_string(), format!("profile {id} not found"));
        let err = StoreError::Conflict {
            field: "name".into(),
            value: "\"Asha\"".into(),
        };
        assert!(err.to_string().contains("name"));
        assert!(StoreError::from(sqlx::Error::PoolTimedOut)
            .to_string()
            .starts_with("database error"));
    }
}
