//! In-process profile store.
//!
//! Profiles live in an insertion-ordered `Vec` behind a `parking_lot::RwLock`.
//! The lock is never held across an `.await`, and every write performs its
//! uniqueness check and mutation under one write guard, so two concurrent
//! creates with the same `name` cannot both succeed.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use roster_core::{merge_fields, Document, Filter, Profile, ProfileId, NAME_FIELD};
use serde_json::Value;

use super::{ListQuery, ProfilePage, ProfileStore, StoreError};

/// Thread-safe, cloneable in-memory [`ProfileStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<Vec<Profile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

/// Whether some profile other than `except` already holds `name`.
fn name_taken(profiles: &[Profile], name: &Value, except: Option<ProfileId>) -> bool {
    profiles
        .iter()
        .filter(|p| Some(p.id) != except)
        .any(|p| p.fields.get(NAME_FIELD) == Some(name))
}

fn conflict(name: &Value) -> StoreError {
    StoreError::Conflict {
        field: NAME_FIELD.to_string(),
        value: name.to_string(),
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_field(
        &self,
        field: &str,
        value: &Value,
    ) -> Result<Option<Profile>, StoreError> {
        let filter = Filter::eq(field, value.clone());
        Ok(self
            .profiles
            .read()
            .iter()
            .find(|p| filter.matches(p))
            .cloned())
    }

    async fn find_by_id(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.read().iter().find(|p| p.id == id).cloned())
    }

    async fn find_many(&self, query: &ListQuery) -> Result<ProfilePage, StoreError> {
        let guard = self.profiles.read();
        let matching: Vec<&Profile> = guard.iter().filter(|p| query.filter.matches(p)).collect();
        let total = matching.len() as u64;

        let skip = query
            .skip
            .map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        let profiles = matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        Ok(ProfilePage { profiles, total })
    }

    async fn insert(&self, fields: Document) -> Result<ProfileId, StoreError> {
        let mut guard = self.profiles.write();
        if let Some(name) = fields.get(NAME_FIELD) {
            if name_taken(&guard, name, None) {
                return Err(conflict(name));
            }
        }
        let id = ProfileId::new();
        guard.push(Profile::new(id, fields));
        Ok(id)
    }

    async fn update_by_id(&self, id: ProfileId, fields: Document) -> Result<(), StoreError> {
        let mut guard = self.profiles.write();
        let index = guard
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let mut merged = guard[index].fields.clone();
        merge_fields(&mut merged, fields);
        if let Some(name) = merged.get(NAME_FIELD) {
            if name_taken(&guard, name, Some(id)) {
                return Err(conflict(name));
            }
        }
        guard[index].fields = merged;
        Ok(())
    }

    async fn delete_by_id(&self, id: ProfileId) -> Result<Profile, StoreError> {
        let mut guard = self.profiles.write();
        let index = guard
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))?;
        Ok(guard.remove(index))
    }
}
