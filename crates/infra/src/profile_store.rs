//! Profile persistence.
//!
//! Profiles are stored as JSON documents keyed by id, the shape a hosted
//! document database hands back. Reading a document that no longer matches
//! the schema (an unknown role, say) is an error, never a silent default.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;
use thiserror::Error;

use panelhub_auth::UserProfile;
use panelhub_core::ProfileId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("profile '{0}' not found")]
    NotFound(ProfileId),

    #[error("profile '{0}' already exists")]
    AlreadyExists(ProfileId),

    /// A conditional write found a different document than the one read.
    #[error("profile '{0}' changed since it was read")]
    Stale(ProfileId),

    #[error("profile '{id}' is unreadable: {reason}")]
    Corrupt { id: ProfileId, reason: String },

    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Profile fetch/create/update contract.
///
/// Writes take whole snapshots; partial edits are applied to a snapshot by
/// the domain first (`UserProfile::with_patch`) so every stored document is
/// complete.
pub trait ProfileStore: Send + Sync {
    fn fetch(&self, id: &ProfileId) -> Result<Option<UserProfile>, StoreError>;

    /// Insert a new document. Fails if the id is taken.
    fn create(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Replace an existing document. Fails if the id is unknown.
    fn update(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Replace the document only if it still reads as `current`.
    ///
    /// Read-modify-write flows use this so a transition written by someone
    /// else in between is never overwritten with an older snapshot.
    fn replace(&self, current: &UserProfile, next: &UserProfile) -> Result<(), StoreError>;

    /// Every readable profile. Unreadable documents are skipped.
    fn list(&self) -> Result<Vec<UserProfile>, StoreError>;
}

impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    fn fetch(&self, id: &ProfileId) -> Result<Option<UserProfile>, StoreError> {
        (**self).fetch(id)
    }

    fn create(&self, profile: &UserProfile) -> Result<(), StoreError> {
        (**self).create(profile)
    }

    fn update(&self, profile: &UserProfile) -> Result<(), StoreError> {
        (**self).update(profile)
    }

    fn replace(&self, current: &UserProfile, next: &UserProfile) -> Result<(), StoreError> {
        (**self).replace(current, next)
    }

    fn list(&self) -> Result<Vec<UserProfile>, StoreError> {
        (**self).list()
    }
}

/// In-memory document store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    documents: RwLock<HashMap<ProfileId, JsonValue>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a raw document in place, bypassing the schema (seeding, migrations).
    pub fn insert_raw(&self, id: ProfileId, document: JsonValue) -> Result<(), StoreError> {
        let mut docs = self.write()?;
        docs.insert(id, document);
        Ok(())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ProfileId, JsonValue>>, StoreError> {
        self.documents
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ProfileId, JsonValue>>, StoreError> {
        self.documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

fn encode(profile: &UserProfile) -> Result<JsonValue, StoreError> {
    serde_json::to_value(profile).map_err(|e| StoreError::Corrupt {
        id: profile.id.clone(),
        reason: e.to_string(),
    })
}

fn decode(id: &ProfileId, document: &JsonValue) -> Result<UserProfile, StoreError> {
    serde_json::from_value(document.clone()).map_err(|e| StoreError::Corrupt {
        id: id.clone(),
        reason: e.to_string(),
    })
}

impl ProfileStore for InMemoryProfileStore {
    fn fetch(&self, id: &ProfileId) -> Result<Option<UserProfile>, StoreError> {
        let docs = self.read()?;
        docs.get(id).map(|doc| decode(id, doc)).transpose()
    }

    fn create(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let doc = encode(profile)?;
        let mut docs = self.write()?;
        if docs.contains_key(&profile.id) {
            return Err(StoreError::AlreadyExists(profile.id.clone()));
        }
        docs.insert(profile.id.clone(), doc);
        Ok(())
    }

    fn update(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let doc = encode(profile)?;
        let mut docs = self.write()?;
        match docs.get_mut(&profile.id) {
            Some(slot) => {
                *slot = doc;
                Ok(())
            }
            None => Err(StoreError::NotFound(profile.id.clone())),
        }
    }

    fn replace(&self, current: &UserProfile, next: &UserProfile) -> Result<(), StoreError> {
        let doc = encode(next)?;
        let mut docs = self.write()?;
        let slot = docs
            .get_mut(&current.id)
            .ok_or_else(|| StoreError::NotFound(current.id.clone()))?;
        if decode(&current.id, slot)? != *current {
            return Err(StoreError::Stale(current.id.clone()));
        }
        *slot = doc;
        Ok(())
    }

    fn list(&self) -> Result<Vec<UserProfile>, StoreError> {
        let docs = self.read()?;
        let mut out: Vec<UserProfile> = docs
            .iter()
            .filter_map(|(id, doc)| match decode(id, doc) {
                Ok(p) => Some(p),
                Err(err) => {
                    tracing::warn!(profile_id = %id, error = %err, "skipping unreadable profile");
                    None
                }
            })
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }
}
