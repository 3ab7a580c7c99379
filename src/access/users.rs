use quizdeck_core::{Collection, UserData};

use super::AccessError;
use crate::db::DocumentStore;

/// Per-user profile documents, keyed by uid.
#[derive(Clone)]
pub struct UserRepository {
    store: DocumentStore,
}

impl UserRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, uid: &str) -> Result<Option<UserData>, AccessError> {
        Ok(self.store.get(Collection::Users, uid).await?)
    }

    pub async fn put(&self, user: &UserData) -> Result<(), AccessError> {
        self.store.set(Collection::Users, &user.uid, user).await?;
        Ok(())
    }

    /// Points the profile at a new picture. Returns `Ok(false)` if the user has
    /// no profile document.
    pub async fn set_photo_url(&self, uid: &str, url: &str) -> Result<bool, AccessError> {
        Ok(self
            .store
            .update_field(Collection::Users, uid, "photoURL", url)
            .await?)
    }
}
