use quizdeck_core::{Collection, Group, GroupDoc, GroupMember, UserData};

use super::AccessError;
use crate::db::{DocumentStore, Query};

/// Groups and their membership records.
#[derive(Clone)]
pub struct GroupRepository {
    store: DocumentStore,
}

impl GroupRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub async fn create_group(&self, group: &GroupDoc) -> Result<(), AccessError> {
        self.store.set(Collection::Groups, &group.gid, group).await?;
        tracing::info!("Created group {} owned by {}", group.gid, group.owner_id);
        Ok(())
    }

    /// Adds `uid` to `gid`.
    ///
    /// The membership is written under [`GroupMember::document_id`], so joining
    /// again refreshes the existing record instead of adding a second one.
    pub async fn add_member(&self, gid: &str, uid: &str) -> Result<GroupMember, AccessError> {
        let member = GroupMember::new(gid, uid);
        let id = GroupMember::document_id(gid, uid);
        self.store
            .set(Collection::GroupMembers, &id, &member)
            .await?;
        tracing::info!("Added {} to group {}", uid, gid);
        Ok(member)
    }

    /// Removes the membership written by [`GroupRepository::add_member`].
    pub async fn remove_member(&self, gid: &str, uid: &str) -> Result<bool, AccessError> {
        let id = GroupMember::document_id(gid, uid);
        Ok(self.store.delete(Collection::GroupMembers, &id).await?)
    }

    /// Reads a group together with its member count and owner profile.
    ///
    /// The three reads are independent; a membership change in between can
    /// leave the count stale. A missing owner profile yields `owner_data: None`.
    pub async fn get_group_data(&self, gid: &str) -> Result<Group, AccessError> {
        let doc: GroupDoc = self
            .store
            .get(Collection::Groups, gid)
            .await?
            .ok_or_else(|| AccessError::GroupNotFound(gid.to_string()))?;

        let member_count = self
            .store
            .count(Collection::GroupMembers, &Query::new().where_eq("gid", gid))
            .await?;

        let owner_data: Option<UserData> =
            self.store.get(Collection::Users, &doc.owner_id).await?;
        if owner_data.is_none() {
            tracing::debug!("Group {} owner {} has no profile", gid, doc.owner_id);
        }

        Ok(Group {
            doc,
            member_count,
            owner_data,
        })
    }

    /// Looks up the membership of `uid` in `gid`.
    ///
    /// Nothing in the store forbids two records for the same pair. If there
    /// are several, the one with the lowest document id is returned.
    pub async fn get_group_member_data(
        &self,
        gid: &str,
        uid: &str,
    ) -> Result<Option<GroupMember>, AccessError> {
        let query = Query::new().where_eq("uid", uid).where_eq("gid", gid).limit(1);
        let docs = self.store.query(Collection::GroupMembers, &query).await?;

        match docs.into_iter().next() {
            Some(doc) => Ok(Some(doc.decode(Collection::GroupMembers)?)),
            None => Ok(None),
        }
    }

    /// Number of groups `uid` belongs to.
    pub async fn get_total_groups(&self, uid: &str) -> Result<u64, AccessError> {
        Ok(self
            .store
            .count(Collection::GroupMembers, &Query::new().where_eq("uid", uid))
            .await?)
    }
}
