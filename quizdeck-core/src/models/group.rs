//! Group records and the aggregate view built from them.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserData;

/// Stored group document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDoc {
    pub gid: String,
    /// Uid of the user who owns the group
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: i64,
}

impl GroupDoc {
    /// Create a new group document with a generated id.
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            gid: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: String::new(),
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_id(mut self, gid: impl Into<String>) -> Self {
        self.gid = gid.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Membership of one user in one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub uid: String,
    pub gid: String,
    pub joined_at: i64,
}

impl GroupMember {
    pub fn new(gid: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            gid: gid.into(),
            joined_at: Utc::now().timestamp_millis(),
        }
    }

    /// Document id used when the membership is written through the access layer.
    ///
    /// One id per `(gid, uid)` pair, so repeated joins overwrite instead of
    /// piling up duplicate records. The gid is length-prefixed, so ids stay
    /// distinct even when either part contains the separator.
    pub fn document_id(gid: &str, uid: &str) -> String {
        format!("{}:{}_{}", gid.len(), gid, uid)
    }
}

/// Group as presented to readers.
///
/// Composed from three independent reads, so `member_count` may already be
/// stale when it is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(flatten)]
    pub doc: GroupDoc,
    pub member_count: u64,
    pub owner_data: Option<UserData>,
}
