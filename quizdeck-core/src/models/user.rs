//! User records.
//!
//! `ProviderUser` is the full record handed out by the authentication
//! provider. `AuthUser` is the narrower projection the rest of the
//! application is allowed to see; it is derived on demand and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "photoURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<String>,
}

impl UserData {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            photo_url: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    pub creation_time: Option<DateTime<Utc>>,
    pub last_sign_in_time: Option<DateTime<Utc>>,
}

/// One linked sign-in method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub provider_id: String,
    pub uid: String,
    pub email: Option<String>,
}

/// Full user record as returned by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub is_anonymous: bool,
    pub phone_number: Option<String>,
    pub metadata: UserMetadata,
    #[serde(default)]
    pub provider_data: Vec<ProviderInfo>,
    pub refresh_token: String,
    pub tenant_id: Option<String>,
}

/// Public-safe projection of a [`ProviderUser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub is_anonymous: bool,
    pub metadata: UserMetadata,
    /// Ids of the linked sign-in providers, e.g. `password` or `google.com`
    pub providers: Vec<String>,
}

impl From<&ProviderUser> for AuthUser {
    fn from(user: &ProviderUser) -> Self {
        Self {
            uid: user.uid.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            is_anonymous: user.is_anonymous,
            metadata: user.metadata.clone(),
            providers: user
                .provider_data
                .iter()
                .map(|p| p.provider_id.clone())
                .collect(),
        }
    }
}
