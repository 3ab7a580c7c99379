//! Client actions against the authentication provider and blob storage.
//!
//! Each action makes one round trip, or a short fixed sequence of them, and
//! either resolves once or fails once. There are no retries.
//!
//! Actions that act on behalf of the signed-in user fail with
//! [`ActionError::NoSession`] when nobody is signed in, so callers can tell a
//! missing session apart from a provider failure.

mod blob;

pub use blob::{BlobError, BlobStorage, FsBlobStorage};

use thiserror::Error;

use quizdeck_core::{AuthUser, ProviderUser};

use crate::access::{AccessError, UserRepository};

/// Failure reported by the authentication provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Provider error code, e.g. `auth/wrong-password`
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Credential that can be linked to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    EmailPassword { email: String, password: String },
    IdToken { provider_id: String, token: String },
}

/// The session side of the authentication provider.
#[allow(async_fn_in_trait)]
pub trait AuthProvider {
    /// The user signed in on this session, if any.
    fn current_user(&self) -> Option<ProviderUser>;

    async fn link_credential(
        &self,
        user: &ProviderUser,
        credential: &Credential,
    ) -> Result<ProviderUser, ProviderError>;

    async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderUser, ProviderError>;

    async fn send_verification_email(&self, user: &ProviderUser) -> Result<(), ProviderError>;
}

/// Errors returned by client actions.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("No user is signed in")]
    NoSession,

    #[error("Authentication provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Upload failed: {0}")]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("No profile for user {0}")]
    ProfileNotFound(String),
}

fn session_user<A: AuthProvider>(auth: &A) -> Result<ProviderUser, ActionError> {
    auth.current_user().ok_or(ActionError::NoSession)
}

/// Links another sign-in method to the signed-in account.
pub async fn link_credential<A: AuthProvider>(
    auth: &A,
    credential: &Credential,
) -> Result<AuthUser, ActionError> {
    let user = session_user(auth)?;
    let linked = auth.link_credential(&user, credential).await?;
    tracing::info!("Linked credential to {}", linked.uid);
    Ok(AuthUser::from(&linked))
}

pub async fn sign_in_with_email<A: AuthProvider>(
    auth: &A,
    email: &str,
    password: &str,
) -> Result<AuthUser, ActionError> {
    let user = auth.sign_in_with_email(email, password).await?;
    Ok(AuthUser::from(&user))
}

pub async fn send_verification_email<A: AuthProvider>(auth: &A) -> Result<(), ActionError> {
    let user = session_user(auth)?;
    auth.send_verification_email(&user).await?;
    tracing::info!("Sent verification email to {}", user.uid);
    Ok(())
}

/// Uploads a new profile picture and points the user's profile at it.
///
/// Returns the picture URL. The upload is not rolled back when the profile
/// document is missing.
pub async fn upload_profile_picture<A: AuthProvider, B: BlobStorage>(
    auth: &A,
    blobs: &B,
    users: &UserRepository,
    bytes: &[u8],
    content_type: &str,
) -> Result<String, ActionError> {
    let user = session_user(auth)?;
    let path = format!("profilePictures/{}", user.uid);
    let url = blobs.upload(&path, bytes, content_type).await?;

    if !users.set_photo_url(&user.uid, &url).await? {
        return Err(ActionError::ProfileNotFound(user.uid));
    }
    Ok(url)
}
