//! Identity lookup by subject.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::auth::UserIdentity;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user service unavailable: {0}")]
    Transport(String),

    #[error("invalid user service response: {0}")]
    InvalidResponse(String),

    #[error("invalid user service url: {0}")]
    InvalidUrl(String),
}

/// Source of truth for accounts. `Ok(None)` means the subject does not exist.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn lookup(&self, subject: &str) -> Result<Option<UserIdentity>, StoreError>;
}

/// Identities held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: DashMap<String, UserIdentity>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserIdentity>) -> Self {
        let store = Self::new();
        for user in users {
            store.insert(user);
        }
        store
    }

    pub fn insert(&self, user: UserIdentity) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn remove(&self, id: &str) -> Option<UserIdentity> {
        self.users.remove(id).map(|(_, user)| user)
    }

    /// Flip an account's active flag. Returns false for unknown ids.
    pub fn set_active(&self, id: &str, active: bool) -> bool {
        match self.users.get_mut(id) {
            Some(mut user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn lookup(&self, subject: &str) -> Result<Option<UserIdentity>, StoreError> {
        Ok(self.users.get(subject).map(|user| user.value().clone()))
    }
}

/// Remote user service: `GET {base_url}/users/{subject}`.
#[derive(Debug, Clone)]
pub struct HttpIdentityStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpIdentityStore {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn user_url(&self, subject: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("users")
            .push(subject);
        Ok(url)
    }
}

#[async_trait]
impl IdentityStore for HttpIdentityStore {
    async fn lookup(&self, subject: &str) -> Result<Option<UserIdentity>, StoreError> {
        let mut request = self.client.get(self.user_url(subject)?);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<UserIdentity>()
                .await
                .map(Some)
                .map_err(|e| StoreError::InvalidResponse(e.to_string())),
            status => Err(StoreError::Transport(format!("user service returned {status}"))),
        }
    }
}
