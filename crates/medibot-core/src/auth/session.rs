use std::fmt;

use anyhow::{Context, Result};
use tracing::warn;

use crate::models::UserInfo;

use super::credentials::{CredentialStore, TOKEN_KEY, USER_INFO_KEY};

/// Token and user record as persisted in the credential store
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub user_info: Option<UserInfo>,
}

impl Credentials {
    /// Read the stored session.
    ///
    /// `Ok(None)` when no token is stored. A user record that cannot be read
    /// or parsed is dropped with a warning; the token alone still counts.
    pub fn load(store: &dyn CredentialStore) -> Result<Option<Self>> {
        let token = store
            .get(TOKEN_KEY)
            .context("Failed to read session token")?
            .filter(|t| !t.is_empty());
        let Some(token) = token else {
            return Ok(None);
        };

        let user_info = match store.get(USER_INFO_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<UserInfo>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Stored user info is unreadable, ignoring it");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored user info");
                None
            }
        };

        Ok(Some(Self { token, user_info }))
    }

    /// Write both keys; a missing user record deletes the stored one
    pub fn save(&self, store: &dyn CredentialStore) -> Result<()> {
        store
            .set(TOKEN_KEY, &self.token)
            .context("Failed to store session token")?;
        match self.user_info {
            Some(ref user) => Self::save_user_info(store, user),
            None => store
                .delete(USER_INFO_KEY)
                .context("Failed to delete stored user info"),
        }
    }

    pub fn save_user_info(store: &dyn CredentialStore, user: &UserInfo) -> Result<()> {
        let json = serde_json::to_string(user)?;
        store
            .set(USER_INFO_KEY, &json)
            .context("Failed to store user info")
    }

    /// Delete both keys. Both deletes are attempted even if the first fails.
    pub fn clear(store: &dyn CredentialStore) -> Result<()> {
        let token = store
            .delete(TOKEN_KEY)
            .context("Failed to delete session token");
        let user = store
            .delete(USER_INFO_KEY)
            .context("Failed to delete stored user info");
        token.and(user)
    }
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Constructed, stored session not read yet
    Uninitialized,
    /// Reading the stored session
    Restoring,
    LoggedOut,
    LoggedIn,
    /// A login, registration or profile request is awaiting the server
    OperationInFlight,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Restoring => "restoring",
            SessionPhase::LoggedOut => "logged out",
            SessionPhase::LoggedIn => "logged in",
            SessionPhase::OperationInFlight => "working",
        };
        f.write_str(name)
    }
}

/// Snapshot published to subscribers whenever it changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// True until the stored session has been read
    pub loading: bool,
}

impl SessionStatus {
    pub(crate) fn initial() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            loading: true,
        }
    }
}

/// In-memory session record
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub token: Option<String>,
    pub user_info: Option<UserInfo>,
}

impl SessionState {
    pub fn credentials(&self) -> Option<Credentials> {
        self.token.as_ref().map(|token| Credentials {
            token: token.clone(),
            user_info: self.user_info.clone(),
        })
    }

    pub fn apply(&mut self, credentials: Credentials) {
        self.token = Some(credentials.token);
        self.user_info = credentials.user_info;
    }

    pub fn clear(&mut self) -> Option<String> {
        self.user_info = None;
        self.token.take()
    }
}
