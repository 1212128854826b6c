use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::profile::{Profile, UserInfo};

/// Body of `POST /login`
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /register`: credentials plus the profile fields, flattened
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(flatten)]
    pub profile: &'a Profile,
}

/// Everything needed to create an account.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    /// Optional health fields sent with the registration. `name` here is ignored.
    pub details: Profile,
}

impl NewAccount {
    /// Profile as submitted to the backend, with the account name filled in
    pub fn profile(&self) -> Profile {
        Profile {
            name: Some(self.name.trim().to_string()),
            ..self.details.clone()
        }
    }
}

/// Response from `POST /login` and `POST /register`.
///
/// A successful sign-in carries a token (some deployments call it
/// `idToken`). Failures carry `message` or `error`. The user record is kept
/// raw so an unexpected shape never fails a sign-in the server accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default, alias = "idToken")]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthResponse {
    /// Token, if the server issued a non-empty one
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn failure_message(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }

    /// Take the user record, decoded as far as it goes
    pub fn take_user(&mut self) -> Option<UserInfo> {
        self.user.take().and_then(UserInfo::from_value)
    }
}
