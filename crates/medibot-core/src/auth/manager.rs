//! Session manager: the single owner of the signed-in state.
//!
//! Construct one `SessionManager` at startup, call `restore()` once, and
//! share it (`Arc<SessionManager>`) with everything that needs the session.
//!
//! Operations take `&self` and may be awaited from several tasks. Commits
//! to the session record are serialized; concurrent logins or profile
//! updates are last-write-wins. A logout supersedes every request issued
//! before it: their responses are discarded instead of committed.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{AuthResponse, NewAccount, Profile, RegisterRequest, UserInfo};
use crate::validation;

use super::credentials::CredentialStore;
use super::error::SessionError;
use super::session::{Credentials, SessionPhase, SessionState, SessionStatus};

/// Shown when sign-in fails without a server explanation
const LOGIN_FAILED: &str = "Login failed. Check your credentials and try again.";

/// Shown when the server answers a sign-in without a token or a message
const LOGIN_NO_TOKEN: &str = "Login failed";

const REGISTER_FAILED: &str = "Registration failed. Please try again.";

/// Shown when the server answers a registration without a token or a message
const REGISTER_NO_TOKEN: &str = "Registration failed";
const UPDATE_FAILED: &str = "Failed to update profile";
const PROFILE_LOAD_FAILED: &str = "Failed to load profile";

pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    /// Bumped when a logout is issued
    epoch: AtomicU64,
    in_flight: AtomicUsize,
    restore_started: AtomicBool,
    status: watch::Sender<SessionStatus>,
}

/// Marks a request as in flight for as long as it lives
struct InFlight<'a> {
    manager: &'a SessionManager,
}

impl<'a> InFlight<'a> {
    fn begin(manager: &'a SessionManager) -> Self {
        manager.in_flight.fetch_add(1, Ordering::SeqCst);
        manager.publish(false);
        Self { manager }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.manager.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.manager.publish(false);
    }
}

impl SessionManager {
    pub fn new(api: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::initial());
        Self {
            api,
            store,
            state: RwLock::new(SessionState::default()),
            epoch: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            restore_started: AtomicBool::new(false),
            status,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    // =========================================================================
    // State queries
    // =========================================================================

    /// Receive every status change from now on
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn phase(&self) -> SessionPhase {
        self.status().phase
    }

    /// True until `restore()` has finished
    pub fn is_loading(&self) -> bool {
        self.status().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().token.is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.read_state().token.clone()
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.read_state().user_info.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load the stored session. Only the first call does anything.
    ///
    /// Never fails: a store that cannot be read counts as signed out.
    pub async fn restore(&self) -> SessionPhase {
        if self.restore_started.swap(true, Ordering::SeqCst) {
            debug!("Session already restored");
            return self.phase();
        }
        self.publish(false);

        let loaded = match Credentials::load(self.store.as_ref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session, starting signed out");
                None
            }
        };

        if let Some(credentials) = loaded {
            debug!(has_user = credentials.user_info.is_some(), "Stored session found");
            self.write_state().apply(credentials);
        } else {
            debug!("No stored session");
        }

        self.publish(true);
        let phase = self.phase();
        info!(%phase, "Session restored");
        phase
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        validation::require_credentials(email, password)?;
        let email = email.trim();

        let epoch = self.epoch.load(Ordering::SeqCst);
        let _op = InFlight::begin(self);

        debug!("Signing in");
        let response = self
            .api
            .login(email, password)
            .await
            .map_err(|e| Self::request_failed("Login", &e, LOGIN_FAILED))?;

        let credentials =
            Self::credentials_from(response, UserInfo::with_email(email), LOGIN_NO_TOKEN)?;
        self.commit(epoch, credentials)?;

        info!("Signed in");
        Ok(())
    }

    /// Create an account and sign in with it
    pub async fn register(&self, account: &NewAccount) -> Result<(), SessionError> {
        validation::validate_new_account(account)?;
        let email = account.email.trim();
        let profile = account.profile();

        let epoch = self.epoch.load(Ordering::SeqCst);
        let _op = InFlight::begin(self);

        debug!("Registering account");
        let request = RegisterRequest {
            email,
            password: &account.password,
            profile: &profile,
        };
        let response = self
            .api
            .register(&request)
            .await
            .map_err(|e| Self::request_failed("Registration", &e, REGISTER_FAILED))?;

        let fallback_user = UserInfo {
            email: Some(email.to_string()),
            profile,
            ..UserInfo::default()
        };
        let credentials = Self::credentials_from(response, fallback_user, REGISTER_NO_TOKEN)?;
        self.commit(epoch, credentials)?;

        info!("Registered and signed in");
        Ok(())
    }

    /// Sign out locally, then tell the server.
    ///
    /// Local state and storage are cleared no matter what the server says.
    /// The only reported failure is a store that could not be cleared.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let (token, cleared) = {
            let mut state = self.write_state();
            let token = state.clear();
            (token, Credentials::clear(self.store.as_ref()))
        };
        self.publish(false);

        if let Some(token) = token {
            if let Err(e) = self.api.logout(&token).await {
                warn!(error = %e, "Server logout failed, signed out locally");
            }
        }

        info!("Signed out");
        cleared.map_err(|e| {
            warn!(error = %e, "Failed to clear stored session");
            SessionError::storage(e)
        })
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Send profile fields to the server and merge them into the cached user.
    ///
    /// Fields left as `None` are neither sent nor changed locally.
    pub async fn update_profile(&self, fields: &Profile) -> Result<UserInfo, SessionError> {
        let token = self.token().ok_or(SessionError::NotAuthenticated)?;
        if fields.is_empty() {
            return Err(SessionError::Validation("Nothing to update".to_string()));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let _op = InFlight::begin(self);

        let response = self
            .api
            .update_profile(&token, fields)
            .await
            .map_err(|e| Self::request_failed("Profile update", &e, UPDATE_FAILED))?;

        if !response.success {
            return Err(SessionError::Rejected(
                response.message.unwrap_or_else(|| UPDATE_FAILED.to_string()),
            ));
        }

        let merged = self.merge_profile(epoch, &token, fields)?;
        info!("Profile updated");
        Ok(merged)
    }

    /// Fetch the profile from the server and merge it into the cached user
    pub async fn refresh_profile(&self) -> Result<Profile, SessionError> {
        let token = self.token().ok_or(SessionError::NotAuthenticated)?;

        let epoch = self.epoch.load(Ordering::SeqCst);
        let _op = InFlight::begin(self);

        let response = self
            .api
            .fetch_profile(&token)
            .await
            .map_err(|e| Self::request_failed("Profile fetch", &e, PROFILE_LOAD_FAILED))?;

        if !response.success {
            return Err(SessionError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| PROFILE_LOAD_FAILED.to_string()),
            ));
        }

        let profile = response.profile.unwrap_or_default();
        self.merge_profile(epoch, &token, &profile)?;
        debug!("Profile refreshed");
        Ok(profile)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_failed(what: &str, err: &ApiError, fallback: &str) -> SessionError {
        warn!(error = %err, "{} request failed", what);
        SessionError::from_api(err, fallback)
    }

    fn credentials_from(
        mut response: AuthResponse,
        fallback_user: UserInfo,
        no_token_message: &str,
    ) -> Result<Credentials, SessionError> {
        let Some(token) = response.token().map(str::to_string) else {
            let message = response.failure_message().unwrap_or(no_token_message);
            return Err(SessionError::Rejected(message.to_string()));
        };

        let user = match response.take_user() {
            Some(mut user) => {
                if user.email.is_none() {
                    user.email = fallback_user.email;
                }
                user
            }
            None => fallback_user,
        };

        Ok(Credentials {
            token,
            user_info: Some(user),
        })
    }

    /// Persist, then apply in memory, unless a logout came in meanwhile
    fn commit(&self, epoch: u64, credentials: Credentials) -> Result<(), SessionError> {
        let mut state = self.write_state();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            warn!("Discarding sign-in overtaken by logout");
            return Err(SessionError::Superseded);
        }

        if let Err(e) = credentials.save(self.store.as_ref()) {
            // Put storage back the way memory still has it
            let rollback = match state.credentials() {
                Some(previous) => previous.save(self.store.as_ref()),
                None => Credentials::clear(self.store.as_ref()),
            };
            if let Err(rollback_err) = rollback {
                warn!(error = %rollback_err, "Failed to roll back stored session");
            }
            return Err(SessionError::storage(e));
        }

        state.apply(credentials);
        Ok(())
    }

    fn merge_profile(
        &self,
        epoch: u64,
        token: &str,
        fields: &Profile,
    ) -> Result<UserInfo, SessionError> {
        let mut state = self.write_state();
        if self.epoch.load(Ordering::SeqCst) != epoch || state.token.as_deref() != Some(token) {
            warn!("Discarding profile change for a session that has ended");
            return Err(SessionError::Superseded);
        }

        let mut merged = state.user_info.clone().unwrap_or_default();
        merged.profile.merge_from(fields);
        Credentials::save_user_info(self.store.as_ref(), &merged).map_err(SessionError::storage)?;

        state.user_info = Some(merged.clone());
        Ok(merged)
    }

    /// Recompute the phase and notify subscribers if anything changed
    fn publish(&self, finish_loading: bool) {
        let authenticated = self.is_authenticated();
        let in_flight = self.in_flight.load(Ordering::SeqCst) > 0;
        let restore_started = self.restore_started.load(Ordering::SeqCst);

        self.status.send_if_modified(|status| {
            let mut changed = false;
            if finish_loading && status.loading {
                status.loading = false;
                changed = true;
            }

            let phase = if in_flight {
                SessionPhase::OperationInFlight
            } else if authenticated {
                SessionPhase::LoggedIn
            } else if !status.loading {
                SessionPhase::LoggedOut
            } else if restore_started {
                SessionPhase::Restoring
            } else {
                SessionPhase::Uninitialized
            };

            if status.phase != phase {
                status.phase = phase;
                changed = true;
            }
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;

    use super::*;
    use crate::auth::{MemoryStore, TOKEN_KEY, USER_INFO_KEY};

    /// Nothing listens here; tests using it never reach the network
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn manager_with(store: Arc<dyn CredentialStore>) -> SessionManager {
        let api = ApiClient::new(UNREACHABLE, Duration::from_secs(2)).expect("client builds");
        SessionManager::new(api, store)
    }

    struct BrokenStore;

    impl CredentialStore for BrokenStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("keychain locked"))
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("keychain locked"))
        }

        fn delete(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow!("keychain locked"))
        }
    }

    #[tokio::test]
    async fn test_initial_status() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        assert_eq!(manager.phase(), SessionPhase::Uninitialized);
        assert!(manager.is_loading());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_empty_store_is_logged_out_once() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        let mut rx = manager.subscribe();

        assert_eq!(manager.restore().await, SessionPhase::LoggedOut);
        assert!(rx.has_changed().expect("sender alive"));
        let status = *rx.borrow_and_update();
        assert!(!status.loading);
        assert_eq!(status.phase, SessionPhase::LoggedOut);

        // A second restore changes nothing
        assert_eq!(manager.restore().await, SessionPhase::LoggedOut);
        assert!(!rx.has_changed().expect("sender alive"));
    }

    #[tokio::test]
    async fn test_restore_with_stored_token() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "tok123").expect("set");
        store
            .set(USER_INFO_KEY, r#"{"name": "A", "age": "30"}"#)
            .expect("set");

        let manager = manager_with(store);
        assert_eq!(manager.restore().await, SessionPhase::LoggedIn);
        assert!(manager.is_authenticated());
        assert!(!manager.is_loading());
        assert_eq!(manager.token().as_deref(), Some("tok123"));
        let user = manager.user_info().expect("user restored");
        assert_eq!(user.profile.age.as_deref(), Some("30"));
    }

    #[tokio::test]
    async fn test_restore_with_unreadable_store() {
        let manager = manager_with(Arc::new(BrokenStore));
        assert_eq!(manager.restore().await, SessionPhase::LoggedOut);
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        // The unreachable server would yield a transport error instead
        assert_eq!(
            manager.login("", "secret1").await,
            Err(SessionError::Validation("Please enter both email and password".to_string()))
        );
        let account = NewAccount {
            email: "bad".to_string(),
            password: "secret1".to_string(),
            name: "A".to_string(),
            ..NewAccount::default()
        };
        assert_eq!(
            manager.register(&account).await,
            Err(SessionError::Validation("Please enter a valid email address".to_string()))
        );
    }

    #[tokio::test]
    async fn test_update_profile_requires_login() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.restore().await;
        let fields = Profile {
            name: Some("X".to_string()),
            ..Profile::default()
        };
        assert_eq!(manager.update_profile(&fields).await, Err(SessionError::NotAuthenticated));
        assert_eq!(manager.refresh_profile().await, Err(SessionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_login_transport_failure_leaves_state() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.restore().await;
        assert_eq!(
            manager.login("a@b.com", "secret1").await,
            Err(SessionError::Transport(LOGIN_FAILED.to_string()))
        );
        assert!(!manager.is_authenticated());
        assert_eq!(manager.phase(), SessionPhase::LoggedOut);
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_unreachable() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "tok123").expect("set");
        store.set(USER_INFO_KEY, r#"{"name": "A"}"#).expect("set");

        let manager = manager_with(store.clone());
        manager.restore().await;
        assert!(manager.is_authenticated());

        assert_eq!(manager.logout().await, Ok(()));
        assert!(!manager.is_authenticated());
        assert!(manager.user_info().is_none());
        assert!(store.is_empty());
        assert_eq!(manager.phase(), SessionPhase::LoggedOut);
    }

    #[tokio::test]
    async fn test_logout_clears_orphan_user_record() {
        let store = Arc::new(MemoryStore::new());
        store.set(USER_INFO_KEY, r#"{"name": "A"}"#).expect("set");

        let manager = manager_with(store.clone());
        assert_eq!(manager.restore().await, SessionPhase::LoggedOut);

        assert_eq!(manager.logout().await, Ok(()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_logout_reports_storage_failure_but_clears_memory() {
        let manager = manager_with(Arc::new(BrokenStore));
        manager.write_state().apply(Credentials {
            token: "tok123".to_string(),
            user_info: None,
        });

        let result = manager.logout().await;
        assert!(matches!(result, Err(SessionError::Storage(_))));
        assert!(!manager.is_authenticated());
    }

    #[test]
    fn test_credentials_from_missing_token() {
        let response = AuthResponse {
            message: Some("Account locked".to_string()),
            ..AuthResponse::default()
        };
        assert_eq!(
            SessionManager::credentials_from(response, UserInfo::default(), LOGIN_NO_TOKEN),
            Err(SessionError::Rejected("Account locked".to_string()))
        );
        let no_token = |message: &str| {
            SessionManager::credentials_from(AuthResponse::default(), UserInfo::default(), message)
        };
        assert_eq!(
            no_token(LOGIN_NO_TOKEN),
            Err(SessionError::Rejected("Login failed".to_string()))
        );
        assert_eq!(
            no_token(REGISTER_NO_TOKEN),
            Err(SessionError::Rejected("Registration failed".to_string()))
        );
    }

    #[test]
    fn test_credentials_from_fills_email() {
        let response = AuthResponse {
            token: Some("tok".to_string()),
            user: Some(serde_json::json!({})),
            ..AuthResponse::default()
        };
        let fallback = UserInfo::with_email("a@b.com");
        let credentials = SessionManager::credentials_from(response, fallback, LOGIN_NO_TOKEN)
            .expect("token present");
        assert_eq!(credentials.token, "tok");
        let user = credentials.user_info.expect("user present");
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
    }
}
