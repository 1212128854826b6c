//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `CredentialStore`: the two-key secure storage contract, backed by the
//!   OS keychain (`KeyringStore`) or process memory (`MemoryStore`)
//! - `Credentials`: the persisted token + user record
//! - `SessionManager`: sign-in, registration, logout and profile updates,
//!   keeping memory and storage in step
//!
//! Storage is the source of truth at startup; every later mutation is
//! written to storage before it is applied in memory.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;

pub use credentials::{CredentialStore, KeyringStore, MemoryStore, TOKEN_KEY, USER_INFO_KEY};
pub use error::{Outcome, SessionError};
pub use manager::SessionManager;
pub use session::{Credentials, SessionPhase, SessionStatus};
