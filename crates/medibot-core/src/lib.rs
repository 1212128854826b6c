//! Core library for MediBot.
//!
//! This crate holds everything a MediBot front end needs apart from the
//! screens themselves:
//!
//! - `api`: HTTP client for the MediBot backend
//! - `auth`: credential store and the session manager
//! - `chat`: question/answer conversation with the bot
//! - `config`: persisted client configuration
//! - `models`: wire and domain types
//! - `validation`: client-side checks run before any request is sent

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod models;
pub mod validation;

pub use api::{ApiClient, ApiError};
pub use auth::{
    CredentialStore, Credentials, KeyringStore, MemoryStore, Outcome, SessionError,
    SessionManager, SessionPhase, SessionStatus,
};
pub use chat::Conversation;
pub use config::Config;
