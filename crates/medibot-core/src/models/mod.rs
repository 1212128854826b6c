//! Data models for MediBot.
//!
//! - `Profile`, `UserInfo`: health/demographic fields and the cached user record
//! - Account types: `LoginRequest`, `RegisterRequest`, `NewAccount`, `AuthResponse`
//! - Chat types: `ChatMessage`, `Sender`, `Segment`, `AskRequest`, `AskResponse`
//!
//! With the `ts` feature enabled, the types the mobile front end consumes
//! also derive TypeScript bindings.

pub mod account;
pub mod chat;
pub mod profile;

pub use account::{AuthResponse, LoginRequest, NewAccount, RegisterRequest};
pub use chat::{segments, AskRequest, AskResponse, ChatMessage, Segment, Sender};
pub use profile::{Profile, ProfileResponse, UpdateResponse, UserInfo};
