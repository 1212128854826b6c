//! Question/answer conversation with the bot.
//!
//! A `Conversation` keeps the transcript and turns every backend failure
//! into an apologetic bot reply, so the transcript always alternates
//! question and answer.

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::SessionError;
use crate::config::Config;
use crate::models::{AskRequest, ChatMessage, Sender, UserInfo};

pub const GREETING: &str = "Hello! I am MediBot. How can I help you today?";

/// Reply when the backend answered without an answer
pub const NO_ANSWER: &str = "Sorry, I didn't understand that.";

/// Reply when the backend could not be reached or failed
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again later.";

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    filename: String,
    user_id: String,
}

impl Conversation {
    pub fn new(filename: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::new(Sender::Bot, GREETING)],
            filename: filename.into(),
            user_id: user_id.into(),
        }
    }

    /// Questions are tagged with the signed-in user's id (or email) when
    /// known, else the configured default.
    pub fn from_config(config: &Config, user: Option<&UserInfo>) -> Self {
        let user_id = user
            .and_then(|u| u.user_id().or_else(|| u.email.clone()))
            .unwrap_or_else(|| config.chat_user_id.clone());
        Self::new(config.chat_filename.as_str(), user_id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Ask a question and return the bot's reply.
    ///
    /// Only blank input is an error; backend failures become a reply.
    pub async fn ask(
        &mut self,
        api: &ApiClient,
        question: &str,
    ) -> Result<&ChatMessage, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::Validation("Please type a question".to_string()));
        }

        self.messages.push(ChatMessage::new(Sender::User, question));

        let request = AskRequest {
            question,
            filename: &self.filename,
            user_id: &self.user_id,
        };
        let reply = match api.ask(&request).await {
            Ok(response) => match response.answer.filter(|a| !a.trim().is_empty()) {
                Some(answer) => answer,
                None => {
                    debug!("Answer missing from response");
                    NO_ANSWER.to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                ERROR_REPLY.to_string()
            }
        };

        self.messages.push(ChatMessage::new(Sender::Bot, reply));
        Ok(self.last())
    }

    fn last(&self) -> &ChatMessage {
        // Never empty: the greeting is pushed on construction
        &self.messages[self.messages.len() - 1]
    }
}
