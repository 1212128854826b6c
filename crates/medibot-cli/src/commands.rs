//! Command handlers. Each returns whether the command succeeded.

use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use tracing::warn;

use medibot_core::models::{ChatMessage, NewAccount, Profile, Sender, UserInfo};
use medibot_core::validation;
use medibot_core::{Config, Conversation, Outcome, SessionError, SessionManager};

use crate::prompt;
use crate::{Command, ProfileAction, ProfileArgs};

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub async fn run(
    command: Command,
    session: &SessionManager,
    config: &mut Config,
    json: bool,
) -> Result<bool> {
    match command {
        Command::Login { email } => login(session, config, email, json).await,
        Command::Register { email, profile } => {
            register(session, config, email, profile, json).await
        }
        Command::Logout => logout(session, json).await,
        Command::Status => status(session, config, json),
        Command::Profile { action } => {
            match action.unwrap_or(ProfileAction::Show { refresh: false }) {
                ProfileAction::Show { refresh } => show_profile(session, refresh, json).await,
                ProfileAction::Update(args) => update_profile(session, args, json).await,
            }
        }
        Command::Ask { question } => ask(session, config, &question.join(" "), json).await,
        Command::Chat => chat(session, config).await,
    }
}

// =========================================================================
// Account
// =========================================================================

async fn login(
    session: &SessionManager,
    config: &mut Config,
    email: Option<String>,
    json: bool,
) -> Result<bool> {
    let email = prompt::value_or_ask(email, "Email", config.last_email.as_deref())?;
    let password = prompt::password("Password")?;

    let result = session.login(&email, &password).await;
    if result.is_ok() {
        remember_email(config, &email);
    }
    report(result.into(), "Login successful", json)
}

async fn register(
    session: &SessionManager,
    config: &mut Config,
    email: Option<String>,
    profile: ProfileArgs,
    json: bool,
) -> Result<bool> {
    let email = prompt::value_or_ask(email, "Email", None)?;
    let name = prompt::value_or_ask(profile.name.clone(), "Name", None)?;
    let (password, confirmation) = prompt::new_password()?;

    if let Err(e) = validation::passwords_match(&password, &confirmation) {
        return report(Err::<(), _>(e).into(), "", json);
    }

    let account = NewAccount {
        email: email.clone(),
        password,
        name,
        details: profile.into_profile(),
    };
    let result = session.register(&account).await;
    if result.is_ok() {
        remember_email(config, &email);
    }
    report(result.into(), "Registered successfully", json)
}

/// Clears stored keys even when no session was restored
async fn logout(session: &SessionManager, json: bool) -> Result<bool> {
    let text = if session.is_authenticated() {
        "Signed out"
    } else {
        "Not signed in"
    };
    report(session.logout().await.into(), text, json)
}

fn status(session: &SessionManager, config: &Config, json: bool) -> Result<bool> {
    let user = session.user_info();
    if json {
        let value = serde_json::json!({
            "authenticated": session.is_authenticated(),
            "phase": session.phase().to_string(),
            "api": config.api_base_url(),
            "user": user,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(true);
    }

    match (session.is_authenticated(), user) {
        (true, Some(user)) => println!("Signed in as {}", user.display_name()),
        (true, None) => println!("Signed in"),
        (false, _) => println!("Not signed in"),
    }
    println!("Server: {}", config.api_base_url());
    Ok(true)
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

// =========================================================================
// Profile
// =========================================================================

async fn show_profile(session: &SessionManager, refresh: bool, json: bool) -> Result<bool> {
    if refresh {
        if let Err(e) = session.refresh_profile().await {
            return report(Err::<(), _>(e).into(), "", json);
        }
    } else if !session.is_authenticated() {
        return report(Err::<(), _>(SessionError::NotAuthenticated).into(), "", json);
    }

    let user = session.user_info().unwrap_or_default();
    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        print_profile(&user);
    }
    Ok(true)
}

async fn update_profile(session: &SessionManager, args: ProfileArgs, json: bool) -> Result<bool> {
    let fields = args.into_profile();
    match session.update_profile(&fields).await {
        Ok(user) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&Outcome::ok())?);
            } else {
                println!("Profile updated successfully\n");
                print_profile(&user);
            }
            Ok(true)
        }
        Err(e) => report(Err::<(), _>(e).into(), "", json),
    }
}

fn print_profile(user: &UserInfo) {
    if let Some(ref email) = user.email {
        println!("{:<16} {}", "Email", email);
    }
    print_fields(&user.profile);
}

fn print_fields(profile: &Profile) {
    for (label, value) in profile.fields() {
        println!("{:<16} {}", label, value.unwrap_or("-"));
    }
}

// =========================================================================
// Chat
// =========================================================================

async fn ask(
    session: &SessionManager,
    config: &Config,
    question: &str,
    json: bool,
) -> Result<bool> {
    let user = session.user_info();
    let mut conversation = Conversation::from_config(config, user.as_ref());

    match conversation.ask(session.api(), question).await {
        Ok(reply) => {
            if json {
                println!("{}", serde_json::to_string_pretty(reply)?);
            } else {
                print_message(reply);
            }
            Ok(true)
        }
        Err(e) => report(Err::<(), _>(e).into(), "", json),
    }
}

async fn chat(session: &SessionManager, config: &Config) -> Result<bool> {
    let user = session.user_info();
    let mut conversation = Conversation::from_config(config, user.as_ref());
    for message in conversation.messages() {
        print_message(message);
    }

    loop {
        print!("\nyou> ");
        io::stdout().flush()?;

        let Some(line) = prompt::read_line()? else {
            break;
        };
        if matches!(line.as_str(), "exit" | "quit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match conversation.ask(session.api(), &line).await {
            Ok(reply) => print_message(reply),
            Err(e) => eprintln!("{}", e),
        }
    }
    Ok(true)
}

fn print_message(message: &ChatMessage) {
    let who = match message.sender {
        Sender::Bot => "medibot",
        Sender::User => "you",
    };

    let styled = io::stdout().is_terminal();
    let mut text = String::new();
    for segment in message.segments() {
        if segment.bold && styled {
            text.push_str(BOLD);
            text.push_str(segment.text);
            text.push_str(RESET);
        } else {
            text.push_str(segment.text);
        }
    }
    println!("{}> {}", who, text);
}

// =========================================================================
// Output
// =========================================================================

fn report(outcome: Outcome, success_text: &str, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else if outcome.success {
        println!("{}", success_text);
    } else {
        eprintln!(
            "Error: {}",
            outcome.message.as_deref().unwrap_or("Something went wrong")
        );
    }
    Ok(outcome.success)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use medibot_core::auth::{TOKEN_KEY, USER_INFO_KEY};
    use medibot_core::{ApiClient, CredentialStore, MemoryStore};

    use super::*;

    fn session_with(store: Arc<MemoryStore>) -> SessionManager {
        let api =
            ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client builds");
        SessionManager::new(api, store)
    }

    #[tokio::test]
    async fn test_logout_without_session_clears_leftover_keys() {
        let store = Arc::new(MemoryStore::new());
        store.set(USER_INFO_KEY, r#"{"name": "A"}"#).expect("set");

        let session = session_with(store.clone());
        session.restore().await;
        assert!(!session.is_authenticated());

        assert!(logout(&session, true).await.expect("logout runs"));
        assert_eq!(store.get(USER_INFO_KEY).expect("get"), None);
        assert_eq!(store.get(TOKEN_KEY).expect("get"), None);
    }
}
