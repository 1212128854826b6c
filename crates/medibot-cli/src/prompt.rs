//! Terminal input helpers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Password taken from the environment instead of prompting
pub const PASSWORD_ENV: &str = "MEDIBOT_PASSWORD";

/// Read one line from stdin. `None` at end of input.
pub fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Prompt for a value, offering `default` when the user just presses enter
pub fn ask(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let input = read_line()?.unwrap_or_default();
    if input.is_empty() {
        Ok(default.unwrap_or_default().to_string())
    } else {
        Ok(input)
    }
}

/// Use `value` if given, otherwise prompt for it
pub fn value_or_ask(value: Option<String>, label: &str, default: Option<&str>) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => ask(label, default),
    }
}

pub fn password(label: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password")
}

/// Password plus confirmation. The environment password needs no confirmation.
pub fn new_password() -> Result<(String, String)> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok((password.clone(), password));
    }
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirmation =
        rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    Ok((password, confirmation))
}
