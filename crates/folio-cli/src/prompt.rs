//! Interactive input for the terminal client.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};

/// Maximum length for username input.
/// The content API's account model caps usernames at 150 characters.
const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

fn validate(value: &str, max_len: usize, field: &str) -> Result<()> {
    if value.chars().count() > max_len {
        bail!("{} must be at most {} characters", field, max_len);
    }
    if !value.chars().all(is_valid_input_char) {
        bail!("{} contains control characters", field);
    }
    Ok(())
}

/// Trimmed, validated username. Empty input is allowed here and rejected by
/// the login gate.
pub fn clean_username(raw: &str) -> Result<String> {
    let username = raw.trim();
    validate(username, MAX_USERNAME_LENGTH, "Username")?;
    Ok(username.to_string())
}

pub fn clean_password(raw: &str) -> Result<String> {
    validate(raw, MAX_PASSWORD_LENGTH, "Password")?;
    Ok(raw.to_string())
}

/// Ask for a username, offering the last one used as the default.
pub fn username(default: Option<&str>) -> Result<String> {
    match default {
        Some(name) => print!("Username [{}]: ", name),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let entered = clean_username(&line)?;
    match default {
        Some(name) if entered.is_empty() => Ok(name.to_string()),
        _ => Ok(entered),
    }
}

/// Read a password without echo.
pub fn password(label: &str) -> Result<String> {
    let raw = rpassword::prompt_password(format!("{}: ", label))?;
    clean_password(&raw)
}

/// Yes/no question, defaulting to no.
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
