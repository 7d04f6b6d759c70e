use std::io::IsTerminal;

use inquire::{Password, PasswordDisplayMode};

use crate::backend::xo::Credentials;
use crate::cli::USAGE;
use crate::config::AuthSource;
use crate::error::RotateError;

/// Turn the configured auth source into credentials, asking for the
/// password on the terminal when none was given.
pub fn credentials(source: AuthSource) -> Result<Credentials, RotateError> {
    match source {
        AuthSource::Token(token) => Ok(Credentials::Token(token)),
        AuthSource::Password {
            user,
            password: Some(password),
        } => Ok(Credentials::Password { user, password }),
        AuthSource::Password {
            user,
            password: None,
        } => {
            let password = prompt_password(&user)?;
            Ok(Credentials::Password { user, password })
        }
    }
}

fn prompt_password(user: &str) -> Result<String, RotateError> {
    if !std::io::stdin().is_terminal() {
        return Err(RotateError::Usage {
            message: format!("missing <password> for {user} and no terminal to ask for it"),
            usage: USAGE.to_string(),
        });
    }

    let message = format!("Password for {user}");
    Password::new(&message)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Hidden)
        .prompt()
        .map_err(map_inquire_err)
}

fn map_inquire_err(e: inquire::InquireError) -> RotateError {
    match e {
        inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted => {
            RotateError::PromptCancelled
        }
        other => RotateError::Prompt {
            message: other.to_string(),
        },
    }
}
