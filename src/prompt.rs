//! Secret input for connection passwords.

use std::io;

/// Reads a password without echoing it
pub trait PasswordPrompt {
    fn prompt_password(&self, message: &str) -> io::Result<String>;
}

/// Prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt_password(&self, message: &str) -> io::Result<String> {
        rpassword::prompt_password(message)
    }
}

impl<F> PasswordPrompt for F
where
    F: Fn(&str) -> io::Result<String>,
{
    fn prompt_password(&self, message: &str) -> io::Result<String> {
        self(message)
    }
}
