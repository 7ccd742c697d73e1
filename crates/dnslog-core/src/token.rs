//! Probe token derivation
//!
//! A token is the 10-hex-character leftmost label of a probe domain. It is
//! derived from whatever the user typed, on every use, and never cached.

use thiserror::Error;

/// Length of a probe token in characters
pub const TOKEN_LEN: usize = 10;

/// Shown when the input does not carry a usable token
pub const TOKEN_HINT: &str = "enter a token or use Generate to create a probe domain";

/// A validated, lowercased probe token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The input could not be turned into a token
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct TokenRejected {
    pub reason: String,
}

/// Extract the token from a domain or bare token
///
/// The substring before the first `.` must be exactly ten hex characters
/// (any case); the token is returned lowercased.
pub fn parse_token(input: &str) -> Result<Token, TokenRejected> {
    let trimmed = input.trim();
    let label = trimmed.split('.').next().unwrap_or_default();

    if label.len() != TOKEN_LEN || !label.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TokenRejected {
            reason: TOKEN_HINT.to_string(),
        });
    }

    Ok(Token(label.to_ascii_lowercase()))
}
