//! Document-link validation: the cheap precondition before any network I/O.
//!
//! A view link has the shape `scheme://[www.]docsend.com/view/<token>` with a
//! case-insensitive scheme and host and a case-sensitive alphanumeric token.
//! Anything else fails here, before a browser is ever launched.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Scheme and host match case-insensitively; the token group does not.
static VIEW_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:https?://(?:www\.)?docsend\.com)/view/([A-Za-z0-9]+)$")
        .expect("view-link pattern is valid")
});

/// A validated DocSend view link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUrl {
    raw: String,
    token: String,
}

impl DocumentUrl {
    /// Validate `input` against the view-link shape.
    ///
    /// # Errors
    /// [`ConvertError::InvalidUrl`] when the input does not match. No network
    /// activity is attempted either way.
    pub fn parse(input: &str) -> Result<Self, ConvertError> {
        let trimmed = input.trim();
        let captures = VIEW_LINK
            .captures(trimmed)
            .ok_or_else(|| ConvertError::InvalidUrl {
                input: input.to_string(),
            })?;
        Ok(Self {
            raw: trimmed.to_string(),
            token: captures[1].to_string(),
        })
    }

    /// The full link, as supplied (whitespace-trimmed).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The document token, case preserved.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Display for DocumentUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
