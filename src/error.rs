//! Error types for the docsend2pdf library.
//!
//! One taxonomy covers the whole pipeline, from URL validation through the
//! final file write. The worker catches every variant at its boundary and maps
//! it to a short user-facing message plus a verbose technical detail string;
//! [`ConvertError::Cancelled`] is the exception and is never reported as an
//! error at all.

use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on the technical-detail string attached to an error event.
///
/// Browser engines can produce multi-kilobyte failure dumps; everything past
/// this length is cut before the detail leaves the worker.
pub const MAX_DETAIL_LEN: usize = 2000;

/// All errors produced by the docsend2pdf library.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input string is not a DocSend view link.
    ///
    /// Raised before any network activity is attempted.
    #[error("invalid DocSend URL: '{input}'\nExpected https://docsend.com/view/<token>")]
    InvalidUrl { input: String },

    /// The document host could not be reached or refused the navigation.
    #[error("could not reach the document: {detail}")]
    Unreachable { detail: String },

    /// Navigation or a page render exceeded the configured wait.
    #[error("timed out after {secs}s while {during}")]
    Timeout { secs: u64, during: String },

    /// The gate rejected the supplied email/passcode.
    #[error("the document gate rejected the supplied credentials")]
    InvalidCredentials,

    /// The document loaded but its viewer never rendered any pages.
    #[error("document failed to render: {detail}")]
    PageLoad { detail: String },

    /// Browser session could not be launched or died mid-run.
    #[error("browser session failed: {detail}")]
    Browser { detail: String },

    /// Page images could not be decoded or the PDF could not be constructed.
    #[error("PDF assembly failed: {detail}")]
    Assembly { detail: String },

    /// Could not write the output file.
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled. Not a failure; suppresses error reporting.
    #[error("conversion cancelled")]
    Cancelled,

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Short user-facing message for the `error` event.
    ///
    /// These strings are the UI contract; the verbose variant display goes
    /// into the technical detail instead.
    pub fn user_message(&self) -> String {
        match self {
            ConvertError::InvalidUrl { .. } => "Invalid DocSend URL format".into(),
            ConvertError::Unreachable { .. } => {
                "Network error. Please check your internet connection.".into()
            }
            ConvertError::Timeout { .. } => "Connection timed out. Please try again.".into(),
            ConvertError::InvalidCredentials => "Invalid email or passcode".into(),
            ConvertError::PageLoad { .. } => {
                "Could not load the document. Check your internet connection.".into()
            }
            ConvertError::Browser { .. } => "Could not start the capture browser.".into(),
            ConvertError::Assembly { .. } => {
                "Could not build the PDF from the captured pages.".into()
            }
            ConvertError::Io { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                "Permission denied. Cannot save file to this location.".into()
            }
            ConvertError::Io { .. } => "Could not save the PDF file.".into(),
            ConvertError::Cancelled => "Cancelled".into(),
            ConvertError::InvalidConfig(msg) => msg.clone(),
            ConvertError::Internal(msg) => truncate_detail(msg),
        }
    }

    /// Verbose detail for the `error` event, bounded to [`MAX_DETAIL_LEN`].
    pub fn technical_detail(&self) -> String {
        truncate_detail(&format!("{self:?}"))
    }

    /// True when this error means the run was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Cancelled)
    }
}

/// Cut `s` at [`MAX_DETAIL_LEN`], respecting char boundaries.
pub(crate) fn truncate_detail(s: &str) -> String {
    if s.len() <= MAX_DETAIL_LEN {
        return s.to_string();
    }
    let mut end = MAX_DETAIL_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_message_is_stable() {
        let e = ConvertError::InvalidUrl {
            input: "https://example.com/x".into(),
        };
        assert_eq!(e.user_message(), "Invalid DocSend URL format");
    }

    #[test]
    fn permission_denied_maps_to_save_message() {
        let e = ConvertError::Io {
            path: PathBuf::from("/readonly/Foo.pdf"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(e.user_message().contains("Permission denied"));
    }

    #[test]
    fn detail_is_bounded() {
        let e = ConvertError::Internal("x".repeat(10_000));
        assert!(e.technical_detail().len() <= MAX_DETAIL_LEN + '\u{2026}'.len_utf8());
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let s = "é".repeat(MAX_DETAIL_LEN); // 2 bytes per char
        let out = truncate_detail(&s);
        assert!(out.len() <= MAX_DETAIL_LEN + '\u{2026}'.len_utf8());
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn cancelled_is_not_a_failure() {
        assert!(ConvertError::Cancelled.is_cancelled());
        assert!(!ConvertError::InvalidCredentials.is_cancelled());
    }
}
