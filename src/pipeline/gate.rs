//! Gate classification: what is standing between us and the document.
//!
//! Classification is structural. The driver takes a [`PageProbe`] snapshot of
//! the rendered DOM (which form fields exist, whether the gate showed a
//! rejection state, whether the viewer itself is present) and [`classify`]
//! maps that to a [`GateState`]. Human-readable error text is never matched;
//! wording changes on the host's side must not change the classification.

/// Access state of a document, recomputed on each navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The viewer rendered; `page_count` pages are reachable.
    Open { page_count: usize },
    /// The gate form asks for an email address.
    NeedsEmail,
    /// The gate form asks for a passcode (usually alongside the email field).
    NeedsPasscode,
    /// The gate re-rendered in a rejected state after a submission.
    InvalidCredentials,
    /// The link shape was wrong. Normally caught before navigation; kept here
    /// so a redirect to a non-document page classifies cleanly.
    InvalidUrl,
    /// Navigation failed at the transport level or the host served an error.
    Unreachable,
}

/// Structural snapshot of a loaded page, produced by one DOM query.
///
/// `viewer_page_count` is `Some` only when the document viewer itself is in
/// the DOM; a gated page has the form fields instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageProbe {
    pub has_email_field: bool,
    pub has_passcode_field: bool,
    /// The gate form is flagged invalid after a round-trip (the engine's
    /// out-of-band validity marker, not error text).
    pub auth_rejected: bool,
    pub viewer_page_count: Option<usize>,
    /// Final URL after redirects; a bounce off the view path means the token
    /// does not name a document.
    pub redirected_off_document: bool,
}

/// Map a probe to the gate state. Pure; the priority order is load-bearing:
/// a rejected submission re-renders the same form, so rejection is checked
/// before the field-presence cases, and a passcode form usually also carries
/// an email field, so passcode is checked before email.
pub fn classify(probe: &PageProbe) -> GateState {
    if probe.redirected_off_document {
        return GateState::InvalidUrl;
    }
    if let Some(count) = probe.viewer_page_count {
        if count > 0 {
            return GateState::Open { page_count: count };
        }
    }
    if probe.auth_rejected && (probe.has_email_field || probe.has_passcode_field) {
        return GateState::InvalidCredentials;
    }
    if probe.has_passcode_field {
        return GateState::NeedsPasscode;
    }
    if probe.has_email_field {
        return GateState::NeedsEmail;
    }
    // No viewer, no gate form: the page never became a document.
    GateState::Unreachable
}
