//! The worker-to-caller event contract.
//!
//! Every conversion emits a sequence of [`WorkerEvent`]s over a channel:
//! zero or more `Progress` updates (percentages non-decreasing), at most one
//! `AuthRequired` pause per credential kind, and then exactly one terminal
//! event (`Complete` or `Error`) unless the run was cancelled, in which case
//! the stream simply ends. Any UI technology can bind against this contract;
//! the library knows nothing about how events are rendered.

use std::fmt;
use std::path::PathBuf;

/// Which credential the gate is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Email,
    Passcode,
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthKind::Email => write!(f, "email"),
            AuthKind::Passcode => write!(f, "passcode"),
        }
    }
}

/// Events emitted by a running conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Overall progress, 0 to 100, with a short status message.
    Progress { percent: u8, message: String },

    /// The document is gated; the run is paused until credentials arrive
    /// through [`crate::worker::WorkerHandle::provide_credentials`] or the
    /// run is cancelled.
    AuthRequired(AuthKind),

    /// Terminal: the PDF was written.
    Complete {
        output_path: PathBuf,
        page_count: usize,
        suggested_name: String,
    },

    /// Terminal: the conversion failed. `message` is short and user-facing,
    /// `detail` is the bounded technical dump.
    Error { message: String, detail: String },
}

impl WorkerEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerEvent::Complete { .. } | WorkerEvent::Error { .. }
        )
    }
}

/// Clamps reported progress to a monotone non-decreasing sequence.
///
/// The capture callback and the fixed phase milestones both feed this, so a
/// late page callback can never move the bar backwards.
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    high_water: u8,
}

impl ProgressTracker {
    /// Returns the percent to report for `raw`, never below a prior value.
    pub(crate) fn clamp(&mut self, raw: u8) -> u8 {
        let pct = raw.min(100).max(self.high_water);
        self.high_water = pct;
        pct
    }
}
