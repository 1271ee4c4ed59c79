//! Single-slot credential handshake between a paused worker and its caller.
//!
//! When the capture driver reports a gated document, the worker emits
//! `auth_required` and then awaits [`CredentialExchange::wait`]. Exactly one
//! of two producers releases the wait: [`CredentialExchange::provide`] with
//! the credentials, or [`CredentialExchange::cancel`]. The wait carries no
//! timeout; the pause may last as long as it takes a human to type, and only
//! the browser session is held across it.
//!
//! Abort is sticky: after `cancel()` the exchange stays aborted, `provide`
//! becomes a no-op, and every subsequent `wait` returns
//! [`AuthOutcome::Aborted`] immediately.

use std::sync::Mutex;
use tokio::sync::Notify;

/// Credentials supplied by the caller while the worker is paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub passcode: Option<String>,
}

/// How a [`CredentialExchange::wait`] call was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Supplied(Credentials),
    Aborted,
}

#[derive(Debug)]
enum Slot {
    Empty,
    Supplied(Credentials),
    Aborted,
}

/// The single-slot handshake. One lives per conversion run.
#[derive(Debug)]
pub struct CredentialExchange {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl Default for CredentialExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialExchange {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            notify: Notify::new(),
        }
    }

    /// Block until credentials arrive or the run is cancelled.
    ///
    /// Consumes the supplied credentials: a second `wait` after a single
    /// `provide` blocks again until the next producer call.
    pub async fn wait(&self) -> AuthOutcome {
        loop {
            // Arm the notification before inspecting the slot so a producer
            // firing between the check and the await cannot be missed.
            let notified = self.notify.notified();
            {
                let mut slot = self.slot.lock().expect("credential slot poisoned");
                match std::mem::replace(&mut *slot, Slot::Empty) {
                    Slot::Supplied(creds) => return AuthOutcome::Supplied(creds),
                    Slot::Aborted => {
                        *slot = Slot::Aborted; // abort is sticky
                        return AuthOutcome::Aborted;
                    }
                    Slot::Empty => {}
                }
            }
            notified.await;
        }
    }

    /// Fill the slot and release the waiter. No-op once aborted.
    pub fn provide(&self, credentials: Credentials) {
        let mut slot = self.slot.lock().expect("credential slot poisoned");
        if matches!(*slot, Slot::Aborted) {
            return;
        }
        *slot = Slot::Supplied(credentials);
        drop(slot);
        self.notify.notify_waiters();
    }

    /// Abort the exchange and release the waiter.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().expect("credential slot poisoned");
        *slot = Slot::Aborted;
        drop(slot);
        self.notify.notify_waiters();
    }
}
