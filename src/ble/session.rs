//! Advertising Session Bookkeeping
//!
//! The radio handle and the advertising task talk through a single
//! latest-wins command slot. A connection parks the task inside the GATT
//! server, so any number of start/stop pairs can be issued meanwhile; only
//! the newest one matters once the central goes away.

use crate::core::transport::TransportError;

/// Request posted from the radio handle to the advertising task
pub enum AdvCommand<S> {
    Start(S),
    Stop,
}

/// Payload and start state of the current session, as seen by the radio handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    payload_set: bool,
    started: bool,
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            payload_set: false,
            started: false,
        }
    }

    /// Accept advertising data for the next start.
    ///
    /// Refused while a payload is waiting to be started, or while the started
    /// session is still on air. A session that ended on its own (central
    /// connected, timeout) may be given new data without an explicit stop.
    pub fn accept_payload(&mut self, on_air: bool) -> Result<(), TransportError> {
        if self.payload_set && (!self.started || on_air) {
            return Err(TransportError::PayloadAlreadySet);
        }
        self.payload_set = true;
        self.started = false;
        Ok(())
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn stop(&mut self) {
        self.payload_set = false;
        self.started = false;
    }

    pub fn payload_set(&self) -> bool {
        self.payload_set
    }

    pub fn started(&self) -> bool {
        self.started
    }
}

/// Session to put back on air after a central disconnects.
///
/// A command issued during the connection supersedes the interrupted session:
/// a newer start replaces it and a newer stop cancels it. Without one, the
/// interrupted session resumes only when `restart` is set.
pub fn resume_after_disconnect<S>(interrupted: S, restart: bool, newer: Option<AdvCommand<S>>) -> Option<S> {
    match newer {
        Some(AdvCommand::Start(next)) => Some(next),
        Some(AdvCommand::Stop) => None,
        None if restart => Some(interrupted),
        None => None,
    }
}
