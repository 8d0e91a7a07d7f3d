//! Session state tracking

use serde::Serialize;

/// Whether a request is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    AwaitingResponse,
}

/// Loading flag plus the last error
#[derive(Debug, Default)]
pub struct SessionState {
    /// Exchanges issued and not yet terminated
    in_flight: usize,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A request was issued
    pub fn begin(&mut self) {
        self.in_flight += 1;
        self.last_error = None;
    }

    /// The stream ended cleanly
    pub fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// The exchange failed
    pub fn fail(&mut self, error: String) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_error = Some(error);
    }

    /// Awaiting while any exchange is still running
    pub fn status(&self) -> SessionStatus {
        if self.in_flight > 0 {
            SessionStatus::AwaitingResponse
        } else {
            SessionStatus::Idle
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.status() == SessionStatus::AwaitingResponse
    }
}
