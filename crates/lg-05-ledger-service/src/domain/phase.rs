//! Per-request lifecycle.
//!
//! ```text
//! [Received] ──verify──→ [Verified] ──submit──→ [Submitted] ──deliver──→ [Committed]
//!     │                      │                      │                        │
//!     │ bad envelope         │ query answered       │ timeout / refused      ├──→ [Reconciled]
//!     ↓                      ↓                      ↓                        ↓         │
//! [Rejected]            [Responded]             [Failed]                [Responded] ←──┘
//!
//! Any other error before commit (unknown contract, malformed request)
//! ends in [Failed].
//! ```

use std::fmt;

use ledger_telemetry::RequestTimer;
use shared_types::LedgerError;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Verified,
    Submitted,
    Committed,
    Reconciled,
    Responded,
    /// Envelope refused: bad signature, bad MAC or reused nonce.
    Rejected,
    /// Anything else that ended the request without an agreed result:
    /// unknown contract, malformed request, boundary refused or timed
    /// out, or a read failed.
    Failed,
}

impl RequestPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::Rejected | Self::Failed)
    }

    pub fn can_transition_to(self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Received, Verified | Rejected | Failed)
                | (Verified, Submitted | Responded | Failed)
                | (Submitted, Committed | Failed)
                | (Committed, Reconciled | Responded)
                | (Reconciled, Responded)
        )
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one request through its phases and times it.
pub struct RequestTracker {
    id: Uuid,
    method: &'static str,
    phase: RequestPhase,
    _timer: RequestTimer,
}

impl RequestTracker {
    pub fn start(method: &'static str) -> Self {
        let id = Uuid::new_v4();
        debug!(request = %id, method, phase = %RequestPhase::Received, "Request received");
        Self {
            id,
            method,
            phase: RequestPhase::Received,
            _timer: RequestTimer::start(method),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn advance(&mut self, next: RequestPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(
                request = %self.id,
                method = self.method,
                from = %self.phase,
                to = %next,
                "Unexpected request phase transition"
            );
        }
        debug!(request = %self.id, method = self.method, from = %self.phase, to = %next, "Request phase");
        self.phase = next;
    }

    /// Move to the terminal phase matching `outcome`.
    ///
    /// A ledger rejection produced by the apply step is still a response:
    /// it is the agreed result.
    pub fn finish<T>(&mut self, outcome: &Result<T, LedgerError>) {
        let next = match (outcome, self.phase) {
            (Ok(_), _) => RequestPhase::Responded,
            (Err(e), RequestPhase::Received) if is_envelope_rejection(e) => RequestPhase::Rejected,
            (Err(_), RequestPhase::Committed | RequestPhase::Reconciled) => RequestPhase::Responded,
            (Err(_), _) => RequestPhase::Failed,
        };
        if let Err(e) = outcome {
            debug!(request = %self.id, method = self.method, code = e.code(), error = %e, "Request unsuccessful");
        }
        self.advance(next);
    }
}

fn is_envelope_rejection(error: &LedgerError) -> bool {
    matches!(
        error,
        LedgerError::AuthenticationFailure(_)
            | LedgerError::IntegrityFailure(_)
            | LedgerError::ReplayFailure(_)
    )
}
