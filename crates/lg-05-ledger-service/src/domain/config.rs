use std::time::Duration;

/// Facade behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Hold mutating responses until the read store has applied them.
    pub await_reconciliation: bool,
    /// Upper bound on that wait; the response goes out regardless.
    pub reconciliation_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            await_reconciliation: false,
            reconciliation_timeout: Duration::from_secs(2),
        }
    }
}
