use shared_types::{Command, CommandResult, Query, QueryResult, Sequence};

use crate::domain::{LedgerStateMachine, StateError};
use crate::ports::ReplicatedStateMachine;

impl ReplicatedStateMachine for LedgerStateMachine {
    fn apply_ordered(&mut self, sequence: Sequence, command: &Command) -> CommandResult {
        self.apply(sequence, command)
    }

    fn apply_unordered(&self, query: &Query) -> QueryResult {
        self.query(query)
    }

    fn export_snapshot(&self) -> Result<Vec<u8>, StateError> {
        self.export()
    }

    fn install_snapshot(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        self.install(bytes)
    }

    fn last_applied(&self) -> Sequence {
        LedgerStateMachine::last_applied(self)
    }
}
