//! Unit-of-work scope carrying after-commit actions
//!
//! Business code opens a [`TransactionScope`] next to its database
//! transaction, passes it to the publisher, and reports the outcome once the
//! database has answered. Actions registered on the scope run only for a
//! committed (or indeterminate) outcome; a rollback discards them.

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Work deferred until the transaction outcome is known
pub type DeferredAction = Box<dyn FnOnce() + Send + 'static>;

/// How the enclosing transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
    /// The transaction manager completed without reporting commit or rollback
    Unknown,
}

#[derive(Default)]
struct ScopeState {
    completed: bool,
    actions: Vec<DeferredAction>,
}

/// Deferred action list attached to one transaction
#[derive(Default)]
pub struct TransactionScope {
    state: Mutex<ScopeState>,
}

impl TransactionScope {
    pub fn begin() -> Self {
        Self::default()
    }

    /// True until an outcome has been reported
    pub fn is_active(&self) -> bool {
        !self.state.lock().completed
    }

    pub fn pending_actions(&self) -> usize {
        self.state.lock().actions.len()
    }

    /// Queue `action` to run after commit.
    ///
    /// If the scope already completed the action is handed back untouched so
    /// the caller can decide what to do with it.
    pub fn register_after_commit(&self, action: DeferredAction) -> Result<(), DeferredAction> {
        let mut state = self.state.lock();
        if state.completed {
            return Err(action);
        }
        state.actions.push(action);
        Ok(())
    }

    /// Report a successful commit; runs every queued action
    pub fn commit(&self) -> usize {
        self.complete(TransactionOutcome::Committed)
    }

    /// Report a rollback; discards every queued action
    pub fn rollback(&self) -> usize {
        self.complete(TransactionOutcome::RolledBack)
    }

    /// Report the final outcome. Only the first call has any effect.
    ///
    /// Returns the number of actions executed.
    pub fn complete(&self, outcome: TransactionOutcome) -> usize {
        let actions = {
            let mut state = self.state.lock();
            if state.completed {
                return 0;
            }
            state.completed = true;
            std::mem::take(&mut state.actions)
        };

        match outcome {
            TransactionOutcome::Committed => {
                debug!(actions = actions.len(), "Running after-commit actions");
            }
            TransactionOutcome::RolledBack => {
                debug!(
                    actions = actions.len(),
                    "Transaction rolled back, discarding after-commit actions"
                );
                return 0;
            }
            TransactionOutcome::Unknown => {
                if !actions.is_empty() {
                    warn!(
                        actions = actions.len(),
                        "Transaction outcome unknown, running deferred actions anyway"
                    );
                }
            }
        }

        let executed = actions.len();
        for action in actions {
            action();
        }
        executed
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.completed && !state.actions.is_empty() {
            debug!(
                actions = state.actions.len(),
                "Transaction scope dropped without an outcome, treating as rollback"
            );
        }
    }
}
