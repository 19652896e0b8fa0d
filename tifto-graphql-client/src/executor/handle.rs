//! The caller's side of a query handle.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::driver::Command;
use super::{QueryState, RefetchResult};
use crate::{GraphQLError, SharedError};

/// A live query. Dropping it releases the query: polling stops and no
/// in-flight result is applied afterwards.
pub struct QueryHandle {
    state: watch::Receiver<QueryState>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl QueryHandle {
    pub(crate) fn new(
        state: watch::Receiver<QueryState>,
        commands: mpsc::UnboundedSender<Command>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            state,
            commands,
            task,
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Value> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<SharedError> {
        self.state.borrow().error.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_error(&self) -> bool {
        self.state.borrow().is_error()
    }

    pub fn is_success(&self) -> bool {
        self.state.borrow().is_success()
    }

    /// A receiver observing every state change.
    pub fn watch(&self) -> watch::Receiver<QueryState> {
        self.state.clone()
    }

    /// Wait for the next state change. False once the handle's driver has stopped.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until `predicate` holds and return that state.
    pub async fn wait_until(&mut self, predicate: impl FnMut(&QueryState) -> bool) -> QueryState {
        let waited = self.state.wait_for(predicate).await.map(|state| state.clone());
        match waited {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Re-run the query after the debounce window, retrying failures.
    ///
    /// Calls within one window share a single execution that uses the most
    /// recent `variables`; object variables are merged into the handle's.
    /// On a disabled handle nothing is sent and the current data is returned.
    pub async fn refetch(&self, variables: Option<Value>) -> RefetchResult {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(Command::Refetch { variables, reply })
            .map_err(|_| released())?;
        receiver.await.map_err(|_| released())?
    }

    /// Enable or disable the query. Enabling a disabled query runs it once.
    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetEnabled(enabled));
    }

    /// Replace the variables; an enabled query re-runs with them.
    pub fn set_variables(&self, variables: Value) {
        let _ = self.commands.send(Command::SetVariables(variables));
    }

    /// Stop the query. Equivalent to dropping the handle.
    pub fn release(self) {}
}

fn released() -> SharedError {
    Arc::new(GraphQLError::Released)
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("state", &*self.state.borrow())
            .finish()
    }
}
