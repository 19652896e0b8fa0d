//! The task behind one query handle.
//!
//! The driver owns every piece of handle state. Executions run concurrently
//! inside it, each tagged with a sequence number; a completion is applied
//! only when it is newer than the last applied one, so a slow early request
//! never overwrites a faster later one.

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::{ErrorPolicy, QueryOptions, QueryState, QueryTransport, RefetchResult};
use crate::{FetchPolicy, GraphQLError, GraphQLRequest, GraphQLResponse, Result, SharedError};

pub(crate) enum Command {
    Refetch {
        variables: Option<Value>,
        reply: oneshot::Sender<RefetchResult>,
    },
    SetEnabled(bool),
    SetVariables(Value),
}

/// Data and error of one finished execution, already shaped by the error policy.
#[derive(Debug, Clone)]
struct Outcome {
    data: Option<Value>,
    error: Option<SharedError>,
}

struct Completion {
    seq: u64,
    outcome: Outcome,
}

struct Debounce {
    deadline: Instant,
    variables: Option<Value>,
    waiters: Vec<oneshot::Sender<RefetchResult>>,
}

pub(crate) struct Driver {
    transport: Arc<dyn QueryTransport>,
    request: GraphQLRequest,
    options: QueryOptions,
    enabled: bool,
    state: watch::Sender<QueryState>,
    next_seq: u64,
    last_applied: u64,
    in_flight: HashSet<u64>,
    waiters: HashMap<u64, Vec<oneshot::Sender<RefetchResult>>>,
    debounce: Option<Debounce>,
    poll: Option<Interval>,
    executions: FuturesUnordered<BoxFuture<'static, Completion>>,
}

impl Driver {
    pub(crate) fn new(
        transport: Arc<dyn QueryTransport>,
        request: GraphQLRequest,
        options: QueryOptions,
        state: watch::Sender<QueryState>,
    ) -> Self {
        let poll = options.poll_interval.filter(|p| !p.is_zero()).map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self {
            transport,
            request,
            enabled: options.enabled,
            options,
            state,
            next_seq: 0,
            last_applied: 0,
            in_flight: HashSet::new(),
            waiters: HashMap::new(),
            debounce: None,
            poll,
            executions: FuturesUnordered::new(),
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if self.enabled {
            self.start(self.options.fetch_policy, 0);
        } else {
            self.publish();
        }

        loop {
            let deadline = self.debounce.as_ref().map(|d| d.deadline);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = sleep_until(deadline) => self.fire_refetch(),
                _ = tick(&mut self.poll) => {
                    if self.enabled {
                        debug!(operation = %self.request.display_name(), "Poll tick");
                        self.start(self.options.fetch_policy.refetch_policy(), 0);
                    }
                }
                Some(completion) = self.executions.next(), if !self.executions.is_empty() => {
                    self.complete(completion);
                }
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Refetch { variables, reply } => {
                if !self.enabled {
                    let _ = reply.send(Ok(self.state.borrow().data.clone()));
                    return;
                }
                let deadline = Instant::now() + self.options.debounce;
                match self.debounce.as_mut() {
                    Some(pending) => {
                        pending.deadline = deadline;
                        pending.variables = variables;
                        pending.waiters.push(reply);
                    }
                    None => {
                        self.debounce = Some(Debounce {
                            deadline,
                            variables,
                            waiters: vec![reply],
                        });
                    }
                }
                self.publish();
            }
            Command::SetEnabled(enabled) => {
                let was_enabled = self.enabled;
                self.enabled = enabled;
                if enabled && !was_enabled {
                    self.start(self.options.fetch_policy, 0);
                } else if !enabled && was_enabled {
                    self.supersede();
                }
            }
            Command::SetVariables(variables) => {
                self.request.variables = Some(variables);
                if self.enabled {
                    self.start(self.options.fetch_policy, 0);
                }
            }
        }
    }

    /// Drop the pending refetch and everything in flight. Their waiters get
    /// the current data and no later completion is applied.
    fn supersede(&mut self) {
        let data = self.state.borrow().data.clone();
        let pending = self.debounce.take().map(|d| d.waiters).unwrap_or_default();
        let refetching = self.waiters.drain().flat_map(|(_, waiters)| waiters);
        for waiter in pending.into_iter().chain(refetching) {
            let _ = waiter.send(Ok(data.clone()));
        }
        if !self.in_flight.is_empty() {
            debug!(operation = %self.request.display_name(), count = self.in_flight.len(), "Disabled; superseding in-flight executions");
        }
        self.last_applied = self.next_seq;
        self.publish();
    }

    fn fire_refetch(&mut self) {
        let Some(pending) = self.debounce.take() else {
            return;
        };
        if let Some(variables) = pending.variables {
            self.request.variables = Some(merge_variables(self.request.variables.take(), variables));
        }
        let seq = self.start(self.options.fetch_policy.refetch_policy(), self.options.retry);
        self.waiters.insert(seq, pending.waiters);
    }

    /// Launch one execution with the current variables; returns its sequence number.
    fn start(&mut self, fetch_policy: FetchPolicy, retries: u32) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.in_flight.insert(seq);

        let transport = self.transport.clone();
        let request = self.request.clone();
        let error_policy = self.options.error_policy;
        let retry_delay = self.options.retry_delay;

        debug!(operation = %request.display_name(), seq, retries, "Starting execution");
        self.executions.push(Box::pin(async move {
            let outcome = attempt(
                transport,
                request,
                fetch_policy,
                error_policy,
                retries,
                retry_delay,
            )
            .await;
            Completion { seq, outcome }
        }));
        self.publish();
        seq
    }

    fn complete(&mut self, completion: Completion) {
        let Completion { seq, outcome } = completion;
        self.in_flight.remove(&seq);

        if seq > self.last_applied {
            self.last_applied = seq;
            self.state.send_modify(|state| {
                state.data = outcome.data.clone();
                state.error = outcome.error.clone();
            });
            match &outcome.error {
                Some(error) => {
                    if let Some(on_error) = &self.options.on_error {
                        on_error(error);
                    }
                }
                None => {
                    if let Some(on_completed) = &self.options.on_completed {
                        on_completed(outcome.data.as_ref());
                    }
                }
            }
        } else {
            debug!(seq, last_applied = self.last_applied, "Dropping stale result");
        }

        if let Some(waiters) = self.waiters.remove(&seq) {
            let result = refetch_result(&outcome, self.options.error_policy);
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let loading = self.debounce.is_some()
            || !self.waiters.is_empty()
            || self.in_flight.iter().any(|seq| *seq > self.last_applied);
        self.state.send_if_modified(|state| {
            if state.loading == loading {
                false
            } else {
                state.loading = loading;
                true
            }
        });
    }
}

/// Run one execution, retrying up to `retries` extra times on failure.
async fn attempt(
    transport: Arc<dyn QueryTransport>,
    request: GraphQLRequest,
    fetch_policy: FetchPolicy,
    error_policy: ErrorPolicy,
    retries: u32,
    retry_delay: Duration,
) -> Outcome {
    let mut attempts = 0;
    loop {
        let result = transport.execute(request.clone(), fetch_policy).await;
        let failed = match &result {
            Err(_) => true,
            Ok(response) => error_policy == ErrorPolicy::None && response.has_errors(),
        };
        if !failed || attempts >= retries {
            if failed && retries > 0 {
                warn!(operation = %request.display_name(), attempts = attempts + 1, "Refetch failed after retries");
            }
            return shape(result, error_policy);
        }
        attempts += 1;
        debug!(operation = %request.display_name(), attempt = attempts, "Refetch failed; retrying");
        tokio::time::sleep(retry_delay).await;
    }
}

fn shape(result: Result<GraphQLResponse<Value>>, policy: ErrorPolicy) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return Outcome {
                data: None,
                error: Some(Arc::new(e)),
            };
        }
    };
    let (data, errors) = response.into_parts();
    match (policy, errors) {
        (_, None) | (ErrorPolicy::Ignore, Some(_)) => Outcome { data, error: None },
        (ErrorPolicy::None, Some(errors)) => Outcome {
            data: None,
            error: Some(Arc::new(GraphQLError::GraphQL(errors))),
        },
        (ErrorPolicy::All, Some(errors)) => Outcome {
            data,
            error: Some(Arc::new(GraphQLError::GraphQL(errors))),
        },
    }
}

fn refetch_result(outcome: &Outcome, policy: ErrorPolicy) -> RefetchResult {
    match (&outcome.data, &outcome.error) {
        (Some(data), Some(_)) if policy == ErrorPolicy::All => Ok(Some(data.clone())),
        (_, Some(error)) => Err(error.clone()),
        (data, None) => Ok(data.clone()),
    }
}

/// Object variables are merged key by key; anything else replaces.
pub(crate) fn merge_variables(current: Option<Value>, update: Value) -> Value {
    match (current, update) {
        (Some(Value::Object(mut base)), Value::Object(patch)) => {
            base.extend(patch);
            Value::Object(base)
        }
        (_, update) => update,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
