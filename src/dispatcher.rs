use crate::transport::{RawResponse, Transport};
use crate::types::{Callback, Outcome, RequestError, Task, TaskId};
use anyhow::Result;
use http::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

/// Admission-control queue in front of a [`Transport`].
///
/// At most `max_concurrent` tasks execute at once; the rest wait in a
/// FIFO backlog and are admitted as running tasks finish. All
/// bookkeeping (backlog, in-flight map, active counter) lives behind a
/// single mutex so that submitters, completions, and cancellation
/// never race on the counter or pop the same backlog head twice.
/// Callbacks always run outside that lock.
///
/// Must be used from within a tokio runtime; execution is spawned.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
    debug: AtomicBool,
}

struct State {
    backlog: VecDeque<Task>,
    in_flight: HashMap<TaskId, InFlight>,
    active: usize,
    max_concurrent: usize,
}

struct InFlight {
    callback: Callback,
    handle: JoinHandle<()>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, max_concurrent: usize, debug: bool) -> Self {
        Dispatcher {
            inner: Arc::new(Inner {
                transport,
                state: Mutex::new(State {
                    backlog: VecDeque::new(),
                    in_flight: HashMap::new(),
                    active: 0,
                    max_concurrent: max_concurrent.max(1),
                }),
                debug: AtomicBool::new(debug),
            }),
        }
    }

    /// Appends the task to the backlog, then starts as many queued
    /// tasks as free slots allow.
    pub fn submit(&self, task: Task) {
        let mut state = self.inner.state();
        self.inner.log(format_args!("queued {}", task));
        state.backlog.push_back(task);
        Inner::admit(&self.inner, &mut state);
    }

    /// Number of tasks currently executing.
    pub fn active_count(&self) -> usize {
        self.inner.state().active
    }

    /// Number of tasks waiting for a free slot.
    pub fn backlog_len(&self) -> usize {
        self.inner.state().backlog.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.state().max_concurrent
    }

    /// Changes the concurrency limit for future admissions (floored at
    /// 1). A lowered limit never preempts running tasks, and a raised
    /// limit does not retroactively admit: queued tasks start on the
    /// next submit or completion.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.inner.state().max_concurrent = max_concurrent.max(1);
    }

    pub fn set_debug_logging(&self, enabled: bool) {
        self.inner.debug.store(enabled, Ordering::Relaxed);
    }

    /// Cancels every queued task. Each callback sees
    /// [`RequestError::CancelledBeforeExecution`] before this returns.
    /// Running tasks and the active counter are untouched.
    pub fn clear_backlog(&self) {
        let drained: Vec<Task> = self.inner.state().backlog.drain(..).collect();
        for task in drained {
            self.inner
                .log(format_args!("cancelled {} before execution", task));
            deliver(task.callback, Err(RequestError::CancelledBeforeExecution));
        }
    }

    /// Cancels every in-flight task: aborts its transport future,
    /// delivers [`RequestError::CancelledMidExecution`], and forces
    /// the active counter to zero so the gate cannot stick if the
    /// transport never reports back. A completion that raced past the
    /// abort finds its entry gone and is dropped without a second
    /// callback. Freed slots are refilled from the backlog.
    pub fn clear_in_flight(&self) {
        let drained: Vec<InFlight> = {
            let mut state = self.inner.state();
            state.active = 0;
            state.in_flight.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            entry.handle.abort();
            self.inner
                .log(format_args!("cancelled a request mid execution"));
            deliver(entry.callback, Err(RequestError::CancelledMidExecution));
        }
        let mut state = self.inner.state();
        Inner::admit(&self.inner, &mut state);
    }

    /// Shutdown path: cancel the backlog first, then everything in
    /// flight. Calling it again on an empty dispatcher is a no-op.
    pub fn clear_all(&self) {
        self.clear_backlog();
        self.clear_in_flight();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("Dispatcher")
            .field("active", &state.active)
            .field("max_concurrent", &state.max_concurrent)
            .field("backlog", &state.backlog.len())
            .finish()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<State> {
        // Nothing that panics runs under this lock, but a poisoned
        // state must not wedge the whole queue either.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, args: fmt::Arguments) {
        if self.debug.load(Ordering::Relaxed) {
            debug!("{}", args);
        }
    }

    /// Pops and starts queued tasks while slots are free. Iterative on
    /// purpose: completions call back in here, and draining a long
    /// backlog must not grow the stack.
    fn admit(inner: &Arc<Inner>, state: &mut State) {
        while state.active < state.max_concurrent {
            let task = match state.backlog.pop_front() {
                Some(task) => task,
                None => break,
            };
            inner.log(format_args!("admitted {}", task));
            let id = task.id;
            state.active += 1;
            let future = inner.transport.execute(task.exchange);
            let completer = Arc::clone(inner);
            let handle = tokio::spawn(async move {
                let result = future.await;
                Inner::complete(&completer, id, result);
            });
            state.in_flight.insert(
                id,
                InFlight {
                    callback: task.callback,
                    handle,
                },
            );
        }
    }

    /// Completion path, run on the spawned task once the transport
    /// yields. An absent in-flight entry means the task was cancelled
    /// mid execution and its callback already fired, so the late
    /// result is dropped.
    fn complete(inner: &Arc<Inner>, id: TaskId, result: Result<RawResponse>) {
        let callback = {
            let mut state = inner.state();
            match state.in_flight.remove(&id) {
                Some(entry) => {
                    state.active -= 1;
                    entry.callback
                }
                None => return,
            }
        };
        inner.log(format_args!("finished task {}", id));
        deliver(callback, classify(result));
        let mut state = inner.state();
        Inner::admit(inner, &mut state);
    }
}

/// Maps a transport result onto the caller-facing outcome. Only a
/// plain 200 counts as success; every other status, 2xx included, is
/// reported as an error carrying the reason phrase.
fn classify(result: Result<RawResponse>) -> Outcome {
    match result {
        Err(e) => Err(RequestError::Transport(e)),
        Ok(response) => {
            if response.status == StatusCode::OK {
                Ok(response.body)
            } else {
                let reason = response
                    .status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string();
                Err(RequestError::HttpStatus {
                    code: response.status,
                    reason,
                })
            }
        }
    }
}

/// Runs the callback isolated from the admission pipeline: a panicking
/// callback must not stop the next task from being admitted.
fn deliver(callback: Callback, outcome: Outcome) {
    if catch_unwind(AssertUnwindSafe(move || callback(outcome))).is_err() {
        warn!("response callback panicked");
    }
}
