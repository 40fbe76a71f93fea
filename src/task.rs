//! Supervised concurrent activity.
//!
//! A [`Task`] wraps some [`Runnable`] work with an `input`/`output`
//! [`Channel`] pair and a lifecycle state machine (`New` -> `Running` ->
//! `Stopped`|`Error`). A [`TaskManager`] is the process-wide registry of
//! live tasks, mirroring `kitsh.core.task.TaskManager` — but unlike the
//! Python original, which keys tasks by `id(task)` (a CPython memory
//! address, stable only because `gevent` never moves objects), tasks here
//! get an explicit random identifier: nothing in Rust guarantees an
//! object's address is a meaningful, stable key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::error::ShellbusError;

/// Where a [`Task`] sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Running,
    Stopped,
    Error,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::New,
            1 => Self::Running,
            2 => Self::Stopped,
            _ => Self::Error,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Running => 1,
            Self::Stopped => 2,
            Self::Error => 3,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

/// The unit of work a [`Task`] supervises.
///
/// Implementors are the session backends: a local shell, a PTY-attached
/// child process, a remote SSH session, a WebSocket frame pump. `run`
/// drives the work to completion (or until `stop` cancels it); `stop`
/// requests early termination and defaults to a no-op for runnables with
/// no graceful-interrupt story of their own.
#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError>;

    async fn stop(&self, _task: &Task) {}
}

fn new_task_id() -> String {
    let mut bytes = [0u8; 10];
    rand::rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

/// A supervised piece of concurrent work with its own input/output
/// [`Channel`]s.
pub struct Task {
    id: String,
    pub input: Channel,
    pub output: Channel,
    state: AtomicU8,
    state_changed: Notify,
    error: Mutex<Option<ShellbusError>>,
    runnable: Arc<dyn Runnable>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Task {
    fn new(runnable: Arc<dyn Runnable>) -> Arc<Self> {
        Arc::new(Self {
            id: new_task_id(),
            input: Channel::new(),
            output: Channel::new(),
            state: AtomicU8::new(TaskState::New.as_u8()),
            state_changed: Notify::new(),
            error: Mutex::new(None),
            runnable,
            handle: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: TaskState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
        self.state_changed.notify_waiters();
    }

    /// The fault that drove this task into [`TaskState::Error`], if any.
    /// Always `Some` once `state()` is `TaskState::Error`.
    #[must_use]
    pub fn error(&self) -> Option<ShellbusError> {
        self.error.lock().expect("task error lock poisoned").clone()
    }

    fn set_error(&self, err: ShellbusError) {
        *self.error.lock().expect("task error lock poisoned") = Some(err);
    }

    /// Request early termination. Delegates to the `Runnable`'s own `stop`;
    /// the task still transitions via its `run` future returning, not via
    /// this call directly.
    pub async fn stop(&self) {
        self.runnable.stop(self).await;
    }

    /// Block until the task reaches a terminal state, returning it.
    pub async fn wait(self: &Arc<Self>) -> TaskState {
        loop {
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            self.state_changed.notified().await;
        }
    }
}

/// Process-wide (or test-local) registry of live [`Task`]s.
pub struct TaskManager {
    tasks: Mutex<HashMap<String, Arc<Task>>>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("count", &self.count())
            .finish()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<TaskManager> = OnceLock::new();

impl TaskManager {
    /// A freestanding manager, independent of the process-wide singleton —
    /// tests that need isolated task accounting should use this instead of
    /// [`TaskManager::global`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide singleton manager.
    pub fn global() -> &'static TaskManager {
        GLOBAL.get_or_init(TaskManager::new)
    }

    /// Number of tasks currently tracked (i.e. not yet reaped after
    /// reaching a terminal state).
    #[must_use]
    pub fn count(&self) -> usize {
        self.tasks.lock().expect("task manager lock poisoned").len()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Task>> {
        self.tasks.lock().expect("task manager lock poisoned").get(id).cloned()
    }

    /// Build a new task around `runnable`, register it, and start running
    /// it in the background.
    pub fn spawn(&'static self, runnable: Arc<dyn Runnable>) -> Arc<Task> {
        let task = Task::new(runnable);
        self.tasks
            .lock()
            .expect("task manager lock poisoned")
            .insert(task.id.clone(), Arc::clone(&task));
        self.start(Arc::clone(&task));
        task
    }

    fn start(&'static self, task: Arc<Task>) {
        task.set_state(TaskState::Running);
        let runnable = Arc::clone(&task.runnable);
        let task_for_run = Arc::clone(&task);
        let task_for_join = Arc::clone(&task);
        let handle = tokio::spawn(async move {
            let result = runnable.run(Arc::clone(&task_for_run)).await;
            match result {
                Ok(()) => task_for_run.set_state(TaskState::Stopped),
                Err(err) => {
                    task_for_run.set_error(err);
                    task_for_run.set_state(TaskState::Error);
                }
            }
            self.tasks.lock().expect("task manager lock poisoned").remove(&task_for_run.id);
        });
        *task_for_join.handle.lock().expect("task handle lock poisoned") = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    struct Echo {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Runnable for Echo {
        async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError> {
            self.ran.store(true, AtomicOrdering::SeqCst);
            let mut ds = task.input.datastream();
            let bytes = ds.read(1024).await;
            task.output.write(bytes);
            Ok(())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Runnable for AlwaysFails {
        async fn run(&self, _task: Arc<Task>) -> Result<(), ShellbusError> {
            Err(ShellbusError::RunnableFault("boom".into()))
        }
    }

    #[tokio::test]
    async fn task_runs_and_reaches_stopped() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let ran = Arc::new(AtomicBool::new(false));
        let task = manager.spawn(Arc::new(Echo { ran: ran.clone() }));
        task.input.write("hi");
        task.input.close();
        let state = task.wait().await;
        assert_eq!(state, TaskState::Stopped);
        assert!(ran.load(AtomicOrdering::SeqCst));
    }

    #[tokio::test]
    async fn failing_runnable_reaches_error_state() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let task = manager.spawn(Arc::new(AlwaysFails));
        assert_eq!(task.wait().await, TaskState::Error);
    }

    #[tokio::test]
    async fn error_state_carries_the_fault() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let task = manager.spawn(Arc::new(AlwaysFails));
        task.wait().await;
        match task.error() {
            Some(ShellbusError::RunnableFault(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected a RunnableFault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn manager_reaps_task_once_terminal() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let task = manager.spawn(Arc::new(AlwaysFails));
        task.wait().await;
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn task_ids_are_distinct() {
        let a = new_task_id();
        let b = new_task_id();
        assert_ne!(a, b);
    }
}
