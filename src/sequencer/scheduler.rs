// Scheduler - Cancellable repeating tasks
//
// The transport's position display refresh runs as a repeating task owned
// through a `TaskHandle`. `ThreadScheduler` drives tasks from a dedicated
// thread; `ManualScheduler` lets tests advance time explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Something that can run a task every `interval` until cancelled
pub trait Scheduler: Send + Sync {
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TaskHandle;
}

/// Owner of a scheduled task. Cancels the task when dropped.
///
/// After `cancel()` returns, the task body is not running and will not
/// run again.
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            stop_tx: None,
            thread: None,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // Dropping the sender disconnects the worker's recv_timeout
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                log::error!("Scheduled task panicked");
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Runs each task on its own thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule_repeating(&self, interval: Duration, mut task: RepeatingTask) -> TaskHandle {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_worker = Arc::clone(&cancelled);

        let spawned = thread::Builder::new()
            .name("playexl-poll".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if cancelled_worker.load(Ordering::Acquire) {
                                break;
                            }
                            task();
                        }
                        // Disconnected, or an explicit stop message
                        _ => break,
                    }
                }
            });

        let mut handle = TaskHandle::new(cancelled);
        match spawned {
            Ok(thread) => {
                handle.stop_tx = Some(stop_tx);
                handle.thread = Some(thread);
            }
            Err(e) => {
                log::error!("Failed to spawn scheduler thread: {}", e);
                handle.cancelled.store(true, Ordering::Release);
            }
        }
        handle
    }
}

struct ManualTask {
    interval: Duration,
    elapsed: Duration,
    cancelled: Arc<AtomicBool>,
    task: RepeatingTask,
}

/// Deterministic scheduler: tasks only run from `tick`
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<ManualTask>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `elapsed`, running every task that comes due
    /// (possibly several times). Cancelled tasks are discarded.
    pub fn tick(&self, elapsed: Duration) {
        let Ok(mut tasks) = self.tasks.lock() else {
            return;
        };
        tasks.retain(|t| !t.cancelled.load(Ordering::Acquire));

        for entry in tasks.iter_mut() {
            entry.elapsed += elapsed;
            while entry.elapsed >= entry.interval && !entry.cancelled.load(Ordering::Acquire) {
                entry.elapsed -= entry.interval;
                (entry.task)();
            }
        }
    }

    /// Number of tasks still scheduled
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| {
                tasks
                    .iter()
                    .filter(|t| !t.cancelled.load(Ordering::Acquire))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(ManualTask {
                interval: interval.max(Duration::from_millis(1)),
                elapsed: Duration::ZERO,
                cancelled: Arc::clone(&cancelled),
                task,
            });
        }
        TaskHandle::new(cancelled)
    }
}
