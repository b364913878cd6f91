//! Dedicated background thread for model updates.
//!
//! Collaborator fetches are allowed to block. A rendering layer must not call
//! `reconcile`, `refresh` or page navigation from its own thread; it hands the
//! call to a [`Worker`] instead. The worker processes tasks sequentially on a
//! single named thread fed by a bounded queue, which also gives the "one
//! model-update actor per instance" scheduling the engines are designed for.
//!
//! # Example
//!
//! ```no_run
//! use evidence_lattice_core::worker::Worker;
//!
//! let worker = Worker::<usize>::new().unwrap();
//!
//! worker.on_result().connect(|count| {
//!     println!("refresh produced {count} nodes");
//! });
//!
//! worker.send(|| 42).unwrap();
//! worker.stop_and_join();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::WorkerError;
use crate::logging::targets;
use crate::signal::Signal;

/// Default capacity for the worker's task queue.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for creating a Worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name for the worker thread.
    pub name: String,
    /// Stack size for the worker thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the task queue.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "evidence-worker".to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating Workers with custom configuration.
#[derive(Debug, Default)]
pub struct WorkerBuilder {
    config: WorkerConfig,
}

impl WorkerBuilder {
    /// Create a new WorkerBuilder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the task queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Build and start the worker.
    pub fn build<T: Send + 'static>(self) -> Result<Worker<T>, WorkerError> {
        Worker::with_config(self.config)
    }
}

/// State shared between the Worker handle and the worker thread.
struct WorkerState {
    running: AtomicBool,
    pending_tasks: AtomicUsize,
}

enum WorkerTask<T> {
    /// Execute a task and emit the result via the signal.
    Execute(Box<dyn FnOnce() -> T + Send>),
    /// Execute a task and hand the result to a callback on the worker thread.
    ExecuteWithCallback {
        task: Box<dyn FnOnce() -> T + Send>,
        callback: Box<dyn FnOnce(T) + Send>,
    },
    Shutdown,
}

/// A dedicated worker thread with its own task queue.
///
/// Tasks run one at a time, in submission order. Results are delivered via
/// the [`on_result`](Self::on_result) signal or a per-task callback; both run
/// on the worker thread.
pub struct Worker<T: Send + 'static> {
    task_sender: Sender<WorkerTask<T>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<WorkerState>,
    result_signal: Arc<Signal<T>>,
}

impl<T: Send + 'static> Worker<T> {
    /// Create a new worker with default configuration.
    ///
    /// The worker thread starts immediately.
    pub fn new() -> Result<Self, WorkerError> {
        Self::with_config(WorkerConfig::default())
    }

    /// Create a new worker with custom configuration.
    pub fn with_config(config: WorkerConfig) -> Result<Self, WorkerError> {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let state = Arc::new(WorkerState {
            running: AtomicBool::new(true),
            pending_tasks: AtomicUsize::new(0),
        });
        let result_signal = Arc::new(Signal::new());

        let thread_state = state.clone();
        let thread_signal = result_signal.clone();
        let name = config.name.clone();

        let mut builder = thread::Builder::new().name(config.name);
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder
            .spawn(move || {
                worker_loop(receiver, &thread_state, &thread_signal);
                thread_state.running.store(false, Ordering::Release);
            })
            .map_err(WorkerError::Spawn)?;

        tracing::debug!(target: targets::WORKER, worker = %name, "worker started");

        Ok(Self {
            task_sender: sender,
            handle: Mutex::new(Some(handle)),
            state,
            result_signal,
        })
    }

    /// Check if the worker still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Get the number of queued or executing tasks.
    pub fn pending_tasks(&self) -> usize {
        self.state.pending_tasks.load(Ordering::Acquire)
    }

    /// Get a reference to the result signal.
    pub fn on_result(&self) -> &Signal<T> {
        &self.result_signal
    }

    /// Queue a task; its result is emitted via [`on_result`](Self::on_result).
    pub fn send<F>(&self, task: F) -> Result<(), WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.enqueue(WorkerTask::Execute(Box::new(task)))
    }

    /// Queue a task whose result goes to `callback` instead of the signal.
    pub fn send_with_callback<F, C>(&self, task: F, callback: C) -> Result<(), WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        self.enqueue(WorkerTask::ExecuteWithCallback {
            task: Box::new(task),
            callback: Box::new(callback),
        })
    }

    /// Queue a task and block until it completes, returning its result.
    ///
    /// Returns `None` if the worker is stopped or the queue is full.
    pub fn send_sync<F>(&self, task: F) -> Option<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_sender, result_receiver) = bounded(1);
        self.send_with_callback(task, move |result| {
            let _ = result_sender.send(result);
        })
        .ok()?;
        result_receiver.recv().ok()
    }

    fn enqueue(&self, task: WorkerTask<T>) -> Result<(), WorkerError> {
        if !self.is_running() {
            return Err(WorkerError::Stopped);
        }

        self.state.pending_tasks.fetch_add(1, Ordering::AcqRel);
        match self.task_sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.state.pending_tasks.fetch_sub(1, Ordering::AcqRel);
                Err(WorkerError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.state.pending_tasks.fetch_sub(1, Ordering::AcqRel);
                Err(WorkerError::Stopped)
            }
        }
    }

    /// Stop accepting tasks. Tasks already queued still run.
    ///
    /// Non-blocking with respect to queued work; use [`join`](Self::join) to
    /// wait for the thread to exit.
    pub fn stop(&self) {
        if self.state.running.swap(false, Ordering::AcqRel) {
            // Blocks only while the queue is full; the worker is draining it.
            let _ = self.task_sender.send(WorkerTask::Shutdown);
        }
    }

    /// Wait for the worker thread to finish.
    ///
    /// Returns `false` if already joined or the thread panicked.
    pub fn join(&self) -> bool {
        let handle = self.handle.lock().take();
        match handle {
            Some(h) => h.join().is_ok(),
            None => false,
        }
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl<T: Send + 'static> Drop for Worker<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_task<T: Send + 'static>(task: WorkerTask<T>, state: &WorkerState, signal: &Signal<T>) {
    match task {
        WorkerTask::Execute(task) => {
            let result = task();
            signal.emit(result);
        }
        WorkerTask::ExecuteWithCallback { task, callback } => {
            let result = task();
            callback(result);
        }
        WorkerTask::Shutdown => return,
    }
    state.pending_tasks.fetch_sub(1, Ordering::AcqRel);
}

fn worker_loop<T: Send + 'static>(
    receiver: Receiver<WorkerTask<T>>,
    state: &WorkerState,
    signal: &Signal<T>,
) {
    while let Ok(task) = receiver.recv() {
        if matches!(task, WorkerTask::Shutdown) {
            // Drain whatever was queued before the shutdown request.
            while let Ok(task) = receiver.try_recv() {
                run_task(task, state, signal);
            }
            break;
        }
        run_task(task, state, signal);
    }
    tracing::debug!(target: targets::WORKER, "worker loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;
    use std::time::Duration;

    #[test]
    fn test_worker_creation() {
        let worker = Worker::<i32>::new().unwrap();
        assert!(worker.is_running());
        assert_eq!(worker.pending_tasks(), 0);
        assert!(worker.stop_and_join());
        assert!(!worker.is_running());
    }

    #[test]
    fn test_worker_with_config() {
        let worker = WorkerBuilder::new()
            .name("test-worker")
            .queue_capacity(64)
            .build::<i32>()
            .unwrap();

        let name = worker.send_sync(|| {
            thread::current().name().map(str::to_string).unwrap_or_default().len() as i32
        });
        assert_eq!(name, Some("test-worker".len() as i32));
        worker.stop_and_join();
    }

    #[test]
    fn test_worker_runs_with_subscriber_installed() {
        // Another test may have installed one already.
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init();

        let worker = WorkerBuilder::new().name("traced-worker").build::<i32>().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        worker.on_result().connect(move |&value| {
            received_clone.lock().push(value);
        });

        worker.send(|| 1).unwrap();
        worker.stop_and_join();
        assert_eq!(*received.lock(), vec![1]);
    }

    #[test]
    fn test_send_and_receive() {
        let worker = Worker::<i32>::new().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        worker.on_result().connect(move |&value| {
            received_clone.lock().push(value);
        });

        worker.send(|| 42).unwrap();
        worker.send(|| 100).unwrap();
        worker.stop_and_join();

        assert_eq!(*received.lock(), vec![42, 100]);
    }

    #[test]
    fn test_send_with_callback() {
        let worker = Worker::<String>::new().unwrap();
        let received = Arc::new(Mutex::new(None));

        let received_clone = received.clone();
        worker
            .send_with_callback(
                || "hello".to_string(),
                move |result| {
                    *received_clone.lock() = Some(result);
                },
            )
            .unwrap();
        worker.stop_and_join();

        assert_eq!(*received.lock(), Some("hello".to_string()));
    }

    #[test]
    fn test_graceful_shutdown_drains_queue() {
        let worker = Worker::<i32>::new().unwrap();
        let counter = Arc::new(AtomicI32::new(0));

        for _ in 0..5 {
            let counter_clone = counter.clone();
            worker
                .send(move || {
                    thread::sleep(Duration::from_millis(5));
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                    1
                })
                .unwrap();
        }

        worker.stop();
        worker.join();

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(worker.pending_tasks(), 0);
    }

    #[test]
    fn test_send_after_stop() {
        let worker = Worker::<i32>::new().unwrap();
        worker.stop();

        assert!(matches!(worker.send(|| 42), Err(WorkerError::Stopped)));
        assert!(worker.send_sync(|| 42).is_none());
        worker.join();
    }

    #[test]
    fn test_sequential_processing() {
        let worker = Worker::<i32>::new().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order_clone = order.clone();
            worker
                .send(move || {
                    order_clone.lock().push(i);
                    i
                })
                .unwrap();
        }
        worker.stop_and_join();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_send_sync() {
        let worker = Worker::<i32>::new().unwrap();

        let result = worker.send_sync(|| {
            thread::sleep(Duration::from_millis(10));
            42
        });

        assert_eq!(result, Some(42));
        worker.stop_and_join();
    }

    #[test]
    fn test_multiple_senders() {
        let worker = Arc::new(Worker::<i32>::new().unwrap());
        let counter = Arc::new(AtomicI32::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let w = worker.clone();
            let c = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10 {
                    let c2 = c.clone();
                    w.send(move || {
                        c2.fetch_add(1, Ordering::SeqCst);
                        1
                    })
                    .unwrap();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        worker.stop_and_join();

        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
