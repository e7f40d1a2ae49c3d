//! Worker pool for task execution.
//!
//! This module provides a thread pool of workers that execute boxed task
//! closures from a shared queue. The queue discipline is configurable:
//! FIFO runs tasks in submission order, LIFO runs the most recently
//! submitted first (useful when the newest requests are the ones the user
//! is looking at).

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Condvar, Mutex,
};
use std::thread::{self, JoinHandle};

/// A unit of work for the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Order in which queued tasks are handed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDiscipline {
    /// Oldest submission first.
    Fifo,
    /// Newest submission first.
    Lifo,
}

/// Configuration for a worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Name prefix for worker threads (workers get `-0`, `-1`, ... suffixes).
    pub name: String,

    /// Number of worker threads to spawn.
    pub num_workers: usize,

    /// Order in which queued tasks are executed.
    pub discipline: QueueDiscipline,
}

impl WorkerPoolConfig {
    /// Create a new worker pool configuration with FIFO ordering.
    pub fn new(name: impl Into<String>, num_workers: usize) -> Self {
        Self {
            name: name.into(),
            num_workers,
            discipline: QueueDiscipline::Fifo,
        }
    }

    /// Set the queue discipline.
    pub fn with_discipline(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;
        self
    }
}

struct Queue {
    tasks: Mutex<VecDeque<Task>>,
    available: Condvar,
}

/// Worker pool executing boxed closures from a shared queue.
///
/// Workers block on the queue rather than polling. Shutdown is graceful:
/// in-flight tasks finish, queued tasks that have not started are dropped.
///
/// # Example
///
/// ```
/// use pixload_scheduler::{WorkerPool, WorkerPoolConfig};
///
/// let pool = WorkerPool::new(WorkerPoolConfig::new("example", 2));
/// pool.submit(Box::new(|| {
///     // ... do work ...
/// }));
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    workers: Vec<Worker>,
    queue: Arc<Queue>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create and start a new worker pool.
    pub fn new(config: WorkerPoolConfig) -> Self {
        let queue = Arc::new(Queue {
            tasks: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        });
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.num_workers);
        for id in 0..config.num_workers {
            workers.push(Worker::new(
                format!("{}-{}", config.name, id),
                queue.clone(),
                shutdown.clone(),
                config.discipline,
            ));
        }

        Self {
            workers,
            queue,
            shutdown,
        }
    }

    /// Submit a task for execution.
    ///
    /// Submissions after shutdown are dropped silently.
    pub fn submit(&self, task: Task) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }
        let mut tasks = self.queue.tasks.lock().unwrap();
        tasks.push_back(task);
        self.queue.available.notify_one();
    }

    /// Number of tasks waiting in the queue (not counting in-flight ones).
    pub fn queued(&self) -> usize {
        self.queue.tasks.lock().unwrap().len()
    }

    /// Get the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Check if the worker pool is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Drop all queued tasks that have not started executing.
    pub fn clear_queue(&self) {
        let mut tasks = self.queue.tasks.lock().unwrap();
        tasks.clear();
    }

    /// Shutdown the worker pool gracefully.
    ///
    /// Signals all workers to stop, drops queued tasks, and blocks until
    /// every worker has finished its current task and exited.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        self.clear_queue();
        self.queue.available.notify_all();

        for worker in self.workers {
            worker.join();
        }
    }
}

/// A single worker thread in the worker pool.
struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(
        name: String,
        queue: Arc<Queue>,
        shutdown: Arc<AtomicBool>,
        discipline: QueueDiscipline,
    ) -> Self {
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || {
                Self::run(queue, shutdown, discipline);
            })
            .expect("Failed to spawn worker thread");

        Self {
            thread: Some(thread),
        }
    }

    /// Main worker loop: block until a task is available or shutdown is
    /// signalled, then execute the task chosen by the queue discipline.
    fn run(queue: Arc<Queue>, shutdown: Arc<AtomicBool>, discipline: QueueDiscipline) {
        loop {
            let task = {
                let mut tasks = queue.tasks.lock().unwrap();
                loop {
                    if shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    let next = match discipline {
                        QueueDiscipline::Fifo => tasks.pop_front(),
                        QueueDiscipline::Lifo => tasks.pop_back(),
                    };
                    match next {
                        Some(task) => break task,
                        None => tasks = queue.available.wait(tasks).unwrap(),
                    }
                }
            };

            task();
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("Worker thread panicked");
        }
    }
}
