use std::{
    collections::VecDeque,
    net::TcpStream,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread::JoinHandle,
    time::Duration,
};

use crate::{
    connection::{self, Responder},
    framework::Shutdown,
    routing::{Dispatcher, Incoming},
};

pub const DEFAULT_WORKERS: usize = 8;

/// A request waiting for a worker, along with where its response should be written.
pub struct RequestTask {
    pub request: Incoming,
    pub responder: Box<dyn Responder>,
}

/// An accepted connection whose request head has not been read yet.
pub struct ConnectionTask {
    pub stream: TcpStream,
    pub timeout: Option<Duration>,
    pub shutdown: Shutdown,
}

struct Shared<Task> {
    /// Tasks that need to be run
    pool: Mutex<VecDeque<Task>>,

    /// Wakes workers when a task is queued or the pool shuts down
    available: Condvar,

    /// Wakes producers blocked on a full queue
    space: Condvar,

    bound: Option<usize>,

    shutdown: AtomicBool,

    /// Total number of workers currently waiting for a task
    waiting: AtomicUsize,
}

impl<Task> Shared<Task> {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        // Tasks run outside the lock, so a poisoned queue is still consistent.
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Block until a task is available. Returns `None` once shutdown is observed.
    fn next(&self) -> Option<Task> {
        let mut pool = self.lock();

        loop {
            if self.is_shutdown() {
                return None;
            }

            if let Some(task) = pool.pop_front() {
                drop(pool);

                self.space.notify_one();

                return Some(task);
            }

            self.waiting.fetch_add(1, Ordering::Release);

            pool = self
                .available
                .wait(pool)
                .unwrap_or_else(PoisonError::into_inner);

            self.waiting.fetch_sub(1, Ordering::Release);
        }
    }
}

/// A fixed size pool of worker threads fed by a shared queue.
pub struct TaskPool<Task> {
    shared: Arc<Shared<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl<Task> TaskPool<Task>
where
    Task: 'static + Send,
{
    /// Spawns `workers` threads, each running `handler` on every task it dequeues. With a
    /// `bound`, `send_task` blocks while that many tasks are queued.
    pub fn new<F>(workers: usize, bound: Option<usize>, handler: F) -> Self
    where
        F: Fn(Task) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            pool: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            space: Condvar::new(),
            bound: bound.map(|b| b.max(1)),
            shutdown: AtomicBool::new(false),
            waiting: AtomicUsize::new(0),
        });

        let handler = Arc::new(handler);

        let workers = (0..workers.max(1))
            .map(|id| {
                let shared = shared.clone();
                let handler = handler.clone();

                std::thread::spawn(move || {
                    tracing::debug!(worker = id, "Worker started");

                    while let Some(task) = shared.next() {
                        handler(task);
                    }

                    tracing::debug!(worker = id, "Worker exiting");
                })
            })
            .collect();

        Self { shared, workers }
    }

    /// Queue a task. Returns the task back if the pool has been shut down.
    pub fn send_task(&self, task: Task) -> Result<(), Task> {
        let mut pool = self.shared.lock();

        if let Some(bound) = self.shared.bound {
            while pool.len() >= bound && !self.shared.is_shutdown() {
                pool = self
                    .shared
                    .space
                    .wait(pool)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        if self.shared.is_shutdown() {
            return Err(task);
        }

        pool.push_back(task);

        drop(pool);

        self.shared.available.notify_one();

        Ok(())
    }

    /// Number of tasks waiting for a worker
    pub fn queued(&self) -> usize {
        self.shared.lock().len()
    }

    /// Number of workers blocked waiting for a task
    pub fn idle(&self) -> usize {
        self.shared.waiting.load(Ordering::Acquire)
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Signal every worker to stop. Tasks already running are allowed to finish; queued tasks
    /// are dropped.
    pub fn signal_shutdown(&self) {
        // The flag is flipped under the lock so no worker can miss the wakeup between checking
        // it and waiting.
        let pool = self.shared.lock();

        self.shared.shutdown.store(true, Ordering::Release);

        drop(pool);

        self.shared.available.notify_all();
        self.shared.space.notify_all();
    }

    /// Signal shutdown and wait for every worker to exit
    pub fn shutdown(mut self) {
        self.signal_shutdown();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        self.shared.lock().clear();
    }
}

impl<Task> Drop for TaskPool<Task> {
    fn drop(&mut self) {
        let pool = self.shared.pool.lock().unwrap_or_else(PoisonError::into_inner);

        self.shared.shutdown.store(true, Ordering::Release);

        drop(pool);

        self.shared.available.notify_all();
        self.shared.space.notify_all();
    }
}

/// Create the pool that reads, dispatches and answers accepted connections.
pub fn connection_pool<T>(
    workers: usize,
    bound: Option<usize>,
    dispatcher: Arc<Dispatcher<T>>,
) -> TaskPool<ConnectionTask>
where
    T: 'static + Send + Sync,
{
    TaskPool::new(workers, bound, move |task| handle_connection(&dispatcher, task))
}

fn handle_connection<T>(dispatcher: &Dispatcher<T>, task: ConnectionTask) {
    let ConnectionTask {
        stream,
        timeout,
        shutdown,
    } = task;

    match connection::read_request(stream, timeout, &shutdown) {
        Ok((request, writer)) => handle_request(
            dispatcher,
            RequestTask {
                request,
                responder: Box::new(writer),
            },
        ),
        Err(e) => tracing::warn!(error = %e, "Dropping unreadable request"),
    }
}

fn handle_request<T>(dispatcher: &Dispatcher<T>, task: RequestTask) {
    let RequestTask { request, responder } = task;

    let response = dispatcher.dispatch(&request);

    tracing::debug!(
        method = %request.method,
        path = %request.path,
        status = response.status(),
        "Handled request"
    );

    if let Err(e) = responder.respond(response) {
        tracing::error!(path = %request.path, error = %e, "Failed to write response");
    }
}
