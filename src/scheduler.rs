//! The task scheduler: a bounded worker pool with a FIFO queue.
//!
//! A task is pure compute with a one-shot completion signal. `request`
//! enqueues and wakes an idle worker; `get` blocks until the task has run
//! and is idempotent afterwards. With zero threads the pool degrades to
//! synchronous execution on the requesting thread. There is no
//! cancellation: shutdown drains by dropping the queue and joining every
//! worker.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

// ============================================================================
// Task
// ============================================================================

/// Pure compute run by a worker. `tid` is the worker index, used to pick
/// the worker's scratch slot.
pub trait Task: Send + 'static {
    fn run(&mut self, tid: usize);
}

/// A task paired with its one-shot completion signal. Shared between the
/// owner (who calls `get` and reads results) and the queue.
pub struct TaskCell<T: ?Sized> {
    done: Mutex<bool>,
    cond: Condvar,
    task: Mutex<T>,
}

impl<T: Task> TaskCell<T> {
    pub fn new(task: T) -> Arc<Self> {
        Arc::new(Self {
            done: Mutex::new(false),
            cond: Condvar::new(),
            task: Mutex::new(task),
        })
    }

    /// Block until the task has completed. Returns immediately if it
    /// already has.
    pub fn get(&self) {
        let mut done = self.done.lock().unwrap_or_else(|e| e.into_inner());
        while !*done {
            done = self.cond.wait(done).unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn is_done(&self) -> bool {
        *self.done.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Access the task state; callers synchronize via `get` first.
    pub fn lock(&self) -> std::sync::MutexGuard<'_, T> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-arm for another round through the queue.
    pub fn rearm(&self) {
        *self.done.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

/// Object-safe execution hook the queue stores.
trait Runnable: Send + Sync {
    fn execute(&self, tid: usize);
}

impl<T: Task> Runnable for TaskCell<T> {
    fn execute(&self, tid: usize) {
        self.lock().run(tid);
        let mut done = self.done.lock().unwrap_or_else(|e| e.into_inner());
        *done = true;
        self.cond.notify_all();
    }
}

// ============================================================================
// TaskScheduler
// ============================================================================

/// Worker pool. Tasks queue FIFO; each worker drains the shared queue
/// until the scheduler shuts down.
pub struct TaskScheduler {
    sender: Option<Sender<Arc<dyn Runnable>>>,
    workers: Vec<JoinHandle<()>>,
    threads: usize,
}

impl TaskScheduler {
    /// Spin up `threads` workers; zero means synchronous execution.
    pub fn new(threads: usize) -> Self {
        if threads == 0 {
            return Self {
                sender: None,
                workers: Vec::new(),
                threads: 0,
            };
        }

        log::info!("scheduler: starting {} worker(s)", threads);
        let (sender, receiver) = channel::<Arc<dyn Runnable>>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..threads)
            .map(|tid| {
                let receiver: Arc<Mutex<Receiver<Arc<dyn Runnable>>>> = Arc::clone(&receiver);
                std::thread::Builder::new()
                    .name(format!("softvg-worker-{}", tid))
                    .spawn(move || loop {
                        let msg = {
                            let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
                            guard.recv()
                        };
                        match msg {
                            Ok(task) => task.execute(tid),
                            Err(_) => break,
                        }
                    })
                    .expect("spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            threads,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }

    /// Enqueue a task. With no workers it runs inline on the caller's
    /// thread (worker index 0) before returning.
    pub fn request<T: Task>(&self, task: &Arc<TaskCell<T>>) {
        task.rearm();
        match &self.sender {
            Some(sender) => {
                let cell: Arc<dyn Runnable> = Arc::clone(task) as Arc<dyn Runnable>;
                if sender.send(cell).is_err() {
                    // Queue torn down: degrade to inline execution.
                    task.execute(0);
                }
            }
            None => task.execute(0),
        }
    }
}

impl Drop for TaskScheduler {
    /// Barrier-synchronous shutdown: close the queue, join every worker.
    fn drop(&mut self) {
        self.sender.take();
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Sum {
        input: Vec<u64>,
        output: u64,
        tid_seen: usize,
    }

    impl Task for Sum {
        fn run(&mut self, tid: usize) {
            self.output = self.input.iter().sum();
            self.tid_seen = tid;
        }
    }

    #[test]
    fn test_synchronous_mode_runs_inline() {
        let scheduler = TaskScheduler::new(0);
        let task = TaskCell::new(Sum {
            input: vec![1, 2, 3],
            output: 0,
            tid_seen: 99,
        });
        scheduler.request(&task);
        // no get() needed: already complete
        assert!(task.is_done());
        assert_eq!(task.lock().output, 6);
        assert_eq!(task.lock().tid_seen, 0);
    }

    #[test]
    fn test_parallel_execution_and_get() {
        let scheduler = TaskScheduler::new(2);
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                TaskCell::new(Sum {
                    input: vec![i, i, i],
                    output: 0,
                    tid_seen: 0,
                })
            })
            .collect();
        for t in &tasks {
            scheduler.request(t);
        }
        for (i, t) in tasks.iter().enumerate() {
            t.get();
            assert_eq!(t.lock().output, 3 * i as u64);
        }
    }

    #[test]
    fn test_get_is_idempotent() {
        let scheduler = TaskScheduler::new(1);
        let task = TaskCell::new(Sum {
            input: vec![5],
            output: 0,
            tid_seen: 0,
        });
        scheduler.request(&task);
        task.get();
        task.get();
        assert_eq!(task.lock().output, 5);
    }

    struct Slow(Arc<AtomicUsize>);

    impl Task for Slow {
        fn run(&mut self, _tid: usize) {
            std::thread::sleep(Duration::from_millis(10));
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_shutdown_joins_all_pending() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..4)
            .map(|_| TaskCell::new(Slow(Arc::clone(&counter))))
            .collect();
        {
            let scheduler = TaskScheduler::new(2);
            for t in &tasks {
                scheduler.request(t);
            }
            // scheduler dropped here: must run everything to completion
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        for t in &tasks {
            assert!(t.is_done());
        }
    }

    #[test]
    fn test_rearm_allows_reuse() {
        let scheduler = TaskScheduler::new(1);
        let task = TaskCell::new(Sum {
            input: vec![1],
            output: 0,
            tid_seen: 0,
        });
        scheduler.request(&task);
        task.get();
        task.lock().input = vec![2, 2];
        scheduler.request(&task);
        task.get();
        assert_eq!(task.lock().output, 4);
    }

    #[test]
    fn test_worker_indices_in_range() {
        let scheduler = TaskScheduler::new(3);
        let tasks: Vec<_> = (0..12)
            .map(|_| {
                TaskCell::new(Sum {
                    input: vec![1],
                    output: 0,
                    tid_seen: 777,
                })
            })
            .collect();
        for t in &tasks {
            scheduler.request(t);
        }
        for t in &tasks {
            t.get();
            assert!(t.lock().tid_seen < 3);
        }
    }
}
