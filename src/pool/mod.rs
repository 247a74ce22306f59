//! Fixed-size worker pool
//!
//! A small thread pool the resolver owns: jobs are queued with
//! [`WorkerPool::execute`] and picked up by a fixed set of worker threads.
//! Dropping the pool closes the queue and joins every worker, so an owner
//! going out of scope cannot leak scanning threads.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    sender: Option<mpsc::Sender<Job>>,
}

impl WorkerPool {
    /// Spawn a pool of `threads` workers. `threads` must be non-zero.
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "worker pool needs at least one thread");

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..threads)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || loop {
                    // Holding the lock only for the dequeue keeps the other
                    // workers runnable while this job executes.
                    let job = receiver.lock().recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })
            })
            .collect();

        Self {
            workers,
            sender: Some(sender),
        }
    }

    /// Queue a job for execution on some worker thread.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            // Send only fails when every worker is gone, which cannot
            // happen while the pool is alive; a lost job is the best we
            // could do then anyway.
            let _ = sender.send(Box::new(job));
        }
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
