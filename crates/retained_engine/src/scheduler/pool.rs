//! Worker thread pool
//!
//! Fixed set of workers pulling boxed jobs from a shared crossbeam channel.
//! Dropping the pool closes the channel and joins every worker once the
//! queued jobs have run.

use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::scheduler::SchedulerError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Simple thread pool for background work
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl ThreadPool {
    /// Spawn `size` named workers
    pub fn new(name: &str, size: usize) -> Result<Self, SchedulerError> {
        let (sender, receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::spawn(format!("{name}-{id}"), receiver.clone())?);
        }

        log::debug!("Started {} worker(s) for {}", size, name);
        Ok(Self {
            workers,
            sender: Some(sender),
        })
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job
    pub fn execute<F>(&self, job: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(SchedulerError::PoolClosed)?;
        sender.send(Box::new(job)).map_err(|_| SchedulerError::PoolClosed)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.thread.join().is_err() {
                log::error!("Worker {} panicked", worker.name);
            }
        }
    }
}

struct Worker {
    name: String,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn spawn(name: String, receiver: Receiver<Job>) -> Result<Self, SchedulerError> {
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .map_err(|err| SchedulerError::Spawn(err.to_string()))?;

        Ok(Self { name, thread })
    }
}
