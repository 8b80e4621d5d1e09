//! Fixed-size worker pool with non-blocking admission.
//!
//! # Responsibilities
//! - Spawn `count` named OS threads once, at server start
//! - Admit a job only if a worker slot is free; otherwise hand it back
//! - Return the slot when the job finishes, even if it panics
//!
//! # Design Decisions
//! - Admission is a `Semaphore::try_acquire_owned`; the permit travels with
//!   the queued job and is dropped by the worker after `run` returns
//! - Slots == workers, so an admitted job never waits behind another
//! - The queue is an unbounded crossbeam channel; the semaphore bounds it

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::WorkerConfig;
use crate::observability::metrics;
use crate::worker::context::DispatchContext;

/// Unit of work executed on a worker thread.
pub trait Job: Send + 'static {
    fn run(self: Box<Self>, context: DispatchContext);
}

/// Why a job was handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Every worker slot is taken.
    Saturated,
    /// No worker is left to take jobs from the queue.
    Stopped,
}

/// Returned by [`WorkerPool::submit`] when the job cannot run. Carries the
/// job back so the caller can still answer the request.
#[derive(Error)]
#[error("{}", describe(.reason, .capacity))]
pub struct Rejected<J> {
    pub job: J,
    pub capacity: usize,
    pub reason: RejectReason,
}

fn describe(reason: &RejectReason, capacity: &usize) -> String {
    match reason {
        RejectReason::Saturated => format!("all {capacity} workers are busy"),
        RejectReason::Stopped => "worker queue is disconnected".to_string(),
    }
}

impl<J> std::fmt::Debug for Rejected<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("capacity", &self.capacity)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<J> Rejected<J> {
    pub fn into_job(self) -> J {
        self.job
    }
}

/// Object-safe view of a [`Job`] that can also be recovered as its
/// concrete type when the queue refuses it.
trait QueuedJob: Send {
    fn run(self: Box<Self>, context: DispatchContext);
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<J: Job> QueuedJob for J {
    fn run(self: Box<Self>, context: DispatchContext) {
        Job::run(self, context);
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

struct Queued {
    job: Box<dyn QueuedJob>,
    permit: OwnedSemaphorePermit,
}

pub struct WorkerPool {
    slots: Arc<Semaphore>,
    queue: Sender<Queued>,
    busy: Arc<AtomicUsize>,
    capacity: usize,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the worker threads.
    pub fn start(config: &WorkerConfig) -> std::io::Result<Self> {
        let capacity = config.count.max(1);
        let (queue, jobs) = channel::unbounded::<Queued>();
        let busy = Arc::new(AtomicUsize::new(0));

        let mut threads = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let jobs = jobs.clone();
            let busy = Arc::clone(&busy);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || worker_loop(index, jobs, busy))?;
            threads.push(handle);
        }

        tracing::info!(
            workers = capacity,
            prefix = %config.thread_name_prefix,
            "Worker pool started"
        );

        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
            queue,
            busy,
            capacity,
            threads,
        })
    }

    /// Admit `job` if a slot is free. Never blocks.
    pub fn submit<J: Job>(&self, job: J) -> Result<(), Rejected<J>> {
        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::record_worker_rejection();
                tracing::warn!(capacity = self.capacity, "Worker pool saturated, rejecting job");
                return Err(Rejected {
                    job,
                    capacity: self.capacity,
                    reason: RejectReason::Saturated,
                });
            }
        };

        let queued = Queued {
            job: Box::new(job),
            permit,
        };
        let Err(channel::SendError(Queued { job, permit })) = self.queue.send(queued) else {
            return Ok(());
        };
        drop(permit);
        metrics::record_worker_rejection();
        tracing::error!(capacity = self.capacity, "Worker queue disconnected, rejecting job");
        match job.into_any().downcast::<J>() {
            Ok(job) => Err(Rejected {
                job: *job,
                capacity: self.capacity,
                reason: RejectReason::Stopped,
            }),
            Err(_) => unreachable!("queued job changed type"),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free for admission.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Jobs currently executing.
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("busy", &self.busy())
            .finish()
    }
}

fn worker_loop(index: usize, jobs: Receiver<Queued>, busy: Arc<AtomicUsize>) {
    tracing::debug!(worker = index, "Worker started");

    while let Ok(Queued { job, permit }) = jobs.recv() {
        metrics::set_workers_busy(busy.fetch_add(1, Ordering::SeqCst) + 1);

        let outcome = catch_unwind(AssertUnwindSafe(|| job.run(DispatchContext::worker(index))));
        if outcome.is_err() {
            tracing::error!(worker = index, "Job panicked; worker continues");
        }

        metrics::set_workers_busy(busy.fetch_sub(1, Ordering::SeqCst) - 1);
        drop(permit);
    }

    tracing::debug!(worker = index, "Worker stopped");
}
