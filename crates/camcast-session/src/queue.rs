//! Serialized device context.
//!
//! Every device and mixer mutation of a session runs as a job on one worker
//! thread, so mutations never interleave.

use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{SessionError, SessionResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single worker thread draining a FIFO of jobs.
pub struct DeviceQueue {
    name: String,
    job_tx: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl DeviceQueue {
    /// Spawn the worker thread.
    pub fn spawn(name: impl Into<String>) -> SessionResult<Self> {
        let name = name.into();
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(job_rx))?;
        let worker_id = handle.thread().id();

        debug!(queue = %name, "Device queue started");

        Ok(Self {
            name,
            job_tx: Mutex::new(Some(job_tx)),
            worker: Mutex::new(Some(handle)),
            worker_id,
        })
    }

    /// Queue a job without waiting for it.
    pub fn submit<F>(&self, job: F) -> SessionResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.job_tx.lock();
        let sender = guard.as_ref().ok_or(SessionError::QueueClosed)?;
        sender
            .send(Box::new(job))
            .map_err(|_| SessionError::QueueClosed)
    }

    /// Run a job and wait for its result.
    ///
    /// Called from the worker itself, the job runs inline.
    pub fn run<F, R>(&self, job: F) -> SessionResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        self.submit(move || {
            let _ = result_tx.send(job());
        })?;

        result_rx.recv().map_err(|_| SessionError::QueueClosed)
    }

    /// Returns true when called from the worker thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    pub fn is_closed(&self) -> bool {
        self.job_tx.lock().is_none()
    }

    /// Stop accepting jobs, drain the ones already queued, and join.
    pub fn shutdown(&self) {
        if self.job_tx.lock().take().is_none() {
            return;
        }

        if self.is_current() {
            // The worker exits once its current job returns.
            return;
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!(queue = %self.name, "Device queue worker panicked");
            }
        }
        debug!(queue = %self.name, "Device queue stopped");
    }
}

impl Drop for DeviceQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(job_rx: Receiver<Job>) {
    for job in job_rx.iter() {
        job();
    }
    trace!("Device queue drained");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_jobs_run_in_order() {
        let queue = DeviceQueue::spawn("test-queue").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            queue.submit(move || seen.lock().push(i)).unwrap();
        }
        queue.run(|| ()).unwrap();

        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_returns_value_from_worker() {
        let queue = DeviceQueue::spawn("test-queue").unwrap();

        let name = queue
            .run(|| thread::current().name().map(str::to_string))
            .unwrap();

        assert_eq!(name.as_deref(), Some("test-queue"));
        assert!(!queue.is_current());
    }

    #[test]
    fn test_nested_run_executes_inline() {
        let queue = Arc::new(DeviceQueue::spawn("test-queue").unwrap());
        let inner = Arc::clone(&queue);

        let value = queue.run(move || inner.run(|| 7).unwrap()).unwrap();

        assert_eq!(value, 7);
    }

    #[test]
    fn test_shutdown_drains_then_rejects() {
        let queue = DeviceQueue::spawn("test-queue").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let count = Arc::clone(&count);
            queue
                .submit(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        queue.shutdown();

        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert!(queue.is_closed());
        assert!(matches!(queue.submit(|| ()), Err(SessionError::QueueClosed)));
        assert!(matches!(queue.run(|| 1), Err(SessionError::QueueClosed)));
    }
}
