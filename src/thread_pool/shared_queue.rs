use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error};

use super::ThreadPool;
use crate::error::panic_message;
use crate::{ParError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool using a shared job queue.
///
/// Workers pull jobs from a single unbounded MPMC channel. A panicking job
/// is logged and the worker keeps serving the queue. Closing the pool drops
/// the sending side: workers drain what is already queued, then exit and
/// are joined.
pub struct SharedQueueThreadPool {
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(ParError::InvalidThreadCount(threads));
        }
        let (tx, rx) = channel::unbounded::<Job>();

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            match spawn_worker(id, rx.clone()) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Dropping the sender stops the workers started so far.
                    drop(tx);
                    join_workers(workers);
                    return Err(e);
                }
            }
        }
        debug!("Started shared queue pool with {threads} workers");

        Ok(SharedQueueThreadPool {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.send(Box::new(job)).map_err(|_| ParError::PoolClosed),
            None => Err(ParError::PoolClosed),
        }
    }

    fn close(&self) {
        if self.tx.lock().unwrap().take().is_none() {
            return;
        }
        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        debug!("Closing pool, joining {} workers", workers.len());
        join_workers(workers);
    }

    fn is_closed(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }
}

/// Spawns a single worker thread that pulls jobs from the receiver
/// until the channel is closed and drained.
fn spawn_worker(id: usize, rx: Receiver<Job>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("pool-worker-{id}"))
        .spawn(move || {
            while let Ok(job) = rx.recv() {
                debug!("Worker {id} executing job");
                if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
                    error!(
                        "Worker {id} job panicked, continuing: {}",
                        panic_message(&*payload)
                    );
                }
            }
            debug!("Worker {id}: channel closed, shutting down");
        })?;
    Ok(handle)
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    let current = thread::current().id();
    for worker in workers {
        let name = worker.thread().name().unwrap_or("pool-worker").to_owned();
        // Closing from inside a job: this worker exits once the job returns.
        if worker.thread().id() == current {
            debug!("{name} closed its own pool, not joining itself");
            continue;
        }
        if worker.join().is_err() {
            error!("{name} terminated abnormally");
        }
    }
}

impl Drop for SharedQueueThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}
