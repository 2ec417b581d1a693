use std::sync::RwLock;

use crossbeam::channel::{self, Receiver};
use log::{debug, error};

use super::ThreadPool;
use crate::error::panic_message;
use crate::{ParError, Result};

/// A thread pool backed by the `rayon` library.
///
/// Every rayon worker reports its exit on a channel, so closing the pool
/// can wait until queued jobs are done and each worker has terminated.
pub struct RayonThreadPool {
    pool: RwLock<Option<rayon::ThreadPool>>,
    threads: usize,
    exited: Receiver<usize>,
}

impl ThreadPool for RayonThreadPool {
    fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(ParError::InvalidThreadCount(threads));
        }
        let (exit_tx, exited) = channel::unbounded();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|id| format!("rayon-worker-{id}"))
            // Rayon aborts on a panicking spawned job unless a handler is set.
            .panic_handler(|payload| error!("Rayon job panicked: {}", panic_message(&*payload)))
            .exit_handler(move |id| {
                let _ = exit_tx.send(id);
            })
            .build()
            .map_err(|e| ParError::StringError(e.to_string()))?;
        Ok(RayonThreadPool {
            pool: RwLock::new(Some(pool)),
            threads,
            exited,
        })
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.pool.read().unwrap().as_ref() {
            Some(pool) => {
                pool.spawn(job);
                Ok(())
            }
            None => Err(ParError::PoolClosed),
        }
    }

    fn close(&self) {
        let Some(pool) = self.pool.write().unwrap().take() else {
            return;
        };
        // A worker of this pool cannot wait for itself to exit.
        let inside = pool.current_thread_index().is_some();
        drop(pool);
        if inside {
            debug!("Rayon pool closed from one of its own workers");
            return;
        }
        for _ in 0..self.threads {
            match self.exited.recv() {
                Ok(id) => debug!("Rayon worker {id} exited"),
                Err(_) => break,
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.pool.read().unwrap().is_none()
    }
}

impl Drop for RayonThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}
