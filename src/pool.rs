use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServiceError};

/// Bounded pool for background work.
///
/// Every task handle stays in the pool until [`WorkerPool::shutdown`] joins it.
/// At most `size` tasks run at once; the rest wait for a permit.
#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    inner: Mutex<PoolInner>,
}

#[derive(Debug, Default)]
struct PoolInner {
    closed: bool,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            inner: Mutex::new(PoolInner::default()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Queue a task. Fails once the pool is shut down.
    pub fn spawn<F>(&self, name: &'static str, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ServiceError::component(
                "worker_pool",
                "pool is shut down and no longer accepts work",
            ));
        }

        let permits = Arc::clone(&self.permits);
        inner.tasks.spawn(async move {
            // A closed semaphore means shutdown started before this task got a slot
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!("Background task '{}' dropped before it started", name);
                return;
            };

            debug!("Background task '{}' started", name);
            task.await;
            debug!("Background task '{}' finished", name);
        });

        Ok(())
    }

    /// Stop accepting work and wait for queued and running tasks.
    ///
    /// Tasks are expected to observe the shutdown token on their own. Whatever
    /// is still running after `timeout` is aborted.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let mut tasks = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.tasks)
        };
        self.permits.close();

        info!("Waiting for {} background task(s) to finish", tasks.len());
        let drained = tokio::time::timeout(timeout, Self::drain(&mut tasks)).await;

        match drained {
            Ok(()) => {
                info!("Worker pool shut down");
                Ok(())
            }
            Err(_) => {
                warn!(
                    "{} background task(s) still running after {:?}, aborting",
                    tasks.len(),
                    timeout
                );
                tasks.shutdown().await;
                Err(ServiceError::system(format!(
                    "worker pool did not drain within {:?}",
                    timeout
                )))
            }
        }
    }

    async fn drain(tasks: &mut JoinSet<()>) {
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("Background task panicked: {}", e);
                }
            }
        }
    }
}
