//! Bounded work queue drained by a fixed set of workers.
//!
//! Descriptors are moved into the queue, so the worker that dequeues one is
//! its only owner until the drain barrier hands it back. Workers keep what
//! they finished and return it when the queue is closed and empty;
//! [`WorkerPool::await_drain`] joins them and restores submission order.

use std::sync::Arc;

use log::debug;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::config;
use crate::device::DeviceDescriptor;
use crate::error::FleetError;
use crate::lifecycle::DeviceLifecycle;

struct Job {
    seq: usize,
    device: DeviceDescriptor,
}

/// FIFO shared by all workers of a pool.
#[derive(Clone)]
struct WorkQueue {
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
}

impl WorkQueue {
    /// Next job, or `None` once the queue is closed and empty.
    async fn next(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }
}

/// A fixed number of workers draining one queue.
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    workers: JoinSet<Vec<Job>>,
    submitted: usize,
    worker_count: usize,
}

impl WorkerPool {
    /// Starts `worker_count` workers, each running `lifecycle` on every
    /// descriptor it dequeues.
    pub fn start<L: DeviceLifecycle>(
        worker_count: usize,
        lifecycle: Arc<L>,
    ) -> Result<Self, FleetError> {
        Self::with_capacity(worker_count, worker_count * 2, lifecycle)
    }

    /// Like [`start`](Self::start) with an explicit queue capacity.
    /// `submit` waits while the queue is full.
    pub fn with_capacity<L: DeviceLifecycle>(
        worker_count: usize,
        capacity: usize,
        lifecycle: Arc<L>,
    ) -> Result<Self, FleetError> {
        let max = config::MAX_THREADS as usize;
        if worker_count == 0 || worker_count > max {
            return Err(FleetError::WorkerCount {
                got: worker_count,
                max,
            });
        }

        let (sender, receiver) = mpsc::channel::<Job>(capacity.max(1));
        let queue = WorkQueue {
            receiver: Arc::new(Mutex::new(receiver)),
        };

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = queue.clone();
            let lifecycle = lifecycle.clone();
            workers.spawn(async move {
                let mut finished = Vec::new();
                while let Some(mut job) = queue.next().await {
                    lifecycle.drive(&mut job.device).await;
                    finished.push(job);
                }
                debug!(
                    "worker {} exiting after {} devices",
                    worker_id,
                    finished.len()
                );
                finished
            });
        }
        debug!("started {} workers", worker_count);

        Ok(Self {
            sender,
            workers,
            submitted: 0,
            worker_count,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Enqueues a descriptor.
    pub async fn submit(&mut self, device: DeviceDescriptor) -> Result<(), FleetError> {
        let job = Job {
            seq: self.submitted,
            device,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| FleetError::QueueClosed)?;
        self.submitted += 1;
        Ok(())
    }

    /// Closes the queue and waits until every submitted descriptor has been
    /// processed. Returns the descriptors in submission order.
    pub async fn await_drain(self) -> Result<Vec<DeviceDescriptor>, FleetError> {
        let WorkerPool {
            sender,
            mut workers,
            submitted,
            ..
        } = self;
        drop(sender);

        let mut finished = Vec::with_capacity(submitted);
        while let Some(joined) = workers.join_next().await {
            let jobs = joined.map_err(|e| FleetError::WorkerPanicked(e.to_string()))?;
            finished.extend(jobs);
        }
        finished.sort_by_key(|job| job.seq);
        debug!("drained {} of {} devices", finished.len(), submitted);

        Ok(finished.into_iter().map(|job| job.device).collect())
    }
}

/// Submits every device to a fresh pool and waits for the drain barrier.
pub async fn run_pool<L: DeviceLifecycle>(
    devices: Vec<DeviceDescriptor>,
    worker_count: usize,
    lifecycle: Arc<L>,
) -> Result<Vec<DeviceDescriptor>, FleetError> {
    let mut pool = WorkerPool::start(worker_count, lifecycle)?;
    for device in devices {
        pool.submit(device).await?;
    }
    pool.await_drain().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::vendor::VendorKind;

    #[derive(Default)]
    struct CountingLifecycle {
        visits: std::sync::Mutex<HashMap<String, usize>>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DeviceLifecycle for CountingLifecycle {
        async fn drive(&self, device: &mut DeviceDescriptor) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            *self
                .visits
                .lock()
                .unwrap()
                .entry(device.hostname().to_string())
                .or_default() += 1;
            if device.hostname().ends_with('7') {
                device.mark_failed("unreachable");
            } else {
                device.mark_succeeded();
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct PanickingLifecycle;

    #[async_trait]
    impl DeviceLifecycle for PanickingLifecycle {
        async fn drive(&self, device: &mut DeviceDescriptor) {
            if device.hostname() == "boom" {
                panic!("lifecycle bug");
            }
            device.mark_succeeded();
        }
    }

    fn fleet(n: usize) -> Vec<DeviceDescriptor> {
        (0..n)
            .map(|i| DeviceDescriptor::new(format!("r{i}"), format!("10.0.0.{i}"), VendorKind::Ios))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_device_is_processed_exactly_once_in_submission_order() {
        let lifecycle = Arc::new(CountingLifecycle::default());

        let devices = run_pool(fleet(25), 4, lifecycle.clone()).await.unwrap();

        assert_eq!(devices.len(), 25);
        assert!(devices.iter().all(DeviceDescriptor::is_terminal));
        let hostnames: Vec<_> = devices.iter().map(|d| d.hostname().to_string()).collect();
        let expected: Vec<_> = (0..25).map(|i| format!("r{i}")).collect();
        assert_eq!(hostnames, expected);

        let visits = lifecycle.visits.lock().unwrap();
        assert_eq!(visits.len(), 25);
        assert!(visits.values().all(|count| *count == 1));
        assert_eq!(devices.iter().filter(|d| !d.connection_ok()).count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_worker_count() {
        let lifecycle = Arc::new(CountingLifecycle::default());

        run_pool(fleet(20), 2, lifecycle.clone()).await.unwrap();

        let peak = lifecycle.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 2, "peak concurrency {peak}");
    }

    #[tokio::test]
    async fn small_queue_capacity_still_drains_everything() {
        let lifecycle = Arc::new(CountingLifecycle::default());
        let mut pool = WorkerPool::with_capacity(3, 1, lifecycle).unwrap();
        for device in fleet(10) {
            pool.submit(device).await.unwrap();
        }
        assert_eq!(pool.submitted(), 10);

        let devices = pool.await_drain().await.unwrap();

        assert_eq!(devices.len(), 10);
    }

    #[tokio::test]
    async fn empty_queue_drains_immediately() {
        let pool = WorkerPool::start(5, Arc::new(CountingLifecycle::default())).unwrap();
        assert_eq!(pool.worker_count(), 5);
        assert!(pool.await_drain().await.unwrap().is_empty());
    }

    #[test]
    fn worker_count_is_validated() {
        let lifecycle = Arc::new(CountingLifecycle::default());
        assert!(matches!(
            WorkerPool::start(0, lifecycle.clone()),
            Err(FleetError::WorkerCount { got: 0, .. })
        ));
        assert!(matches!(
            WorkerPool::start(101, lifecycle),
            Err(FleetError::WorkerCount { got: 101, max: 100 })
        ));
    }

    #[tokio::test]
    async fn panicking_worker_is_reported() {
        let mut devices = fleet(2);
        devices.push(DeviceDescriptor::new("boom", "10.0.0.99", VendorKind::Ios));

        let result = run_pool(devices, 1, Arc::new(PanickingLifecycle)).await;

        assert!(matches!(result, Err(FleetError::WorkerPanicked(_))));
    }
}
