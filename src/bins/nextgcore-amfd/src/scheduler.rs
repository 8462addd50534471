//! AMF NGAP Scheduler
//!
//! A fixed pool of [`Worker`] lanes. Every item goes to lane
//! `routing_key % worker_count`, so all messages of one UE are handled by
//! one lane in arrival order while different UEs spread across cores.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use ogs_sctp::Connection;

use crate::worker::{Handler, WorkItem, Worker};

/// Queue depth per lane when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Worker pool with key-affine routing
pub struct Scheduler<C> {
    workers: Vec<Worker<C>>,
    queue_capacity: usize,
    shut_down: AtomicBool,
}

impl<C: Send + 'static> Scheduler<C> {
    /// Build the pool and start every lane.
    ///
    /// `worker_count == 0` uses the number of logical CPUs,
    /// `queue_capacity == 0` uses [`DEFAULT_QUEUE_CAPACITY`].
    pub fn new<F>(worker_count: usize, queue_capacity: usize, handler: F) -> io::Result<Self>
    where
        F: Fn(C, Bytes) + Send + Sync + 'static,
    {
        let worker_count = if worker_count == 0 {
            num_cpus::get().max(1)
        } else {
            worker_count
        };
        let queue_capacity = if queue_capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            queue_capacity
        };

        let handler: Handler<C> = Arc::new(handler);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match Worker::spawn(id, queue_capacity, Arc::clone(&handler)) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // Already started lanes are stopped by their Drop
                    log::error!("Failed to start worker {}: {}", id, e);
                    return Err(e);
                }
            }
        }

        log::info!(
            "Scheduler started: {} workers, queue capacity {}",
            worker_count,
            queue_capacity
        );
        Ok(Self {
            workers,
            queue_capacity,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl<C> Scheduler<C> {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Lane index for a routing key
    pub fn route(&self, routing_key: u64) -> usize {
        (routing_key % self.workers.len() as u64) as usize
    }

    /// Hand an item to its lane. Blocks while that lane is full; `false`
    /// once the scheduler is shutting down.
    pub fn dispatch(&self, item: WorkItem<C>) -> bool {
        let index = self.route(item.routing_key);
        self.workers[index].submit(item)
    }

    /// Items queued across all lanes
    pub fn queued(&self) -> usize {
        self.workers.iter().map(Worker::queued).sum()
    }

    /// Handler panics across all lanes
    pub fn panic_count(&self) -> u64 {
        self.workers.iter().map(Worker::panic_count).sum()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop every lane and wait until each has drained its queue.
    /// Later calls return immediately.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Scheduler shutting down ({} queued)", self.queued());

        for worker in &self.workers {
            worker.stop();
        }
        for worker in &self.workers {
            worker.join();
        }

        log::info!("Scheduler stopped");
    }
}

impl<C> Drop for Scheduler<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Global Scheduler Singleton
// ============================================================================

static GLOBAL_SCHEDULER: OnceLock<Arc<Scheduler<Connection>>> = OnceLock::new();

/// Create the process-wide scheduler. A second call returns the existing
/// instance and ignores its arguments.
pub fn amf_scheduler_init<F>(
    worker_count: usize,
    queue_capacity: usize,
    handler: F,
) -> io::Result<Arc<Scheduler<Connection>>>
where
    F: Fn(Connection, Bytes) + Send + Sync + 'static,
{
    if let Some(scheduler) = GLOBAL_SCHEDULER.get() {
        log::warn!("Scheduler already initialized");
        return Ok(Arc::clone(scheduler));
    }
    let scheduler = Arc::new(Scheduler::new(worker_count, queue_capacity, handler)?);
    Ok(Arc::clone(GLOBAL_SCHEDULER.get_or_init(move || scheduler)))
}

/// The process-wide scheduler, if initialized
pub fn amf_scheduler() -> Option<Arc<Scheduler<Connection>>> {
    GLOBAL_SCHEDULER.get().cloned()
}

/// Drain and stop the process-wide scheduler
pub fn amf_scheduler_shutdown() {
    if let Some(scheduler) = GLOBAL_SCHEDULER.get() {
        scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    fn noop(_conn: u32, _payload: Bytes) {}

    #[test]
    fn test_route_is_deterministic() {
        let scheduler = Scheduler::new(4, 8, noop).unwrap();
        for key in [0u64, 1, 7, 12345, u64::MAX] {
            let first = scheduler.route(key);
            for _ in 0..10 {
                assert_eq!(scheduler.route(key), first);
            }
        }
        scheduler.shutdown();
    }

    #[test]
    fn test_per_key_ordering() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let scheduler = Scheduler::new(4, 0, move |_conn: u32, payload: Bytes| {
            sink.lock().unwrap().push(payload[0]);
        })
        .unwrap();

        for i in 0..100u8 {
            assert!(scheduler.dispatch(WorkItem::new(12345, 1, Bytes::from(vec![i]))));
        }
        scheduler.shutdown();

        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<u8>>());
    }

    #[test]
    fn test_fan_out_distribution() {
        let scheduler = Scheduler::new(8, 1, noop).unwrap();
        let mut counts = vec![0usize; 8];
        for key in 1..=10_000u64 {
            counts[scheduler.route(key)] += 1;
        }
        for count in counts {
            assert!((938..=1562).contains(&count), "count {} out of band", count);
        }
        scheduler.shutdown();
    }

    #[test]
    fn test_shutdown_drains_all_queued_work() {
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);
        let scheduler = Scheduler::new(4, 0, move |_conn: u32, _payload: Bytes| {
            thread::sleep(Duration::from_millis(10));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for key in 0..50u64 {
            assert!(scheduler.dispatch(WorkItem::new(key, 1, Bytes::from_static(&[0]))));
        }
        scheduler.shutdown();

        assert_eq!(processed.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_route_range_safety() {
        for workers in 1..=16usize {
            let scheduler = Scheduler::new(workers, 1, noop).unwrap();
            for key in [0u64, 1, u64::MAX / 2, u64::MAX - 1, u64::MAX] {
                assert!(scheduler.route(key) < workers);
            }
        }
    }

    #[test]
    fn test_zero_key_shares_one_lane() {
        let scheduler = Scheduler::new(5, 1, noop).unwrap();
        assert_eq!(scheduler.route(0), 0);
        assert_eq!(scheduler.route(0), scheduler.route(0));
    }

    #[test]
    fn test_defaults_for_zero_parameters() {
        let scheduler = Scheduler::new(0, 0, noop).unwrap();
        assert_eq!(scheduler.worker_count(), num_cpus::get().max(1));
        assert_eq!(scheduler.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_dispatch_after_shutdown_is_rejected() {
        let scheduler = Scheduler::new(2, 4, noop).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        assert!(scheduler.is_shut_down());
        assert!(!scheduler.dispatch(WorkItem::new(1, 1, Bytes::new())));
    }

    #[test]
    fn test_panic_counted_across_lanes() {
        let scheduler = Scheduler::new(2, 4, |_conn: u32, payload: Bytes| {
            if payload.is_empty() {
                panic!("empty payload");
            }
        })
        .unwrap();
        assert!(scheduler.dispatch(WorkItem::new(0, 1, Bytes::new())));
        assert!(scheduler.dispatch(WorkItem::new(1, 1, Bytes::new())));
        assert!(scheduler.dispatch(WorkItem::new(1, 1, Bytes::from_static(&[1]))));
        scheduler.shutdown();
        assert_eq!(scheduler.panic_count(), 2);
    }

    #[test]
    fn test_global_scheduler_init_once() {
        let first = amf_scheduler_init(2, 8, |_conn: Connection, _payload: Bytes| {}).unwrap();
        let second = amf_scheduler_init(6, 8, |_conn: Connection, _payload: Bytes| {}).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.worker_count(), 2);
        assert!(amf_scheduler().is_some());

        amf_scheduler_shutdown();
        assert!(first.is_shut_down());
    }
}
