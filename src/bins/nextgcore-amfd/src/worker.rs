//! AMF Worker
//!
//! One sequential processing lane. Items are handled strictly in the order
//! they were queued; the queue is bounded so a slow lane pushes back on
//! whoever submits to it.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};

/// Business handler invoked once per item: `(connection, payload)`
pub type Handler<C> = Arc<dyn Fn(C, Bytes) + Send + Sync + 'static>;

/// One inbound message waiting for a lane
pub struct WorkItem<C> {
    /// UE routing key, 0 for node-level messages
    pub routing_key: u64,
    pub connection: C,
    pub payload: Bytes,
}

impl<C> WorkItem<C> {
    pub fn new(routing_key: u64, connection: C, payload: Bytes) -> Self {
        Self { routing_key, connection, payload }
    }
}

/// Worker lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    Running = 0,
    ShuttingDown = 1,
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Running,
            1 => WorkerState::ShuttingDown,
            _ => WorkerState::Stopped,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single-threaded lane with a bounded FIFO
pub struct Worker<C> {
    id: usize,
    tx: Sender<WorkItem<C>>,
    /// Dropped by `stop`; every receiver then sees a disconnect
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    state: Arc<AtomicU8>,
    panics: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> Worker<C> {
    /// Start the lane thread
    pub fn spawn(id: usize, capacity: usize, handler: Handler<C>) -> io::Result<Self> {
        let (tx, rx) = channel::bounded(capacity);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let state = Arc::new(AtomicU8::new(WorkerState::Running as u8));
        let panics = Arc::new(AtomicU64::new(0));

        let lane = Lane {
            id,
            rx,
            shutdown_rx: shutdown_rx.clone(),
            handler,
            state: Arc::clone(&state),
            panics: Arc::clone(&panics),
        };
        let handle = thread::Builder::new()
            .name(format!("amf-worker-{}", id))
            .spawn(move || lane.run())?;

        Ok(Self {
            id,
            tx,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
            state,
            panics,
            handle: Mutex::new(Some(handle)),
        })
    }
}

impl<C> Worker<C> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Items waiting in the queue
    pub fn queued(&self) -> usize {
        self.tx.len()
    }

    /// Handler invocations that panicked
    pub fn panic_count(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }

    /// Queue an item.
    ///
    /// Blocks while the queue is full. Returns `false` (and drops the item)
    /// once shutdown has been signalled.
    pub fn submit(&self, item: WorkItem<C>) -> bool {
        if self.state() != WorkerState::Running {
            return false;
        }
        crossbeam::select! {
            send(self.tx, item) -> res => res.is_ok(),
            recv(self.shutdown_rx) -> _ => false,
        }
    }

    /// Signal shutdown without waiting. Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(shutdown_tx) = lock(&self.shutdown_tx).take() {
            self.state
                .fetch_max(WorkerState::ShuttingDown as u8, Ordering::AcqRel);
            drop(shutdown_tx);
            log::debug!("[worker {}] shutdown signalled", self.id);
        }
    }

    /// Wait for the lane thread to exit. Call after [`Worker::stop`].
    pub fn join(&self) {
        if let Some(handle) = lock(&self.handle).take() {
            if handle.join().is_err() {
                log::error!("[worker {}] thread terminated abnormally", self.id);
                self.state.store(WorkerState::Stopped as u8, Ordering::Release);
            }
        }
    }
}

impl<C> Drop for Worker<C> {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

// ============================================================================
// Lane thread
// ============================================================================

struct Lane<C> {
    id: usize,
    rx: Receiver<WorkItem<C>>,
    shutdown_rx: Receiver<()>,
    handler: Handler<C>,
    state: Arc<AtomicU8>,
    panics: Arc<AtomicU64>,
}

impl<C> Lane<C> {
    fn run(self) {
        log::debug!("[worker {}] started", self.id);

        loop {
            crossbeam::select! {
                recv(self.rx) -> msg => match msg {
                    Ok(item) => self.process(item),
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => break,
            }
        }

        let mut drained = 0usize;
        while let Ok(item) = self.rx.try_recv() {
            self.process(item);
            drained += 1;
        }

        self.state.store(WorkerState::Stopped as u8, Ordering::Release);
        log::debug!("[worker {}] stopped ({} drained)", self.id, drained);
    }

    fn process(&self, item: WorkItem<C>) {
        let WorkItem { routing_key, connection, payload } = item;
        let handler = &self.handler;
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(connection, payload)));
        if let Err(cause) = result {
            self.panics.fetch_add(1, Ordering::Relaxed);
            log::error!(
                "[worker {}] handler panicked on key {}: {}",
                self.id,
                routing_key,
                panic_message(cause.as_ref())
            );
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn recorder() -> (Handler<u32>, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Handler<u32> = Arc::new(move |_conn: u32, payload: Bytes| {
            lock(&sink).push(payload[0]);
        });
        (handler, seen)
    }

    #[test]
    fn test_worker_processes_in_order() {
        let (handler, seen) = recorder();
        let worker = Worker::spawn(0, 16, handler).unwrap();
        for i in 0..10u8 {
            assert!(worker.submit(WorkItem::new(7, 1, Bytes::from(vec![i]))));
        }
        worker.stop();
        worker.join();
        assert_eq!(*lock(&seen), (0..10).collect::<Vec<u8>>());
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_worker_stop_is_idempotent() {
        let (handler, _) = recorder();
        let worker = Worker::spawn(3, 4, handler).unwrap();
        assert_eq!(worker.id(), 3);
        assert_eq!(worker.state(), WorkerState::Running);
        worker.stop();
        worker.stop();
        assert_ne!(worker.state(), WorkerState::Running);
        worker.join();
        worker.join();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_submit_after_stop_is_rejected() {
        let (handler, seen) = recorder();
        let worker = Worker::spawn(0, 4, handler).unwrap();
        worker.stop();
        assert!(!worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[1]))));
        worker.join();
        assert!(lock(&seen).is_empty());
    }

    #[test]
    fn test_handler_panic_does_not_stop_lane() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Handler<u32> = Arc::new(move |_conn: u32, payload: Bytes| {
            if payload[0] == 0xff {
                panic!("bad message");
            }
            lock(&sink).push(payload[0]);
        });
        let worker = Worker::spawn(0, 8, handler).unwrap();
        assert!(worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[1]))));
        assert!(worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[0xff]))));
        assert!(worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[2]))));
        worker.stop();
        worker.join();
        assert_eq!(*lock(&seen), vec![1, 2]);
        assert_eq!(worker.panic_count(), 1);
    }

    #[test]
    fn test_full_queue_blocks_until_stop_then_drains() {
        let (started_tx, started_rx) = channel::unbounded::<()>();
        let (gate_tx, gate_rx) = channel::unbounded::<()>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Handler<u32> = Arc::new(move |_conn: u32, payload: Bytes| {
            let _ = started_tx.send(());
            let _ = gate_rx.recv();
            lock(&sink).push(payload[0]);
        });
        let worker = Arc::new(Worker::spawn(0, 1, handler).unwrap());

        // First item is in the handler, second fills the queue
        assert!(worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[1]))));
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[2]))));

        let finished = Arc::new(AtomicBool::new(false));
        let blocked = {
            let worker = Arc::clone(&worker);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let accepted = worker.submit(WorkItem::new(1, 1, Bytes::from_static(&[3])));
                finished.store(true, Ordering::SeqCst);
                accepted
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!finished.load(Ordering::SeqCst));

        worker.stop();
        assert!(!blocked.join().unwrap());

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        worker.join();
        assert_eq!(*lock(&seen), vec![1, 2]);
    }
}
