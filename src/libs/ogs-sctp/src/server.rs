//! SCTP server
//!
//! One acceptor thread polls the listening socket; every accepted
//! association gets its own reader thread. Readers hand user messages,
//! notifications and errors to an [`AssociationHandler`] in arrival order.
//! A 0-byte read (orderly close by the peer) is delivered as an empty
//! message and ends the reader.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;

use crate::kernel::{KernelSctpSocket, Received};
use crate::{
    Result, SctpConfig, SctpError, SctpNotification, OGS_MAX_SDU_LEN, OGS_SCTP_NGAP_PPID,
};

/// How long blocking waits last before re-checking the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One accepted association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Server-assigned, never reused within one server
    pub id: u64,
    pub peer: SocketAddr,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer, self.id)
    }
}

/// Callbacks from the reader threads
///
/// Calls for one connection come from that connection's reader thread, in
/// order. Calls for different connections run concurrently.
pub trait AssociationHandler: Send + Sync + 'static {
    /// User data; an empty `data` means the peer closed the association
    fn on_message(&self, conn: Connection, data: Bytes);

    fn on_notification(&self, conn: Connection, notification: SctpNotification);

    /// A receive failed; the reader exits after this call
    fn on_connection_error(&self, conn: Connection, error: &SctpError);
}

type AssociationMap = HashMap<u64, Arc<KernelSctpSocket>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kernel SCTP server for NGAP
pub struct SctpServer {
    listener: Arc<KernelSctpSocket>,
    running: Arc<AtomicBool>,
    associations: Arc<Mutex<AssociationMap>>,
    next_id: Arc<AtomicU64>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    readers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SctpServer {
    /// Bind and listen; nothing is accepted until [`SctpServer::start`]
    pub fn bind(addr: SocketAddr, config: &SctpConfig) -> Result<Self> {
        let listener = KernelSctpSocket::server(addr, config)?;
        Ok(Self {
            listener: Arc::new(listener),
            running: Arc::new(AtomicBool::new(false)),
            associations: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            acceptor: Mutex::new(None),
            readers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn num_associations(&self) -> usize {
        lock(&self.associations).len()
    }

    /// Spawn the acceptor thread
    pub fn start(&self, handler: Arc<dyn AssociationHandler>) -> Result<()> {
        let mut acceptor = lock(&self.acceptor);
        if acceptor.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::Release);

        let ctx = AcceptContext {
            listener: Arc::clone(&self.listener),
            running: Arc::clone(&self.running),
            associations: Arc::clone(&self.associations),
            next_id: Arc::clone(&self.next_id),
            readers: Arc::clone(&self.readers),
            handler,
        };
        let handle = thread::Builder::new()
            .name("sctp-acceptor".to_string())
            .spawn(move || ctx.run())
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                SctpError::ThreadSpawn(e)
            })?;

        *acceptor = Some(handle);
        Ok(())
    }

    /// Send an NGAP message on `stream_no` of a connection
    pub fn send(&self, conn_id: u64, data: &[u8], stream_no: u16) -> Result<usize> {
        let socket = lock(&self.associations)
            .get(&conn_id)
            .cloned()
            .ok_or(SctpError::UnknownConnection(conn_id))?;
        socket.send(data, OGS_SCTP_NGAP_PPID, stream_no)
    }

    /// Stop accepting, shut every association down and join all threads.
    /// Safe to call more than once.
    pub fn close(&self) {
        self.running.store(false, Ordering::Release);

        for socket in lock(&self.associations).values() {
            socket.shutdown();
        }

        if let Some(handle) = lock(&self.acceptor).take() {
            if handle.join().is_err() {
                log::error!("SCTP acceptor thread panicked");
            }
        }

        let readers: Vec<_> = lock(&self.readers).drain(..).collect();
        for handle in readers {
            if handle.join().is_err() {
                log::error!("SCTP reader thread panicked");
            }
        }

        lock(&self.associations).clear();
    }
}

impl Drop for SctpServer {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Acceptor / reader threads
// ============================================================================

struct AcceptContext {
    listener: Arc<KernelSctpSocket>,
    running: Arc<AtomicBool>,
    associations: Arc<Mutex<AssociationMap>>,
    next_id: Arc<AtomicU64>,
    readers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    handler: Arc<dyn AssociationHandler>,
}

impl AcceptContext {
    fn run(self) {
        log::info!("SCTP acceptor started on {}", self.listener.local_addr());

        while self.running.load(Ordering::Acquire) {
            match self.listener.poll_readable(POLL_INTERVAL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    log::error!("SCTP listener poll failed: {}", e);
                    break;
                }
            }

            let (socket, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("SCTP accept failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = socket.set_nodelay(true) {
                log::debug!("[{}] SCTP_NODELAY not set: {}", peer, e);
            }

            let conn = Connection {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                peer,
            };
            self.spawn_reader(conn, Arc::new(socket));
        }

        log::info!("SCTP acceptor stopped");
    }

    fn spawn_reader(&self, conn: Connection, socket: Arc<KernelSctpSocket>) {
        lock(&self.associations).insert(conn.id, Arc::clone(&socket));
        log::info!("[{}] SCTP association accepted", conn);

        let reader = Reader {
            conn,
            socket,
            running: Arc::clone(&self.running),
            associations: Arc::clone(&self.associations),
            handler: Arc::clone(&self.handler),
        };
        match thread::Builder::new()
            .name(format!("sctp-reader-{}", conn.id))
            .spawn(move || reader.run())
        {
            Ok(handle) => {
                let mut readers = lock(&self.readers);
                readers.retain(|h| !h.is_finished());
                readers.push(handle);
            }
            Err(e) => {
                log::error!("[{}] Failed to spawn SCTP reader: {}", conn, e);
                lock(&self.associations).remove(&conn.id);
            }
        }
    }
}

struct Reader {
    conn: Connection,
    socket: Arc<KernelSctpSocket>,
    running: Arc<AtomicBool>,
    associations: Arc<Mutex<AssociationMap>>,
    handler: Arc<dyn AssociationHandler>,
}

impl Reader {
    fn run(self) {
        let mut buf = vec![0u8; OGS_MAX_SDU_LEN];

        while self.running.load(Ordering::Acquire) {
            let readable = match self.socket.poll_readable(POLL_INTERVAL) {
                Ok(readable) => readable,
                Err(e) => {
                    self.fail(&e);
                    break;
                }
            };
            if !readable {
                continue;
            }

            match self.socket.recv(&mut buf) {
                Ok(Received::Data { len, info }) => {
                    if info.ppid != 0 && info.ppid != OGS_SCTP_NGAP_PPID {
                        log::debug!("[{}] Unexpected PPID {}", self.conn, info.ppid);
                    }
                    self.handler
                        .on_message(self.conn, Bytes::copy_from_slice(&buf[..len]));
                }
                Ok(Received::Notification { len }) => match SctpNotification::parse(&buf[..len]) {
                    Some(notification) => self.handler.on_notification(self.conn, notification),
                    None => log::debug!("[{}] Short SCTP notification ({} bytes)", self.conn, len),
                },
                Ok(Received::Closed) => {
                    if self.running.load(Ordering::Acquire) {
                        log::info!("[{}] SCTP association closed by peer", self.conn);
                        self.handler.on_message(self.conn, Bytes::new());
                    }
                    break;
                }
                Err(e) => {
                    self.fail(&e);
                    break;
                }
            }
        }

        lock(&self.associations).remove(&self.conn.id);
    }

    fn fail(&self, error: &SctpError) {
        if self.running.load(Ordering::Acquire) {
            log::error!("[{}] SCTP receive failed: {}", self.conn, error);
            self.handler.on_connection_error(self.conn, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Event {
        Message(u64, Vec<u8>),
        Notification(u64, SctpNotification),
        Error(u64),
    }

    struct Recorder(Mutex<mpsc::Sender<Event>>);

    impl AssociationHandler for Recorder {
        fn on_message(&self, conn: Connection, data: Bytes) {
            let _ = lock(&self.0).send(Event::Message(conn.id, data.to_vec()));
        }

        fn on_notification(&self, conn: Connection, notification: SctpNotification) {
            let _ = lock(&self.0).send(Event::Notification(conn.id, notification));
        }

        fn on_connection_error(&self, conn: Connection, _error: &SctpError) {
            let _ = lock(&self.0).send(Event::Error(conn.id));
        }
    }

    #[test]
    fn test_connection_display() {
        let conn = Connection {
            id: 3,
            peer: "10.0.0.1:38412".parse().unwrap(),
        };
        assert_eq!(conn.to_string(), "10.0.0.1:38412#3");
    }

    #[test]
    #[ignore = "needs the sctp kernel module"]
    fn test_loopback_message_and_close() {
        let config = SctpConfig::default();
        let server = SctpServer::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let (tx, rx) = mpsc::channel();
        server.start(Arc::new(Recorder(Mutex::new(tx)))).unwrap();

        let client = KernelSctpSocket::client(server.local_addr(), &config).unwrap();
        client.send(&[0x00, 0x15, 0x00], OGS_SCTP_NGAP_PPID, 0).unwrap();

        let mut message = None;
        while message.is_none() {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                Event::Message(id, data) => message = Some((id, data)),
                Event::Notification(..) => {}
                Event::Error(id) => panic!("connection {} failed", id),
            }
        }
        let (id, data) = message.unwrap();
        assert_eq!(data, vec![0x00, 0x15, 0x00]);
        assert_eq!(server.num_associations(), 1);

        drop(client);
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                Event::Message(closed, data) if data.is_empty() => {
                    assert_eq!(closed, id);
                    break;
                }
                _ => {}
            }
        }

        server.close();
        server.close();
        assert!(!server.is_running());
    }
}
