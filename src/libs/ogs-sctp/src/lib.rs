//! NextGCore SCTP Transport Library
//!
//! Linux kernel SCTP for the NGAP interface:
//!
//! - [`kernel::KernelSctpSocket`]: one-to-one style (`SOCK_STREAM`) socket
//!   with `SCTP_INITMSG` / `SCTP_EVENTS` options, PPID-aware send and
//!   notification-aware receive
//! - [`server::SctpServer`]: acceptor thread plus one reader thread per
//!   association, reporting into an [`server::AssociationHandler`]
//!
//! Requires the SCTP kernel module (`modprobe sctp`). In Docker the NGAP
//! port is mapped with the `/sctp` protocol: `38412:38412/sctp`.

use std::io;

use thiserror::Error;

pub mod kernel;
pub mod server;

pub use kernel::KernelSctpSocket;
pub use server::{AssociationHandler, Connection, SctpServer};

// ============================================================================
// Constants (matching 3GPP specifications)
// ============================================================================

/// NGAP SCTP port (3GPP TS 38.412)
pub const OGS_NGAP_SCTP_PORT: u16 = 38412;

/// NGAP PPID (Payload Protocol Identifier)
pub const OGS_SCTP_NGAP_PPID: u32 = 60;

/// Maximum SDU length read in one receive call
pub const OGS_MAX_SDU_LEN: usize = 8192;

/// `msg_flags` bit marking a notification instead of user data
pub const MSG_NOTIFICATION: i32 = 0x8000;

/// Stream used for non-UE-associated signalling
pub const NON_UE_SIGNALLING_STREAM: u16 = 0;

// Notification types. Linux numbers them from SCTP_SN_TYPE_BASE (1 << 15),
// the RFC 6458 socket API from zero.
#[cfg(target_os = "linux")]
const SCTP_SN_TYPE_BASE: u16 = 1 << 15;
#[cfg(not(target_os = "linux"))]
const SCTP_SN_TYPE_BASE: u16 = 0;

pub const SCTP_ASSOC_CHANGE: u16 = SCTP_SN_TYPE_BASE + 1;
pub const SCTP_PEER_ADDR_CHANGE: u16 = SCTP_SN_TYPE_BASE + 2;
pub const SCTP_SEND_FAILED: u16 = SCTP_SN_TYPE_BASE + 3;
pub const SCTP_REMOTE_ERROR: u16 = SCTP_SN_TYPE_BASE + 4;
pub const SCTP_SHUTDOWN_EVENT: u16 = SCTP_SN_TYPE_BASE + 5;

/// SCTP association change states (`sac_state`)
pub const SCTP_COMM_UP: u16 = 0;
pub const SCTP_COMM_LOST: u16 = 1;
pub const SCTP_RESTART: u16 = 2;
pub const SCTP_SHUTDOWN_COMP: u16 = 3;
pub const SCTP_CANT_STR_ASSOC: u16 = 4;

// ============================================================================
// Error types
// ============================================================================

/// SCTP-specific errors
#[derive(Error, Debug)]
pub enum SctpError {
    #[error("Socket creation failed: {0}")]
    SocketCreation(io::Error),

    #[error("Bind failed: {0}")]
    BindFailed(io::Error),

    #[error("Connect failed: {0}")]
    ConnectFailed(io::Error),

    #[error("Listen failed: {0}")]
    ListenFailed(io::Error),

    #[error("Accept failed: {0}")]
    AcceptFailed(io::Error),

    #[error("Send failed: {0}")]
    SendFailed(io::Error),

    #[error("Receive failed: {0}")]
    ReceiveFailed(io::Error),

    #[error("Socket option failed: {0}")]
    SockoptFailed(io::Error),

    #[error("No valid address in list")]
    NoValidAddress,

    #[error("Unknown connection {0}")]
    UnknownConnection(u64),

    #[error("Thread spawn failed: {0}")]
    ThreadSpawn(io::Error),
}

pub type Result<T> = std::result::Result<T, SctpError>;

// ============================================================================
// SCTP Info structure
// ============================================================================

/// Per-message SCTP information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OgsSctpInfo {
    /// Payload Protocol Identifier (host byte order)
    pub ppid: u32,
    /// Stream number
    pub stream_no: u16,
}

/// Stream counts negotiated through `SCTP_INITMSG`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SctpConfig {
    pub max_instreams: u16,
    pub max_outstreams: u16,
    pub max_attempts: u16,
    pub max_init_timeo_ms: u16,
    pub backlog: i32,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self {
            max_instreams: 2,
            max_outstreams: 2,
            max_attempts: 4,
            max_init_timeo_ms: 8000,
            backlog: 128,
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// An association-level event delivered in place of user data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SctpNotification {
    /// `SCTP_ASSOC_CHANGE` with its `sac_state`
    AssocChange(u16),
    /// Peer sent SHUTDOWN
    ShutdownEvent,
    /// Any other notification type
    Other(u16),
}

impl SctpNotification {
    /// Parse the notification header: `sn_type` at offset 0 and, for an
    /// association change, `sac_state` at offset 8.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let sn_type = u16::from_ne_bytes([*buf.first()?, *buf.get(1)?]);
        let notification = match sn_type {
            SCTP_ASSOC_CHANGE => {
                let state = u16::from_ne_bytes([*buf.get(8)?, *buf.get(9)?]);
                SctpNotification::AssocChange(state)
            }
            SCTP_SHUTDOWN_EVENT => SctpNotification::ShutdownEvent,
            other => SctpNotification::Other(other),
        };
        Some(notification)
    }

    /// True when the association is gone or going away
    pub fn is_terminal(&self) -> bool {
        match self {
            SctpNotification::AssocChange(state) => matches!(
                *state,
                SCTP_COMM_LOST | SCTP_SHUTDOWN_COMP | SCTP_CANT_STR_ASSOC
            ),
            SctpNotification::ShutdownEvent => true,
            SctpNotification::Other(_) => false,
        }
    }
}

impl std::fmt::Display for SctpNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SctpNotification::AssocChange(state) => {
                let name = match *state {
                    SCTP_COMM_UP => "COMM_UP",
                    SCTP_COMM_LOST => "COMM_LOST",
                    SCTP_RESTART => "RESTART",
                    SCTP_SHUTDOWN_COMP => "SHUTDOWN_COMP",
                    SCTP_CANT_STR_ASSOC => "CANT_STR_ASSOC",
                    _ => "UNKNOWN",
                };
                write!(f, "SCTP_ASSOC_CHANGE({})", name)
            }
            SctpNotification::ShutdownEvent => write!(f, "SCTP_SHUTDOWN_EVENT"),
            SctpNotification::Other(t) => write!(f, "SCTP notification 0x{:04x}", t),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
