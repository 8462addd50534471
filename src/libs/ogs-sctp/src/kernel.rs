//! Linux Kernel SCTP Implementation
//!
//! Native SCTP sockets on the kernel stack. The SCTP module must be loaded
//! (`modprobe sctp`); no user-space SCTP library is needed since every
//! option is set through plain `setsockopt` and data moves through
//! `sendmsg` / `recvmsg` with `SCTP_SNDRCV` ancillary data.

use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::time::Duration;

use libc::{
    self, c_int, c_void, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t,
    AF_INET, AF_INET6, IPPROTO_SCTP, SOCK_STREAM, SOL_SOCKET, SO_REUSEADDR,
};

use super::{OgsSctpInfo, Result, SctpConfig, SctpError, MSG_NOTIFICATION};

// ============================================================================
// SCTP Constants
// ============================================================================

/// SCTP socket option level
pub const SOL_SCTP: c_int = 132;

/// SCTP socket options
pub const SCTP_INITMSG: c_int = 2;
pub const SCTP_NODELAY: c_int = 3;
pub const SCTP_EVENTS: c_int = 11;

/// Ancillary data type carrying `SctpSndRcvInfo`
pub const SCTP_SNDRCV: c_int = 1;

// ============================================================================
// SCTP Structures (matching kernel ABI)
// ============================================================================

/// SCTP initialization message
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SctpInitmsg {
    pub sinit_num_ostreams: u16,
    pub sinit_max_instreams: u16,
    pub sinit_max_attempts: u16,
    pub sinit_max_init_timeo: u16,
}

/// SCTP event subscription
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SctpEventSubscribe {
    pub sctp_data_io_event: u8,
    pub sctp_association_event: u8,
    pub sctp_address_event: u8,
    pub sctp_send_failure_event: u8,
    pub sctp_peer_error_event: u8,
    pub sctp_shutdown_event: u8,
    pub sctp_partial_delivery_event: u8,
    pub sctp_adaptation_layer_event: u8,
    pub sctp_authentication_event: u8,
    pub sctp_sender_dry_event: u8,
}

/// SCTP send/receive info
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SctpSndRcvInfo {
    pub sinfo_stream: u16,
    pub sinfo_ssn: u16,
    pub sinfo_flags: u16,
    /// Network byte order on the wire
    pub sinfo_ppid: u32,
    pub sinfo_context: u32,
    pub sinfo_timetolive: u32,
    pub sinfo_tsn: u32,
    pub sinfo_cumtsn: u32,
    pub sinfo_assoc_id: i32,
}

/// Outcome of one receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// `len` bytes of user data
    Data { len: usize, info: OgsSctpInfo },
    /// `len` bytes of an SCTP notification
    Notification { len: usize },
    /// Orderly shutdown by the peer (0-byte read)
    Closed,
}

/// Ancillary data buffer, 8-byte aligned for `cmsghdr`
#[repr(C, align(8))]
struct CmsgBuffer([u8; 64]);

// ============================================================================
// Kernel SCTP Socket
// ============================================================================

/// Kernel SCTP socket wrapper
#[derive(Debug)]
pub struct KernelSctpSocket {
    fd: OwnedFd,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
}

impl KernelSctpSocket {
    fn new(addr: &SocketAddr) -> Result<Self> {
        let family = match addr {
            SocketAddr::V4(_) => AF_INET,
            SocketAddr::V6(_) => AF_INET6,
        };

        let fd = unsafe { libc::socket(family, SOCK_STREAM, IPPROTO_SCTP) };
        if fd < 0 {
            return Err(SctpError::SocketCreation(io::Error::last_os_error()));
        }

        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            local_addr: *addr,
            remote_addr: None,
        })
    }

    /// Create a listening one-to-one server socket
    pub fn server(addr: SocketAddr, config: &SctpConfig) -> Result<Self> {
        let mut sock = Self::new(&addr)?;

        sock.set_reuse_addr(true)?;
        sock.set_sctp_events()?;
        sock.set_sctp_initmsg(config)?;
        sock.bind(&addr)?;
        sock.listen(config.backlog)?;

        log::info!("Kernel SCTP server listening on {}", sock.local_addr);
        Ok(sock)
    }

    /// Connect a one-to-one client socket
    pub fn client(remote: SocketAddr, config: &SctpConfig) -> Result<Self> {
        let bind_addr = if remote.is_ipv4() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };

        let mut sock = Self::new(&bind_addr)?;
        sock.set_sctp_events()?;
        sock.set_sctp_initmsg(config)?;
        sock.bind(&bind_addr)?;
        sock.connect(&remote)?;

        log::info!("Kernel SCTP client {} -> {}", sock.local_addr, remote);
        Ok(sock)
    }

    /// Accept a new association
    pub fn accept(&self) -> Result<(Self, SocketAddr)> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

        let new_fd = unsafe {
            libc::accept(
                self.fd.as_raw_fd(),
                &mut storage as *mut _ as *mut sockaddr,
                &mut len,
            )
        };
        if new_fd < 0 {
            return Err(SctpError::AcceptFailed(io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(new_fd) };

        let peer_addr = sockaddr_to_socketaddr(&storage, len)?;
        Ok((
            Self {
                fd,
                local_addr: self.local_addr,
                remote_addr: Some(peer_addr),
            },
            peer_addr,
        ))
    }

    /// Wait until the socket is readable. `Ok(false)` on timeout.
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(c_int::MAX as u128) as c_int;

        let n = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(SctpError::ReceiveFailed(err));
        }
        Ok(n > 0)
    }

    /// Send one message on `stream_no` with `ppid`
    pub fn send(&self, data: &[u8], ppid: u32, stream_no: u16) -> Result<usize> {
        let info = SctpSndRcvInfo {
            sinfo_stream: stream_no,
            sinfo_ppid: ppid.to_be(),
            ..Default::default()
        };

        let mut iov = libc::iovec {
            iov_base: data.as_ptr() as *mut c_void,
            iov_len: data.len(),
        };
        let mut control = CmsgBuffer([0u8; 64]);
        let info_len = mem::size_of::<SctpSndRcvInfo>() as u32;

        let sent = unsafe {
            let mut msg: libc::msghdr = mem::zeroed();
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;
            msg.msg_control = control.0.as_mut_ptr() as *mut c_void;
            msg.msg_controllen = libc::CMSG_SPACE(info_len) as _;

            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = SOL_SCTP;
            (*cmsg).cmsg_type = SCTP_SNDRCV;
            (*cmsg).cmsg_len = libc::CMSG_LEN(info_len) as _;
            ptr::write_unaligned(libc::CMSG_DATA(cmsg) as *mut SctpSndRcvInfo, info);

            libc::sendmsg(self.fd.as_raw_fd(), &msg, 0)
        };

        if sent < 0 {
            return Err(SctpError::SendFailed(io::Error::last_os_error()));
        }
        Ok(sent as usize)
    }

    /// Receive one message or notification into `buf`
    pub fn recv(&self, buf: &mut [u8]) -> Result<Received> {
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut c_void,
            iov_len: buf.len(),
        };
        let mut control = CmsgBuffer([0u8; 64]);

        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.0.as_mut_ptr() as *mut c_void;
        msg.msg_controllen = control.0.len() as _;

        let received = unsafe { libc::recvmsg(self.fd.as_raw_fd(), &mut msg, 0) };
        if received < 0 {
            return Err(SctpError::ReceiveFailed(io::Error::last_os_error()));
        }
        if received == 0 {
            return Ok(Received::Closed);
        }
        let len = received as usize;

        if msg.msg_flags & MSG_NOTIFICATION != 0 {
            return Ok(Received::Notification { len });
        }

        let mut info = OgsSctpInfo::default();
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
            while !cmsg.is_null() {
                if (*cmsg).cmsg_level == SOL_SCTP && (*cmsg).cmsg_type == SCTP_SNDRCV {
                    let sndrcv =
                        ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const SctpSndRcvInfo);
                    info.ppid = u32::from_be(sndrcv.sinfo_ppid);
                    info.stream_no = sndrcv.sinfo_stream;
                }
                cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
            }
        }

        Ok(Received::Data { len, info })
    }

    /// Toggle `SCTP_NODELAY`
    pub fn set_nodelay(&self, enable: bool) -> Result<()> {
        let optval: c_int = enable as c_int;
        self.setsockopt(SOL_SCTP, SCTP_NODELAY, &optval)
            .map_err(SctpError::SockoptFailed)
    }

    /// Shut down both directions; wakes a reader blocked in `recv`
    pub fn shutdown(&self) {
        unsafe {
            libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RDWR);
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    // ========================================================================
    // Internal methods
    // ========================================================================

    fn bind(&mut self, addr: &SocketAddr) -> Result<()> {
        let (storage, len) = socketaddr_to_sockaddr(addr);

        let result = unsafe {
            libc::bind(
                self.fd.as_raw_fd(),
                &storage as *const _ as *const sockaddr,
                len,
            )
        };
        if result < 0 {
            return Err(SctpError::BindFailed(io::Error::last_os_error()));
        }

        self.local_addr = self.get_local_addr()?;
        Ok(())
    }

    fn listen(&self, backlog: c_int) -> Result<()> {
        let result = unsafe { libc::listen(self.fd.as_raw_fd(), backlog) };
        if result < 0 {
            return Err(SctpError::ListenFailed(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn connect(&mut self, addr: &SocketAddr) -> Result<()> {
        let (storage, len) = socketaddr_to_sockaddr(addr);

        let result = unsafe {
            libc::connect(
                self.fd.as_raw_fd(),
                &storage as *const _ as *const sockaddr,
                len,
            )
        };
        if result < 0 {
            return Err(SctpError::ConnectFailed(io::Error::last_os_error()));
        }

        self.remote_addr = Some(*addr);
        Ok(())
    }

    fn get_local_addr(&self) -> Result<SocketAddr> {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

        let result = unsafe {
            libc::getsockname(
                self.fd.as_raw_fd(),
                &mut storage as *mut _ as *mut sockaddr,
                &mut len,
            )
        };
        if result < 0 {
            return Err(SctpError::SockoptFailed(io::Error::last_os_error()));
        }

        sockaddr_to_socketaddr(&storage, len)
    }

    fn setsockopt<T>(&self, level: c_int, name: c_int, value: &T) -> io::Result<()> {
        let result = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                level,
                name,
                value as *const T as *const c_void,
                mem::size_of::<T>() as socklen_t,
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_reuse_addr(&self, enable: bool) -> Result<()> {
        let optval: c_int = enable as c_int;
        self.setsockopt(SOL_SOCKET, SO_REUSEADDR, &optval)
            .map_err(SctpError::SockoptFailed)
    }

    fn set_sctp_events(&self) -> Result<()> {
        let events = SctpEventSubscribe {
            sctp_data_io_event: 1,
            sctp_association_event: 1,
            sctp_shutdown_event: 1,
            ..Default::default()
        };

        // Without notifications the reader still sees the 0-byte close
        if let Err(e) = self.setsockopt(SOL_SCTP, SCTP_EVENTS, &events) {
            log::warn!("Failed to set SCTP events: {}", e);
        }
        Ok(())
    }

    fn set_sctp_initmsg(&self, config: &SctpConfig) -> Result<()> {
        let initmsg = SctpInitmsg {
            sinit_num_ostreams: config.max_outstreams,
            sinit_max_instreams: config.max_instreams,
            sinit_max_attempts: config.max_attempts,
            sinit_max_init_timeo: config.max_init_timeo_ms,
        };

        if let Err(e) = self.setsockopt(SOL_SCTP, SCTP_INITMSG, &initmsg) {
            log::warn!("Failed to set SCTP initmsg: {}", e);
        }
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn socketaddr_to_sockaddr(addr: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    let len = match addr {
        SocketAddr::V4(v4) => {
            let sin = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sin.sin_family = AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            mem::size_of::<sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sin6.sin6_family = AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr.s6_addr = v6.ip().octets();
            sin6.sin6_scope_id = v6.scope_id();
            mem::size_of::<sockaddr_in6>()
        }
    };

    (storage, len as socklen_t)
}

fn sockaddr_to_socketaddr(storage: &sockaddr_storage, len: socklen_t) -> Result<SocketAddr> {
    let family = storage.ss_family as c_int;

    if family == AF_INET && len as usize >= mem::size_of::<sockaddr_in>() {
        let sin = unsafe { &*(storage as *const _ as *const sockaddr_in) };
        let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
        Ok(SocketAddr::new(IpAddr::V4(ip), u16::from_be(sin.sin_port)))
    } else if family == AF_INET6 && len as usize >= mem::size_of::<sockaddr_in6>() {
        let sin6 = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
        let ip = Ipv6Addr::from(sin6.sin6_addr.s6_addr);
        Ok(SocketAddr::new(IpAddr::V6(ip), u16::from_be(sin6.sin6_port)))
    } else {
        Err(SctpError::NoValidAddress)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes_match_kernel_abi() {
        assert_eq!(mem::size_of::<SctpInitmsg>(), 8);
        assert_eq!(mem::size_of::<SctpSndRcvInfo>(), 32);
        assert_eq!(mem::size_of::<SctpEventSubscribe>(), 10);
    }

    #[test]
    fn test_cmsg_buffer_fits_sndrcv() {
        let space = unsafe { libc::CMSG_SPACE(mem::size_of::<SctpSndRcvInfo>() as u32) };
        assert!(space as usize <= mem::size_of::<CmsgBuffer>());
    }

    #[test]
    fn test_socketaddr_conversion_v4() {
        let addr: SocketAddr = "127.0.0.1:38412".parse().unwrap();
        let (storage, len) = socketaddr_to_sockaddr(&addr);
        assert_eq!(len as usize, mem::size_of::<sockaddr_in>());
        assert_eq!(sockaddr_to_socketaddr(&storage, len).unwrap(), addr);
    }

    #[test]
    fn test_socketaddr_conversion_v6() {
        let addr: SocketAddr = "[::1]:38412".parse().unwrap();
        let (storage, len) = socketaddr_to_sockaddr(&addr);
        assert_eq!(len as usize, mem::size_of::<sockaddr_in6>());
        assert_eq!(sockaddr_to_socketaddr(&storage, len).unwrap(), addr);
    }

    #[test]
    fn test_sockaddr_short_length_rejected() {
        let addr: SocketAddr = "10.0.0.1:1".parse().unwrap();
        let (storage, _) = socketaddr_to_sockaddr(&addr);
        assert!(matches!(
            sockaddr_to_socketaddr(&storage, 4),
            Err(SctpError::NoValidAddress)
        ));
    }
}
