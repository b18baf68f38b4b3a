//! Netlink channel binding: socket setup, the blocking wait, and the
//! shutdown eventfd that can interrupt it.
//!
//! Socket operations use raw libc calls wrapped in RAII guards. All unsafe
//! blocks are documented with SAFETY comments explaining invariants.

use std::{io, mem, os::fd::RawFd};

use libc::{
    AF_NETLINK, EFD_NONBLOCK, EINTR, NETLINK_ADD_MEMBERSHIP, NETLINK_ROUTE, POLLERR, POLLHUP,
    POLLIN, POLLNVAL, SOCK_RAW, SOL_NETLINK, c_void, sockaddr, sockaddr_nl,
};
use tracing::{debug, trace};

use crate::error::MonitorError;

/// Largest frame accepted from one receive call.
pub const RECV_BUFFER_LEN: usize = 4096;

/// Netlink multicast group for link events (interface up/down)
const RTNLGRP_LINK: i32 = 1;

/// Outcome of one blocking wait on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// One frame was received; its bytes are the leading `n` of the buffer.
    Data(usize),
    /// The shutdown eventfd fired.
    Shutdown,
}

/// RAII wrapper for the netlink socket file descriptor to ensure proper
/// cleanup. Automatically closes the socket when dropped.
pub struct NetlinkSocket(RawFd);

impl NetlinkSocket {
    /// Open the kernel event channel: create a route netlink socket, bind
    /// it with a kernel-assigned pid, and join the link multicast group.
    pub fn open() -> Result<Self, MonitorError> {
        // SAFETY: socket() is safe to call. The return value is checked.
        let fd = unsafe { libc::socket(AF_NETLINK, SOCK_RAW, NETLINK_ROUTE) };
        if fd < 0 {
            return Err(MonitorError::SocketOpen(io::Error::last_os_error()));
        }
        let sock = Self(fd);

        // SAFETY: sockaddr_nl is a C-compatible struct that is safe to
        // zero-initialize.
        let mut addr: sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = AF_NETLINK as u16;
        addr.nl_pid = 0; // kernel assigns
        addr.nl_groups = 0; // membership added via setsockopt below

        // SAFETY: sock.0 is a valid socket descriptor, addr is properly
        // initialized, and the size matches the struct being passed.
        let ret = unsafe {
            libc::bind(
                sock.0,
                &addr as *const sockaddr_nl as *const sockaddr,
                mem::size_of::<sockaddr_nl>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(MonitorError::SocketBind(io::Error::last_os_error()));
        }

        // SAFETY: sock.0 is valid, RTNLGRP_LINK is a valid i32 constant,
        // and the option length matches it.
        let ret = unsafe {
            libc::setsockopt(
                sock.0,
                SOL_NETLINK,
                NETLINK_ADD_MEMBERSHIP,
                &RTNLGRP_LINK as *const i32 as *const c_void,
                mem::size_of::<i32>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(MonitorError::GroupSubscribe(io::Error::last_os_error()));
        }

        debug!(
            event.name = "link_monitor.channel_opened",
            socket_fd = sock.0,
            group_id = RTNLGRP_LINK,
            "netlink socket bound and subscribed to link events"
        );
        Ok(sock)
    }

    /// Block until the channel has data or shutdown is signaled, then read
    /// at most one frame into `buf`.
    ///
    /// The wait has no timeout. An interrupted poll is retried. Poll and
    /// receive failures are fatal, as is an error condition reported on
    /// either descriptor; a zero-length read is handed to the decoder
    /// like any other frame.
    pub fn wait_for_event(
        &self,
        shutdown: &ShutdownEventFd,
        buf: &mut [u8],
    ) -> Result<Wakeup, MonitorError> {
        let mut fds = [
            libc::pollfd {
                fd: self.0,
                events: POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: shutdown.as_raw_fd(),
                events: POLLIN,
                revents: 0,
            },
        ];

        loop {
            // SAFETY: fds is properly initialized; timeout -1 waits
            // indefinitely.
            let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(EINTR) {
                    continue;
                }
                return Err(MonitorError::Poll(err));
            }

            if (fds[0].revents & (POLLERR | POLLHUP | POLLNVAL)) != 0 {
                return Err(MonitorError::ChannelState {
                    revents: fds[0].revents,
                });
            }
            if (fds[1].revents & (POLLERR | POLLHUP | POLLNVAL)) != 0 {
                return Err(MonitorError::ChannelState {
                    revents: fds[1].revents,
                });
            }
            if (fds[1].revents & POLLIN) != 0 {
                return Ok(Wakeup::Shutdown);
            }
            if (fds[0].revents & POLLIN) == 0 {
                continue;
            }

            // SAFETY: self.0 is valid, buf is mutable and the length passed
            // matches its size. The return value is checked.
            let n = unsafe { libc::recv(self.0, buf.as_mut_ptr() as *mut c_void, buf.len(), 0) };
            if n < 0 {
                return Err(MonitorError::Recv(io::Error::last_os_error()));
            }
            let n = n as usize;
            trace!(
                event.name = "link_monitor.frame_received",
                bytes = n,
                "received netlink data"
            );
            return Ok(Wakeup::Data(n));
        }
    }
}

impl Drop for NetlinkSocket {
    fn drop(&mut self) {
        // SAFETY: self.0 is a valid descriptor that we own and are done
        // using.
        unsafe {
            libc::close(self.0);
        }
        trace!(
            event.name = "link_monitor.channel_closed",
            socket_fd = self.0,
            "netlink socket closed"
        );
    }
}

/// RAII wrapper for the eventfd used to interrupt the blocking wait.
/// Automatically closes the eventfd when dropped.
pub struct ShutdownEventFd(RawFd);

impl ShutdownEventFd {
    pub fn new() -> Result<Self, MonitorError> {
        // SAFETY: eventfd() is safe to call, we check for errors.
        let fd = unsafe { libc::eventfd(0, EFD_NONBLOCK) };
        if fd < 0 {
            return Err(MonitorError::EventFd(io::Error::last_os_error()));
        }
        Ok(Self(fd))
    }

    fn as_raw_fd(&self) -> RawFd {
        self.0
    }

    /// Wake the blocked wait by writing to the eventfd.
    pub fn signal(&self) -> Result<(), io::Error> {
        let val: u64 = 1;
        // SAFETY: self.0 is valid, val is properly initialized.
        let ret = unsafe {
            libc::write(
                self.0,
                &val as *const u64 as *const c_void,
                mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for ShutdownEventFd {
    fn drop(&mut self) {
        // SAFETY: self.0 is a valid descriptor that we own.
        unsafe {
            libc::close(self.0);
        }
    }
}
