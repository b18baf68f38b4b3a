//! The receive/decode loop.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::MonitorError,
    link::{
        decode::decode,
        socket::{NetlinkSocket, RECV_BUFFER_LEN, ShutdownEventFd, Wakeup},
    },
};

/// Long-running observer for interface link-state transitions.
///
/// Owns the channel for the process lifetime and reuses one receive buffer
/// across iterations, bounding memory to a single frame at a time.
pub struct LinkMonitor {
    socket: NetlinkSocket,
    shutdown: Arc<ShutdownEventFd>,
    buf: Vec<u8>,
}

impl LinkMonitor {
    /// Open the channel and prepare the receive loop.
    pub fn new() -> Result<Self, MonitorError> {
        Ok(Self {
            socket: NetlinkSocket::open()?,
            shutdown: Arc::new(ShutdownEventFd::new()?),
            buf: vec![0u8; RECV_BUFFER_LEN],
        })
    }

    /// Handle used to interrupt [`run`](Self::run) from another thread.
    pub fn shutdown_handle(&self) -> Arc<ShutdownEventFd> {
        Arc::clone(&self.shutdown)
    }

    /// Receive and report events until shutdown is signaled or the channel
    /// fails.
    ///
    /// Every decoded transition is emitted as one line naming the interface
    /// and its new state, in the order the kernel sent them. An in-stream
    /// error message abandons the rest of the current frame only; channel
    /// failures end the loop.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        loop {
            match self
                .socket
                .wait_for_event(&self.shutdown, &mut self.buf)?
            {
                Wakeup::Shutdown => {
                    info!(
                        event.name = "link_monitor.shutdown",
                        "shutdown signal received, exiting gracefully"
                    );
                    return Ok(());
                }
                Wakeup::Data(len) => {
                    for item in decode(&self.buf[..len]) {
                        match item {
                            Ok(event) => info!(
                                event.name = "link_monitor.link_state_changed",
                                network.interface.name = %event.name,
                                network.interface.index = event.index,
                                "{}",
                                event
                            ),
                            Err(e) => warn!(
                                event.name = "link_monitor.decode_error",
                                error = %e,
                                "abandoning remainder of frame"
                            ),
                        }
                    }
                }
            }
        }
    }
}
