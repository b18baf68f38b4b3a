// Error types for linkwatch

use std::io;

use thiserror::Error;

/// Fatal channel and setup failures. Any of these ends the process.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Failed to create the netlink socket
    #[error("failed to open netlink socket: {0}")]
    SocketOpen(#[source] io::Error),

    /// Failed to bind the netlink socket
    #[error("failed to bind netlink socket: {0}")]
    SocketBind(#[source] io::Error),

    /// Failed to join the link multicast group
    #[error("failed to subscribe to link events: {0}")]
    GroupSubscribe(#[source] io::Error),

    /// Failed to create the shutdown eventfd
    #[error("failed to create shutdown eventfd: {0}")]
    EventFd(#[source] io::Error),

    /// poll() on the channel failed
    #[error("polling error: {0}")]
    Poll(#[source] io::Error),

    /// poll() reported an error condition on a watched descriptor
    #[error("channel error state (revents {revents:#06x})")]
    ChannelState { revents: i16 },

    /// Reading from the netlink socket failed
    #[error("error receiving message: {0}")]
    Recv(#[source] io::Error),
}
