//! Link-state observation over the kernel's rtnetlink event channel.
//!
//! [`socket`] blocks on the channel and hands each received frame to
//! [`decode`], which walks the chained messages and their attribute
//! records into [`event`] values. [`monitor`] drives the loop and emits
//! one log line per transition.

pub mod attr;
pub mod decode;
pub mod event;
pub mod frame;
pub mod monitor;
pub mod socket;

pub use monitor::LinkMonitor;
pub use socket::ShutdownEventFd;
