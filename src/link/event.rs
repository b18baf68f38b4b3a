//! Link-state event types and flag-bit state derivation.

use std::fmt;

/// Interface flag bit marking the interface as up (IFF_UP).
pub const IFF_UP: u32 = 0x1;

/// Up/down classification of an interface, derived from its flag bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    /// An interface is up exactly when the IFF_UP bit is set.
    pub fn from_flags(flags: u32) -> Self {
        if flags & IFF_UP != 0 {
            Self::Up
        } else {
            Self::Down
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// One reported link-state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    /// Interface name from the link message attributes
    pub name: String,
    /// Interface index
    pub index: i32,
    /// State after the transition
    pub state: LinkState,
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interface {} is now {}", self.name, self.state)
    }
}
