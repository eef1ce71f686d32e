//! Connection lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`super::Connection`].
///
/// Transitions only move forward: `Connecting → Connected → Closed`, or
/// straight from `Connecting` to `Closed`. A closed connection is never
/// reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket not yet attached (client connect in flight, or a freshly
    /// accepted socket awaiting admission).
    Connecting,
    /// Pumps are running.
    Connected,
    /// Socket closed by error, peer, or request.
    Closed,
}

impl ConnectionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Connected => 1,
            Self::Closed => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Connected,
            _ => Self::Closed,
        }
    }
}

/// Atomic cell holding a [`ConnectionState`].
#[derive(Debug)]
pub(super) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(super) fn new() -> Self { Self(AtomicU8::new(ConnectionState::Connecting.as_u8())) }

    pub(super) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from `Connecting` to `Connected`. Returns `false` if the
    /// connection was closed first.
    pub(super) fn mark_connected(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Connecting.as_u8(),
                ConnectionState::Connected.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closed`. Returns `true` only for the call that performed the
    /// transition.
    pub(super) fn mark_closed(&self) -> bool {
        self.0.swap(ConnectionState::Closed.as_u8(), Ordering::AcqRel)
            != ConnectionState::Closed.as_u8()
    }
}
