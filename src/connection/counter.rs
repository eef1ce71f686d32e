//! RAII guard for the active-connections gauge.

/// Increments the active-connections gauge on creation and decrements it on
/// drop.
///
/// Held by the read pump, so the gauge tracks sockets rather than
/// `Connection` handles that outlive them.
pub(super) struct ActiveConnection;

impl ActiveConnection {
    pub(super) fn new() -> Self {
        crate::metrics::inc_connections();
        Self
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) { crate::metrics::dec_connections(); }
}
