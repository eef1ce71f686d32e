//! Insertion-ordered registry of accepted connections.
//!
//! The registry holds strong references; inbound messages only carry weak
//! [`crate::connection::Remote`] handles, so removing an entry lets the
//! connection drop once its pumps finish. No method calls out to
//! application code while the lock is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connection::{Connection, ConnectionId};

#[derive(Debug, Default)]
pub(super) struct Registry(Mutex<Vec<Arc<Connection>>>);

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Connection>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn insert(&self, connection: Arc<Connection>) { self.lock().push(connection); }

    /// First entry carrying `id`.
    pub(super) fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.lock().iter().find(|c| c.id() == id).cloned()
    }

    pub(super) fn ids(&self) -> Vec<ConnectionId> { self.lock().iter().map(|c| c.id()).collect() }

    pub(super) fn len(&self) -> usize { self.lock().len() }

    /// Remove the entry that is `connection` itself, matching by identity.
    ///
    /// Returns `false` if it was already gone.
    pub(super) fn remove(&self, connection: &Arc<Connection>) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|c| Arc::ptr_eq(c, connection)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(super) fn remove_id(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut entries = self.lock();
        let index = entries.iter().position(|c| c.id() == id)?;
        Some(entries.remove(index))
    }

    /// Split entries into live and closed, dropping the closed ones from the
    /// registry in a single pass.
    pub(super) fn sweep(&self) -> (Vec<Arc<Connection>>, Vec<Arc<Connection>>) {
        let mut entries = self.lock();
        let mut live = Vec::with_capacity(entries.len());
        let mut dead = Vec::new();
        entries.retain(|c| {
            if c.is_closed() {
                dead.push(Arc::clone(c));
                false
            } else {
                live.push(Arc::clone(c));
                true
            }
        });
        (live, dead)
    }

    pub(super) fn drain(&self) -> Vec<Arc<Connection>> { std::mem::take(&mut *self.lock()) }
}
