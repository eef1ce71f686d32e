//! Dedicated I/O thread driving all socket work for one client or server.
//!
//! A [`Reactor`] runs a current-thread Tokio runtime on its own OS thread.
//! Other threads never touch sockets directly; they marshal work onto the
//! reactor with [`Reactor::spawn`] or through channels drained by tasks
//! already running there.

use std::{
    future::Future,
    io,
    thread::{self, JoinHandle},
    time::Duration,
};

use tokio::runtime::{Builder, Handle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, warn};

/// How long `stop` lets tracked tasks wind down before dropping them.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// A single event-loop thread.
pub(crate) struct Reactor {
    name: String,
    handle: Handle,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    thread: Option<JoinHandle<()>>,
}

impl Reactor {
    /// Build the runtime and start its thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or the thread cannot
    /// be spawned.
    pub(crate) fn start(name: &str) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let thread = thread::Builder::new().name(name.to_owned()).spawn({
            let shutdown = shutdown.clone();
            let tracker = tracker.clone();
            let name = name.to_owned();
            move || {
                let task_name = name.clone();
                runtime.block_on(async move {
                    shutdown.cancelled().await;
                    tracker.close();
                    if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait())
                        .await
                        .is_err()
                    {
                        warn!(
                            reactor = %task_name,
                            remaining = tracker.len(),
                            "tasks still running at shutdown, dropping them"
                        );
                    }
                });
                debug!(reactor = %name, "reactor thread exiting");
            }
        })?;

        Ok(Self {
            name: name.to_owned(),
            handle,
            shutdown,
            tracker,
            thread: Some(thread),
        })
    }

    /// Run `task` on the reactor thread.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn_on(task, &self.handle);
    }

    /// Runtime handle, for entering the reactor's context.
    pub(crate) fn handle(&self) -> &Handle { &self.handle }

    /// Token cancelled when the reactor stops.
    pub(crate) fn shutdown_token(&self) -> &CancellationToken { &self.shutdown }

    /// Tracker owning every task spawned on this reactor.
    pub(crate) fn tracker(&self) -> &TaskTracker { &self.tracker }

    /// Stop the event loop and join its thread. Idempotent.
    ///
    /// Called from the reactor thread itself, the loop is told to stop but
    /// the thread is detached rather than joined.
    pub(crate) fn stop(&mut self) {
        self.shutdown.cancel();
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            warn!(reactor = %self.name, "stop called on reactor thread; detaching");
            return;
        }
        if thread.join().is_err() {
            error!(reactor = %self.name, "reactor thread panicked");
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) { self.stop(); }
}
