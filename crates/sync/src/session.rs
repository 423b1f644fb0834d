//! Session signal and the task that binds it to the sync engine
//!
//! The authentication provider is an external collaborator; the engine only
//! needs "who is signed in right now" and a change notification.

use crate::engine::{CollectionSync, LoadReport};
use crate::model::{Session, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Current-identity-or-none with change notification
pub trait SessionSignal: Send + Sync {
    fn current(&self) -> Session;

    /// Receiver woken on every change; dropping it unsubscribes
    fn subscribe(&self) -> watch::Receiver<Session>;
}

/// In-process session signal
///
/// Login, signup and logout in the authentication provider reduce to
/// `sign_in` and `sign_out` here.
pub struct WatchSessionSignal {
    tx: watch::Sender<Session>,
}

impl WatchSessionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::Anonymous);
        Self { tx }
    }

    pub fn sign_in(&self, user_id: UserId) {
        info!(user_id = %user_id, "User signed in");
        self.tx.send_replace(Session::Authenticated(user_id));
    }

    pub fn sign_out(&self) {
        info!("User signed out");
        self.tx.send_replace(Session::Anonymous);
    }
}

impl Default for WatchSessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignal for WatchSessionSignal {
    fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

/// Background task feeding session changes into a `CollectionSync`
///
/// Each transition is applied as soon as it is observed; the resulting load
/// runs on its own task so a slow load never delays the next transition.
pub struct SessionBinder {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
    reports: mpsc::UnboundedReceiver<LoadReport>,
}

impl SessionBinder {
    /// Apply the signal's current session and keep following it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(sync: CollectionSync, signal: &dyn SessionSignal) -> Self {
        let mut rx = signal.subscribe();
        let (report_tx, reports) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        let initial = rx.borrow_and_update().clone();
        Self::transition(&sync, initial, &report_tx);

        let stop = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            debug!("Session signal closed; binder exiting");
                            break;
                        }
                        let session = rx.borrow_and_update().clone();
                        Self::transition(&sync, session, &report_tx);
                    }
                    _ = stop.notified() => {
                        debug!("Session binder shut down");
                        break;
                    }
                }
            }
        });

        Self {
            handle,
            shutdown,
            reports,
        }
    }

    fn transition(
        sync: &CollectionSync,
        session: Session,
        report_tx: &mpsc::UnboundedSender<LoadReport>,
    ) {
        if let Some(load) = sync.begin_session(session) {
            let report_tx = report_tx.clone();
            tokio::spawn(async move {
                let report = load.run().await;
                if report_tx.send(report).is_err() {
                    debug!("Load report dropped; binder is gone");
                }
            });
        }
    }

    /// Next finished load, `None` once the binder and all loads are gone
    pub async fn next_report(&mut self) -> Option<LoadReport> {
        self.reports.recv().await
    }

    /// Stop following the signal
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            warn!("Session binder task failed: {}", e);
        }
    }
}
