//! Controller presence
//!
//! A swap may name the client that animates its cascade. The client keeps a
//! [`ControllerGuard`] for as long as it is connected; the driver holds the
//! matching [`Controller`] and stops waiting on falls once the guard is gone.

use tokio::sync::watch;

/// Held by the connected client. Dropping it marks the controller lost.
#[derive(Debug)]
pub struct ControllerGuard {
    presence: watch::Sender<()>,
}

impl ControllerGuard {
    /// A watcher for this guard
    pub fn controller(&self) -> Controller {
        Controller {
            presence: self.presence.subscribe(),
        }
    }
}

/// Engine-side view of a client's presence
#[derive(Debug, Clone)]
pub struct Controller {
    presence: watch::Receiver<()>,
}

impl Controller {
    pub fn new() -> (ControllerGuard, Controller) {
        let (presence, rx) = watch::channel(());
        (
            ControllerGuard {
                presence,
            },
            Controller { presence: rx },
        )
    }

    pub fn is_connected(&self) -> bool {
        self.presence.has_changed().is_ok()
    }

    /// Resolve once the guard has been dropped
    pub async fn lost(&mut self) {
        while self.presence.changed().await.is_ok() {}
    }
}

/// How the falls of an accepted swap's cascade get completed
#[derive(Debug, Clone, Default)]
pub enum FallAcks {
    /// Follow `EngineConfig::auto_falls`
    #[default]
    Configured,
    /// Never wait; nobody will report these falls
    Auto,
    /// Wait for reports while the controller stays connected
    Controller(Controller),
}
