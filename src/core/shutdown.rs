//! Shutdown Coordination
//!
//! Signal handling and a broadcast channel that lets the run loop and any
//! interested background tasks observe a shutdown request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the broker
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Create a coordinator and its first receiver
    pub fn new() -> (Self, broadcast::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(8);
        let coordinator = Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        };
        (coordinator, shutdown_rx)
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger shutdown
    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Install signal handlers that trigger this coordinator
    pub fn install_signal_handlers(&self) {
        setup_signal_handlers(self.shutdown_tx.clone(), self.shutdown_requested.clone());
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>, shutdown_requested: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use tokio::signal::unix::{signal, SignalKind};
        for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
            let tx = shutdown_tx.clone();
            let requested = shutdown_requested.clone();
            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    sig.recv().await;
                    log::info!("Received shutdown signal");
                    requested.store(true, Ordering::Release);
                    let _ = tx.send(());
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received Ctrl-C");
                shutdown_requested.store(true, Ordering::Release);
                let _ = shutdown_tx.send(());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let (coordinator, mut first_rx) = ShutdownCoordinator::new();
        let mut second_rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_requested());
        coordinator.trigger_shutdown();
        assert!(coordinator.is_shutdown_requested());

        first_rx.recv().await.unwrap();
        second_rx.recv().await.unwrap();
    }
}
