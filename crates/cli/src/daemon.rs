//! Process lifecycle: shutdown signals and bounded draining.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};

/// Resolves on SIGINT, SIGTERM, SIGHUP or SIGQUIT.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use signal::unix::SignalKind;

        let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
        let mut sighup = register(SignalKind::hangup(), "SIGHUP");
        let mut sigquit = register(SignalKind::quit(), "SIGQUIT");
        tokio::select! {
            _ = ctrl_c() => info!("Received SIGINT, shutting down"),
            _ = recv(&mut sigterm) => info!("Received SIGTERM, shutting down"),
            _ = recv(&mut sighup) => info!("Received SIGHUP, shutting down"),
            _ = recv(&mut sigquit) => info!("Received SIGQUIT, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
        info!("Received Ctrl-C, shutting down");
    }
}

#[cfg(unix)]
fn register(kind: signal::unix::SignalKind, name: &str) -> Option<signal::unix::Signal> {
    signal::unix::signal(kind)
        .map_err(|e| warn!("Failed to register {name} handler: {e}"))
        .ok()
}

/// Waits on a registered signal; never resolves when registration failed.
#[cfg(unix)]
async fn recv(stream: &mut Option<signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}

/// Awaits `task`, giving up after `limit`. Returns `false` on timeout.
pub async fn drain<F: Future>(name: &str, task: F, limit: Duration) -> bool {
    match tokio::time::timeout(limit, task).await {
        Ok(_) => true,
        Err(_) => {
            warn!("{name} did not stop within {}s", limit.as_secs());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_reports_completion() {
        assert!(drain("quick", async {}, Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn drain_gives_up_on_slow_task() {
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert!(!drain("slow", slow, Duration::from_millis(20)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unregistered_signal_never_fires() {
        let mut missing = None;
        let fired = tokio::time::timeout(Duration::from_millis(20), recv(&mut missing)).await;
        assert!(fired.is_err());
    }
}
