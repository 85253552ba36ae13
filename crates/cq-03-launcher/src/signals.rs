//! OS signal wiring for the launcher.

use crate::supervisor::{LauncherHandle, StopRequest};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Exit status used when a second stop request aborts a graceful stop.
pub const ESCALATED_EXIT_CODE: i32 = 137;

/// Turn INT/TERM into launcher stop requests.
///
/// The first signal starts a graceful stop. A second one while workers are
/// still stopping terminates the launcher process at once.
pub fn spawn_signal_listener(handle: LauncherHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    None
                }
            };

        loop {
            #[cfg(unix)]
            let received = tokio::select! {
                r = tokio::signal::ctrl_c() => r.map(|()| "SIGINT"),
                Some(()) = async {
                    match sigterm.as_mut() {
                        Some(s) => s.recv().await,
                        None => std::future::pending().await,
                    }
                } => Ok("SIGTERM"),
            };
            #[cfg(not(unix))]
            let received = tokio::signal::ctrl_c().await.map(|()| "Ctrl+C");

            let name = match received {
                Ok(name) => name,
                Err(e) => {
                    error!(error = %e, "Failed to listen for shutdown signals");
                    return;
                }
            };

            info!(signal = name, "Received shutdown signal");
            if handle.request_stop() == StopRequest::Escalated {
                warn!("Second shutdown signal, terminating immediately");
                std::process::exit(ESCALATED_EXIT_CODE);
            }
        }
    })
}
