//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP refreshes the route table, not the process

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::event::{EventBus, GatewayEvent};
use crate::lifecycle::Shutdown;

#[cfg(unix)]
async fn wait_for_signal(events: &EventBus) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
        (Ok(term), Ok(hup)) => (term, hup),
        (Err(e), _) | (_, Err(e)) => {
            error!(error = %e, "Failed to install signal handlers, only Ctrl+C will stop the gateway");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT received");
                return;
            }
            _ = term.recv() => {
                info!("SIGTERM received");
                return;
            }
            _ = hup.recv() => {
                info!("SIGHUP received, refreshing routes");
                events.publish(GatewayEvent::RefreshRoutes);
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal(_events: &EventBus) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Ctrl+C received");
}

/// Trigger `shutdown` on SIGINT/SIGTERM; publish `RefreshRoutes` on SIGHUP.
pub fn spawn_signal_handler(events: EventBus, shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal(&events).await;
        info!("Initiating graceful shutdown");
        shutdown.trigger();
    })
}
