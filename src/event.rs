//! Gateway events.
//!
//! # Responsibilities
//! - Carry the route refresh signal from its sources (config reload, SIGHUP,
//!   admin API) to the caching locator
//! - Announce argument binding for observability
//!
//! # Design Decisions
//! - `tokio::sync::broadcast` for observers: publishers never block and never
//!   fail when no one listens
//! - Refresh travels on its own `watch` channel. Binding events can flood the
//!   broadcast ring on a large table; a lagging observer must never turn that
//!   into an invalidation
//! - Refresh signals coalesce: several refreshes before the listener wakes
//!   produce one invalidation

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::definition::Args;
use crate::route::CachingRouteLocator;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Invalidate the cached route table.
    RefreshRoutes,

    /// Predicate arguments were bound for a route.
    PredicateArgs {
        route_id: String,
        name: String,
        args: Args,
    },

    /// Filter arguments were bound for a route.
    FilterArgs {
        route_id: String,
        name: String,
        args: Args,
    },
}

/// Broadcast bus for `GatewayEvent`s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatewayEvent>,
    /// Refresh generation, bumped on every `RefreshRoutes`.
    refresh: Arc<watch::Sender<u64>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        let (refresh, _) = watch::channel(0);
        Self {
            tx,
            refresh: Arc::new(refresh),
        }
    }

    pub fn publish(&self, event: GatewayEvent) {
        debug!(event = ?event, "Publishing gateway event");
        if event == GatewayEvent::RefreshRoutes {
            self.refresh.send_modify(|generation| *generation += 1);
        }
        let _ = self.tx.send(event);
    }

    /// Every event, refreshes included. Slow receivers may lag.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    /// Refresh signals only; never lags.
    pub fn refresh_signal(&self) -> watch::Receiver<u64> {
        self.refresh.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Refresh `locator` on every refresh signal until shutdown.
pub fn spawn_refresh_listener(
    bus: &EventBus,
    locator: Arc<CachingRouteLocator>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let mut refreshes = bus.refresh_signal();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                changed = refreshes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let generation = *refreshes.borrow_and_update();
                    info!(generation, "Refreshing routes");
                    locator.refresh();
                }
            }
        }
        debug!("Refresh listener stopped");
    })
}
