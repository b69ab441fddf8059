//! Caching route locator.
//!
//! # Responsibilities
//! - Memoize the delegate's routes, sorted by route order
//! - Drop the memoized table on `refresh()`
//!
//! # Design Decisions
//! - The table is swapped whole through `ArcSwapOption`; readers never see a
//!   partially rebuilt table
//! - Each rebuild is tagged with the epoch it started in. A rebuild that
//!   races a refresh still serves its caller but is not stored, so a refresh
//!   can never be undone by a rebuild that began before it
//! - Rebuilds are serialised; concurrent misses wait for one compilation
//!   instead of compiling the table N times
//!
//! # Data Flow
//! ```text
//! snapshot() ──hit──→ Arc<[Arc<Route>]>
//!     │miss
//!     ▼
//! delegate.routes() → stable sort by order → store (if epoch unchanged)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Route, RouteLocator};
use crate::observability::metrics;

struct Snapshot {
    epoch: u64,
    routes: Arc<[Arc<Route>]>,
}

pub struct CachingRouteLocator {
    delegate: Arc<dyn RouteLocator>,
    cache: ArcSwapOption<Snapshot>,
    epoch: AtomicU64,
    rebuild: Mutex<()>,
}

impl CachingRouteLocator {
    pub fn new(delegate: Arc<dyn RouteLocator>) -> Self {
        Self {
            delegate,
            cache: ArcSwapOption::empty(),
            epoch: AtomicU64::new(0),
            rebuild: Mutex::new(()),
        }
    }

    fn cached(&self, epoch: u64) -> Option<Arc<[Arc<Route>]>> {
        let current = self.cache.load_full()?;
        (current.epoch == epoch).then(|| current.routes.clone())
    }

    /// The current route table in match order.
    pub async fn snapshot(&self) -> Arc<[Arc<Route>]> {
        let epoch = self.epoch.load(Ordering::Acquire);
        if let Some(routes) = self.cached(epoch) {
            return routes;
        }

        let _guard = self.rebuild.lock().await;
        let epoch = self.epoch.load(Ordering::Acquire);
        if let Some(routes) = self.cached(epoch) {
            return routes;
        }

        let mut routes = self.delegate.routes().await;
        routes.sort_by_key(|route| route.order());
        let routes: Arc<[Arc<Route>]> = routes.into();

        if self.epoch.load(Ordering::Acquire) == epoch {
            self.cache.store(Some(Arc::new(Snapshot {
                epoch,
                routes: routes.clone(),
            })));
            debug!(routes = routes.len(), epoch, "Route table cached");
        } else {
            debug!(epoch, "Route table refreshed during rebuild, not caching");
        }
        routes
    }

    /// Invalidate the cached table; the next lookup recompiles.
    pub fn refresh(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.cache.store(None);
        metrics::record_refresh();
        info!(epoch, "Route table invalidated");
    }
}

#[async_trait]
impl RouteLocator for CachingRouteLocator {
    async fn routes(&self) -> Vec<Arc<Route>> {
        self.snapshot().await.to_vec()
    }
}
