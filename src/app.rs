use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::booking::{BookingGateway, BookingViews, Lifecycle, PaymentHandler};
use crate::bookmark::Bookmarks;
use crate::chat::ChatService;
use crate::config::Config;
use crate::maintenance;
use crate::notify::NotifyHub;
use crate::observability;
use crate::property::PropertyCatalog;
use crate::store::Store;

/// Every service over one store, plus the background compactor.
/// Dropping it stops the compactor.
pub struct Marketplace {
    pub config: Config,
    pub store: Arc<Store>,
    pub catalog: PropertyCatalog,
    pub bookings: BookingGateway,
    pub payments: PaymentHandler,
    pub lifecycle: Lifecycle,
    pub views: BookingViews,
    pub bookmarks: Bookmarks,
    pub chats: ChatService,
    compactor: JoinHandle<()>,
}

impl Marketplace {
    /// Open (or create) the data directory and replay its WAL.
    pub fn open(config: Config) -> std::io::Result<Self> {
        observability::init_tracing();
        if let Err(e) = observability::init(config.metrics_port) {
            warn!("metrics exporter not installed: {e}");
        }

        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(Store::open(config.wal_path(), Arc::new(NotifyHub::new()))?);
        let compactor = maintenance::spawn_compactor(&store, config.compact_threshold);

        info!("leasebook opened {}", config.wal_path().display());
        info!("  documents: {}", store.doc_count());
        info!("  compact_threshold: {}", config.compact_threshold);

        let bookings = BookingGateway::new(store.clone());
        Ok(Self {
            catalog: PropertyCatalog::new(store.clone()),
            payments: PaymentHandler::new(bookings.clone()),
            bookings,
            lifecycle: Lifecycle::new(store.clone()),
            views: BookingViews::new(store.clone()),
            bookmarks: Bookmarks::new(store.clone()),
            chats: ChatService::new(store.clone()),
            store,
            config,
            compactor,
        })
    }
}

impl Drop for Marketplace {
    fn drop(&mut self) {
        self.compactor.abort();
    }
}
