use std::sync::Arc;

use serde_json::Value as JsonValue;

use dealspark_events::{EventEnvelope, InMemoryEventBus};
use dealspark_infra::{
    CatalogService, CatalogStore, FakePaymentGateway, LogNotificationSink, NegotiationEngine,
    NotificationSink, NotificationWorker, OrderService, PaymentGateway,
    command_dispatcher::{CommandDispatcher, SharedDispatcher},
    event_store::{EventStore, InMemoryEventStore},
    workers::WorkerHandle,
};

#[cfg(feature = "postgres")]
use dealspark_infra::event_store::PostgresEventStore;

use crate::config::ApiConfig;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub engine: NegotiationEngine,
    pub catalog: Arc<CatalogService>,
    pub orders: OrderService,
    pub payments: Arc<dyn PaymentGateway>,
    // Kept so the worker's lifetime is tied to the services.
    _notifications: WorkerHandle,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("engine", &self.engine)
            .field("catalog", &self.catalog)
            .field("orders", &self.orders)
            .finish_non_exhaustive()
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store = event_store(config).await?;
    build_services_with(store, Arc::new(LogNotificationSink))
}

async fn event_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn EventStore>> {
    if config.use_persistent_stores {
        #[cfg(feature = "postgres")]
        {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for persistent stores"))?;
            let pool = sqlx::PgPool::connect(url).await?;
            let store = PostgresEventStore::new(pool);
            store.migrate().await?;
            tracing::info!("using postgres event store");
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
        }
    }

    Ok(Arc::new(InMemoryEventStore::new()))
}

/// Wire services over an event store, replay existing streams and start the
/// notification worker.
pub fn build_services_with(
    store: Arc<dyn EventStore>,
    sink: Arc<dyn NotificationSink>,
) -> anyhow::Result<AppServices> {
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
    let dispatcher: Arc<SharedDispatcher> = Arc::new(CommandDispatcher::new(store, bus.clone()));

    let catalog = Arc::new(CatalogService::new(dispatcher.clone()));
    let engine = NegotiationEngine::new(dispatcher.clone(), catalog.clone() as Arc<dyn CatalogStore>);
    let orders = OrderService::new(dispatcher);

    // Catalog first: nothing else depends on replay order, but product names
    // should be resolvable as soon as offers are.
    let products = catalog.rebuild()?;
    let offers = engine.rebuild()?;
    let order_events = orders.rebuild()?;
    tracing::info!(products, offers, orders = order_events, "read models rebuilt");

    let notifications = NotificationWorker::spawn(&bus, catalog.clone(), sink)?;

    Ok(AppServices {
        engine,
        catalog,
        orders,
        payments: Arc::new(FakePaymentGateway::new()),
        _notifications: notifications,
    })
}
