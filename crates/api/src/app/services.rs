//! Store selection and the service bundle shared by every handler.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use stockroom_infra::catalog::{
    CatalogService, CatalogStore, InMemoryCatalogStore, PostgresCatalogStore,
};
use stockroom_infra::stock::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};
use stockroom_infra::{db, InventoryReports, MovementProcessor};

use crate::config::DatabaseConfig;

pub const TOPIC_MOVEMENT_RECORDED: &str = "movement.recorded";
pub const TOPIC_CATALOG_CHANGED: &str = "catalog.changed";

const REALTIME_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub topic: &'static str,
    pub payload: serde_json::Value,
}

pub struct AppServices {
    pub catalog: CatalogService,
    pub processor: MovementProcessor,
    pub reports: InventoryReports,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn new(catalog: Arc<dyn CatalogStore>, inventory: Arc<dyn InventoryStore>) -> Self {
        let (realtime_tx, _) = broadcast::channel(REALTIME_CAPACITY);
        Self {
            catalog: CatalogService::new(catalog.clone()),
            processor: MovementProcessor::new(catalog.clone(), inventory.clone()),
            reports: InventoryReports::new(catalog, inventory),
            realtime_tx,
        }
    }

    /// Notify SSE subscribers. Lossy: nobody listening is not an error.
    pub fn publish(&self, topic: &'static str, payload: impl Serialize) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, topic, "failed to serialize realtime payload");
                return;
            }
        };
        let _ = self.realtime_tx.send(RealtimeMessage { topic, payload });
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }
}

/// Postgres when a database is configured, in-memory otherwise.
pub async fn build_services(database: Option<&DatabaseConfig>) -> anyhow::Result<AppServices> {
    let Some(database) = database else {
        tracing::info!("DATABASE_URL not set; using in-memory stores");
        return Ok(AppServices::new(
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryInventoryStore::new()),
        ));
    };

    let pool = db::connect(&database.url, database.max_connections).await?;
    db::run_migrations(&pool).await?;
    tracing::info!(max_connections = database.max_connections, "using postgres stores");

    Ok(AppServices::new(
        Arc::new(PostgresCatalogStore::new(pool.clone())),
        Arc::new(PostgresInventoryStore::new(pool)),
    ))
}

/// The server's local time; "today" and day buckets follow it.
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

pub fn sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    // Lagged receivers skip what they missed instead of closing the stream.
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
