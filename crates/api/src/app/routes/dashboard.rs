use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
    Router,
};

use stockroom_auth::Permission;

use crate::app::dto::RecentQuery;
use crate::app::routes::reply;
use crate::app::services::{local_now, AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/low-stock", get(low_stock))
        .route("/recent-movements", get(recent_movements))
        .route("/movements-today", get(movements_today))
}

pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.reports.dashboard_stats(local_now()).await)
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.reports.low_stock().await)
}

pub async fn recent_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<RecentQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.reports.recent_movements(query.limit).await)
}

pub async fn movements_today(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.reports.today_counts(local_now()).await)
}
