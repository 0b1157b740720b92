use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::get,
    Json, Router,
};

use stockroom_auth::Permission;
use stockroom_core::ProductId;
use stockroom_inventory::MovementRequest;

use crate::app::dto::{self, MovementListQuery};
use crate::app::routes::reply;
use crate::app::services::{local_now, AppServices, TOPIC_MOVEMENT_RECORDED};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_movements).post(record_movement))
        .route("/product/:product_id", get(product_movements))
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<MovementListQuery>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let (filter, pagination) = match query.into_parts(local_now()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.reports.list_movements(filter, pagination).await)
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::MOVEMENTS_CREATE) {
        return resp;
    }
    let request: MovementRequest = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.processor.record(request, principal.user_id()).await;
    if let Ok(movement) = &result {
        services.publish(TOPIC_MOVEMENT_RECORDED, movement);
    }
    reply(StatusCode::CREATED, result)
}

pub async fn product_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let product_id: ProductId = match dto::parse_id(&product_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.reports.product_movements(product_id).await)
}
