use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

use stockroom_auth::Permission;
use stockroom_catalog::{WarehousePatch, NewWarehouse};
use stockroom_core::WarehouseId;

use crate::app::dto;
use crate::app::routes::reply;
use crate::app::services::{AppServices, TOPIC_CATALOG_CHANGED};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/:id", put(update_warehouse).delete(delete_warehouse))
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.catalog.list_warehouses().await)
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let input: NewWarehouse = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.create_warehouse(input).await;
    if let Ok(warehouse) = &result {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "warehouse", "action": "created", "id": warehouse.id}),
        );
    }
    reply(StatusCode::CREATED, result)
}

pub async fn update_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: WarehouseId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch: WarehousePatch = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.update_warehouse(id, patch).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "warehouse", "action": "updated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}

pub async fn delete_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_DELETE) {
        return resp;
    }
    let id: WarehouseId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.deactivate_warehouse(id).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "warehouse", "action": "deactivated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}
