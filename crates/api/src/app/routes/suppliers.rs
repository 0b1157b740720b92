use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

use stockroom_auth::Permission;
use stockroom_catalog::{SupplierPatch, NewSupplier};
use stockroom_core::SupplierId;

use crate::app::dto;
use crate::app::routes::reply;
use crate::app::services::{AppServices, TOPIC_CATALOG_CHANGED};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route("/:id", put(update_supplier).delete(delete_supplier))
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.catalog.list_suppliers().await)
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let input: NewSupplier = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.create_supplier(input).await;
    if let Ok(supplier) = &result {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "supplier", "action": "created", "id": supplier.id}),
        );
    }
    reply(StatusCode::CREATED, result)
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: SupplierId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch: SupplierPatch = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.update_supplier(id, patch).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "supplier", "action": "updated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_DELETE) {
        return resp;
    }
    let id: SupplierId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.deactivate_supplier(id).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "supplier", "action": "deactivated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}
