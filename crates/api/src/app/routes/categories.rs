use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;

use stockroom_auth::Permission;
use stockroom_catalog::{CategoryPatch, NewCategory};
use stockroom_core::CategoryId;

use crate::app::dto;
use crate::app::routes::reply;
use crate::app::services::{AppServices, TOPIC_CATALOG_CHANGED};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    reply(StatusCode::OK, services.catalog.list_categories().await)
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let input: NewCategory = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.create_category(input).await;
    if let Ok(category) = &result {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "category", "action": "created", "id": category.id}),
        );
    }
    reply(StatusCode::CREATED, result)
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: CategoryId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch: CategoryPatch = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.update_category(id, patch).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "category", "action": "updated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_DELETE) {
        return resp;
    }
    let id: CategoryId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.deactivate_category(id).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "category", "action": "deactivated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}
