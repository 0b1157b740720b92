use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use stockroom_auth::Permission;
use stockroom_catalog::{NewProduct, Product, ProductDeactivation, ProductPatch};
use stockroom_core::ProductId;
use stockroom_infra::ServiceError;

use crate::app::dto::{self, PageQuery, ProductListQuery, ReasonBody};
use crate::app::routes::reply;
use crate::app::services::{local_now, AppServices, TOPIC_CATALOG_CHANGED};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/:id/reactivate", post(reactivate_product))
        .route("/:id/movement-summary", get(movement_summary))
        .route("/:id/audit", get(product_audit))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ProductListQuery>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let (filter, pagination) = match query.into_parts() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.reports.list_products(filter, pagination).await)
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let input: NewProduct = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.create_product(input).await;
    if let Ok(product) = &result {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "product", "action": "created", "id": product.id}),
        );
    }
    reply(StatusCode::CREATED, result)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let id: ProductId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.reports.product_with_inventory(id).await)
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_WRITE) {
        return resp;
    }
    let id: ProductId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch: ProductPatch = match dto::decode(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services.catalog.update_product(id, patch).await;
    if result.is_ok() {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "product", "action": "updated", "id": id}),
        );
    }
    reply(StatusCode::OK, result)
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::CATALOG_DELETE) {
        return resp;
    }
    let (id, reason) = match id_and_reason(&id, &body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .catalog
        .deactivate_product(id, principal.user_id(), reason)
        .await;
    toggled(&services, "deactivated", result)
}

pub async fn reactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::PRODUCTS_REACTIVATE) {
        return resp;
    }
    let (id, reason) = match id_and_reason(&id, &body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .catalog
        .reactivate_product(id, principal.user_id(), reason)
        .await;
    toggled(&services, "reactivated", result)
}

pub async fn movement_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let id: ProductId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        services.reports.product_movement_summary(id, local_now()).await,
    )
}

pub async fn product_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let id: ProductId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(
        StatusCode::OK,
        services.catalog.product_audit(id, page.pagination()).await,
    )
}

/// The reason body is optional; an empty request body means "no reason".
fn id_and_reason(raw_id: &str, body: &[u8]) -> Result<(ProductId, Option<String>), Response> {
    let id = dto::parse_id(raw_id)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok((id, None));
    }
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        crate::app::errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    })?;
    let ReasonBody { reason } = dto::decode_value(value)?;
    Ok((id, reason))
}

fn toggled(
    services: &AppServices,
    action: &'static str,
    result: Result<(Product, ProductDeactivation), ServiceError>,
) -> Response {
    let result = result.map(|(product, audit)| {
        services.publish(
            TOPIC_CATALOG_CHANGED,
            json!({"kind": "product", "action": action, "id": product.id}),
        );
        json!({ "product": product, "audit": audit })
    });
    reply(StatusCode::OK, result)
}
