use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};

use stockroom_auth::Permission;
use stockroom_core::{ProductId, WarehouseId};

use crate::app::dto;
use crate::app::routes::reply;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/warehouse/:id", get(by_warehouse))
        .route("/product/:id", get(by_product))
}

pub async fn by_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authz::require(&principal, &Permission::INVENTORY_READ) {
        return resp;
    }
    let id: WarehouseId = match dto::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    reply(StatusCode::OK, services.reports.inventory_by_warehouse(id).await)
}

pub async fn by_product(
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
    reply(StatusCode::OK, services.reports.inventory_by_product(id).await)
}
