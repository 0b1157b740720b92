use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use stockroom_infra::ServiceError;

use crate::app::errors;

pub mod categories;
pub mod dashboard;
pub mod inventory;
pub mod movements;
pub mod products;
pub mod suppliers;
pub mod system;
pub mod warehouses;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/dashboard", dashboard::router())
        .nest("/categories", categories::router())
        .nest("/suppliers", suppliers::router())
        .nest("/warehouses", warehouses::router())
        .nest("/products", products::router())
        .nest("/movements", movements::router())
        .nest("/inventory", inventory::router())
}

/// Render a service result: `status` + JSON body on success, mapped error otherwise.
pub(crate) fn reply<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
