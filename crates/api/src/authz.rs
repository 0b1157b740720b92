//! Route-level permission guard.
//!
//! Handlers call [`require`] before touching a service, so the services stay
//! auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use stockroom_auth::{authorize, Permission};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(principal.principal(), permission).map_err(|e| {
        tracing::warn!(
            user_id = %principal.user_id(),
            permission = permission.as_str(),
            "permission denied"
        );
        json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}
