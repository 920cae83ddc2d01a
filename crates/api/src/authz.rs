//! Per-route permission checks.

use axum::http::StatusCode;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Require a permission on the current principal, or produce a 403 response.
pub fn require(
    principal: &PrincipalContext,
    permission: &str,
) -> Result<(), axum::response::Response> {
    if principal.grants(permission) {
        Ok(())
    } else {
        Err(errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("missing permission: {permission}"),
        ))
    }
}
