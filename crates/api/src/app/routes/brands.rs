use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use brandhub_core::BrandId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_brand).get(list_brands))
        .route("/:id", get(show_brand).put(update_brand).delete(delete_brand))
        .route("/:id/change-status", put(change_brand_status))
}

pub async fn create_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    multipart: Multipart,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, "create-brand") {
        return resp;
    }

    let (draft, file) = match dto::read_brand_form(multipart).await {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    match services.brands.create_brand(draft, file) {
        Ok(brand) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "data": dto::brand_to_json(&brand),
                "message": "brand created",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_brands(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ListBrandsQuery>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, "list-brand") {
        return resp;
    }

    let query = match query.into_query() {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match services.brands.list_brands(&query) {
        Ok(page) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": dto::brand_page_to_json(page),
                "message": "brands retrieved",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn show_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, "list-brand") {
        return resp;
    }

    let id: BrandId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid brand id"),
    };

    match services.brands.show_brand(id) {
        Ok(brand) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": dto::brand_to_json(&brand),
                "message": "brand details",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, "update-brand") {
        return resp;
    }

    let id: BrandId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid brand id"),
    };

    let (draft, file) = match dto::read_brand_form(multipart).await {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };

    match services.brands.update_brand(id, draft, file) {
        Ok(brand) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": dto::brand_to_json(&brand),
                "message": "brand updated",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, "delete-brand") {
        return resp;
    }

    let id: BrandId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid brand id"),
    };

    match services.brands.delete_brand(id) {
        Ok(brand) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": dto::brand_to_json(&brand),
                "message": "brand deleted",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn change_brand_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, "update-brand") {
        return resp;
    }

    let id: BrandId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid brand id"),
    };

    match services.brands.change_brand_status(id) {
        Ok(brand) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": dto::brand_to_json(&brand),
                "message": "brand status changed",
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
