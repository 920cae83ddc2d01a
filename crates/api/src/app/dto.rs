use std::path::PathBuf;

use axum::extract::multipart::Multipart;
use axum::http::StatusCode;
use serde::Deserialize;

use brandhub_brands::{Brand, BrandDraft, BrandType};
use brandhub_infra::{BrandQuery, Page, SortField, SortOrder};

use crate::app::errors;
use crate::app::services::UploadedFile;

// -------------------------
// Request DTOs
// -------------------------

/// Raw listing query parameters. Sort field and order arrive as strings and
/// are validated against the allow-list when converted.
#[derive(Debug, Default, Deserialize)]
pub struct ListBrandsQuery {
    pub page: Option<u32>,
    #[serde(rename = "perPage")]
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    #[serde(rename = "type")]
    pub brand_type: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListBrandsQuery {
    pub fn into_query(self) -> Result<BrandQuery, axum::response::Response> {
        let sort_by = match self.sort_by.as_deref() {
            Some(s) => s
                .parse::<SortField>()
                .map_err(errors::domain_error_to_response)?,
            None => SortField::default(),
        };
        let order = match self.order.as_deref() {
            Some(s) => s
                .parse::<SortOrder>()
                .map_err(errors::domain_error_to_response)?,
            None => SortOrder::default(),
        };
        let brand_type = match self.brand_type.as_deref() {
            Some(s) => Some(
                s.parse::<BrandType>()
                    .map_err(errors::domain_error_to_response)?,
            ),
            None => None,
        };

        Ok(BrandQuery {
            search: self.search,
            is_active: self.is_active,
            brand_type,
            page: self.page.unwrap_or(0),
            per_page: self.per_page.unwrap_or(0),
            sort_by,
            order,
        })
    }
}

// -------------------------
// Multipart form
// -------------------------

/// Read a brand create/update form: text fields `name`, `type`, `is_active`
/// and an optional `file` part holding the icon image.
///
/// The file bytes are spooled to a temp file so the request can finish
/// before the upload job runs; the job deletes the spool file afterwards.
pub async fn read_brand_form(
    mut multipart: Multipart,
) -> Result<(BrandDraft, Option<UploadedFile>), axum::response::Response> {
    let mut name: Option<String> = None;
    let mut brand_type: Option<String> = None;
    let mut is_active: Option<bool> = None;
    let mut file: Option<UploadedFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_multipart",
                    e.to_string(),
                ));
            }
        };

        match field.name().unwrap_or_default() {
            "name" => name = Some(read_text(field).await?),
            "type" => brand_type = Some(read_text(field).await?),
            "is_active" => {
                let raw = read_text(field).await?;
                is_active = Some(match raw.as_str() {
                    "true" | "1" => true,
                    "false" | "0" => false,
                    other => {
                        return Err(errors::json_error(
                            StatusCode::BAD_REQUEST,
                            "validation_error",
                            format!("is_active must be a boolean, got '{other}'"),
                        ));
                    }
                });
            }
            "file" => file = Some(spool_file(field).await?),
            // Unrecognized fields are ignored, matching lenient form parsing.
            _ => {}
        }
    }

    let Some(name) = name else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "the 'name' field is required",
        ));
    };
    let Some(brand_type) = brand_type else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "the 'type' field is required",
        ));
    };
    let brand_type: BrandType = brand_type
        .parse()
        .map_err(errors::domain_error_to_response)?;

    let mut draft = BrandDraft::new(name, brand_type);
    draft.is_active = is_active;
    Ok((draft, file))
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
) -> Result<String, axum::response::Response> {
    field.text().await.map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string())
    })
}

async fn spool_file(
    field: axum::extract::multipart::Field<'_>,
) -> Result<UploadedFile, axum::response::Response> {
    let filename = field.file_name().unwrap_or("icon").to_string();
    let bytes = field.bytes().await.map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_multipart", e.to_string())
    })?;

    spool_bytes(filename, &bytes).await
}

async fn spool_bytes(
    filename: String,
    bytes: &[u8],
) -> Result<UploadedFile, axum::response::Response> {
    let path = spool_path(&filename);
    // Async write: the spool step must not block an executor thread.
    tokio::fs::write(&path, bytes).await.map_err(|e| {
        errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upload_error",
            format!("failed to spool upload: {e}"),
        )
    })?;

    Ok(UploadedFile { path, filename })
}

fn spool_path(filename: &str) -> PathBuf {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    std::env::temp_dir().join(format!("brandhub-upload-{}.{ext}", uuid::Uuid::now_v7()))
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn brand_to_json(brand: &Brand) -> serde_json::Value {
    serde_json::json!({
        "id": brand.id.to_string(),
        "name": brand.name,
        "icon": brand.icon,
        "is_active": brand.is_active,
        "type": brand.brand_type.as_str(),
        "createdAt": brand.created_at.to_rfc3339(),
        "updatedAt": brand.updated_at.to_rfc3339(),
    })
}

pub fn brand_page_to_json(page: Page<Brand>) -> serde_json::Value {
    serde_json::json!({
        "brands": page.items.iter().map(brand_to_json).collect::<Vec<_>>(),
        "totalItems": page.total_items,
        "totalPages": page.total_pages,
    })
}
