/// File upload endpoints
///
/// - `POST /api/v1/upload` - Store a file (multipart field `file`)
/// - `POST /api/v1/upload/profile_picture` - Store the caller's profile
///   picture (multipart field `profile_picture`)
/// - `GET /api/v1/upload/:filename` - Download a stored file
///
/// Accepted files are at most `UPLOAD_MAX_BYTES` (5 MiB by default), end in
/// `.jpg`, `.jpeg`, `.png` or `.pdf`, and declare a content type containing
/// `image` or `pdf`. Stored names are `<unix-nanos><original extension>`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Extension, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use std::path::Path as FsPath;
use std::time::{SystemTime, UNIX_EPOCH};
use taskvault_shared::{auth::middleware::AuthContext, models::user::User};
use tokio_util::io::ReaderStream;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "pdf"];

/// Public URL prefix stored on user rows
const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct ProfilePicture {
    pub profile_picture: String,
}

/// Upload a file
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<UploadedFile>> {
    let (filename, size) = receive(&state, multipart, "file").await?;

    tracing::info!(target: "audit", user_id = auth.user_id, filename = %filename, size, "File uploaded");
    Ok(ApiResponse::ok(
        "File uploaded successfully",
        UploadedFile { filename, size },
    ))
}

/// Upload the caller's profile picture
///
/// Stores `/uploads/<name>` on the caller's user row and refreshes the
/// cached user.
pub async fn upload_profile_picture(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<ProfilePicture>> {
    let (filename, _) = receive(&state, multipart, "profile_picture").await?;
    let url = format!("{}/{}", PUBLIC_PREFIX, filename);

    let stored = state
        .cache
        .put(async {
            User::set_profile_picture(&state.db, auth.user_id, &url)
                .await
                .map_err(ApiError::from)?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
        })
        .await;

    if stored.is_err() {
        discard(&state.config.upload.dir, &filename).await;
    }
    stored?;

    tracing::info!(target: "audit", user_id = auth.user_id, filename = %filename, "Profile picture uploaded");
    Ok(ApiResponse::ok(
        "Profile picture uploaded successfully",
        ProfilePicture { profile_picture: url },
    ))
}

/// Stream a stored file
///
/// # Errors
///
/// - `404 Not Found`: Unknown name, or a name that would leave the upload
///   directory
pub async fn get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound("File not found".to_string());

    if !is_safe_filename(&filename) {
        tracing::warn!(target: "security", filename = %filename, "Rejected upload path");
        return Err(not_found());
    }

    let path = state.config.upload.dir.join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let body = Body::from_stream(ReaderStream::new(file));
    Ok(([(header::CONTENT_TYPE, content_type_for(&filename))], body).into_response())
}

/// Reads the named multipart field, validates it and writes it to disk
///
/// Returns the stored name and the size in bytes.
async fn receive(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    field_name: &str,
) -> ApiResult<(String, usize)> {
    let upload_error = || ApiError::BadRequest("Error uploading file".to_string());

    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Rejected multipart request");
        upload_error()
    })?;

    let (original_name, content_type, data) = loop {
        let field = multipart.next_field().await?.ok_or_else(upload_error)?;
        if field.name() != Some(field_name) {
            continue;
        }

        let original_name = field.file_name().map(str::to_string).ok_or_else(upload_error)?;
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data: Bytes = field.bytes().await?;
        break (original_name, content_type, data);
    };

    let extension = validate_upload(
        &original_name,
        &content_type,
        data.len(),
        state.config.upload.max_bytes,
    )?;

    let filename = format!("{}.{}", unix_nanos(), extension);
    let dir = &state.config.upload.dir;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&filename), &data).await?;

    Ok((filename, data.len()))
}

/// Removes a stored file that nothing will reference
async fn discard(dir: &FsPath, filename: &str) {
    if let Err(e) = tokio::fs::remove_file(dir.join(filename)).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(filename = %filename, error = %e, "Failed to remove orphaned upload");
        }
    }
}

/// Checks size, extension and content type; returns the original extension
fn validate_upload(
    original_name: &str,
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> ApiResult<String> {
    if size > max_bytes {
        return Err(ApiError::BadRequest(format!(
            "File size exceeds the limit of {}MB",
            max_bytes / (1024 * 1024)
        )));
    }

    let extension = FsPath::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .ok_or_else(|| ApiError::BadRequest("File type not allowed".to_string()))?;

    if !content_type.contains("image") && !content_type.contains("pdf") {
        return Err(ApiError::BadRequest(
            "File must be an image or PDF".to_string(),
        ));
    }

    Ok(extension.to_string())
}

/// A bare file name: no separators, no parent references
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn content_type_for(name: &str) -> &'static str {
    let extension = FsPath::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
