use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::video::{DeleteResponse, UploadResponse, VideoListResponse};
use crate::storage::{self, DEFAULT_PAGE_SIZE};
use crate::thumbnails;
use crate::AppState;

const MAX_UPLOAD_SIZE: usize = 1024 * 1024 * 1024; // 1 GiB

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload))
        .route_layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{filename}", delete(delete_video))
        .route("/play/{filename}", get(play))
        .route("/api/thumbnails/{filename}", get(thumbnail))
}

/// Reject names that could address anything outside the flat storage
/// directories.
fn sanitize_filename(name: &str) -> Result<&str, AppError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(AppError::BadRequest("Invalid filename".into()));
    }
    Ok(name)
}

async fn upload(
    State(state): State<AppState>,
    _auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file_data: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart data: {e}")))?
    {
        if field.name() == Some("file") {
            let original_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
            file_data = Some((original_name, bytes.to_vec()));
        }
    }

    let (original_name, bytes) =
        file_data.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;

    // Keep the client's filename, reduced to its final path component.
    let desired = std::path::Path::new(&original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("No selected file".into()))?;

    let filename = state.store.save_video(&desired, &bytes).await?;

    let video_path = state.store.video_path(&filename);
    let thumb_path = state.store.thumbnail_path(&filename);
    let outcome = thumbnails::generate(&video_path, &thumb_path).await;

    let (thumbnail, warning) = if outcome.success {
        (Some(thumbnails::thumbnail_name(&filename)), None)
    } else {
        (
            None,
            Some("Thumbnail generation failed; the video is still playable".to_string()),
        )
    };

    Ok(Json(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        path: format!("/play/{filename}"),
        filename,
        thumbnail,
        thumbnail_method: outcome.method,
        warning,
    }))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn list_videos(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<VideoListResponse>, AppError> {
    let files = state.store.list_videos().await?;
    let page = storage::paginate(
        files,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let has_next = page.has_next();
    let has_prev = page.has_prev();

    Ok(Json(VideoListResponse {
        videos: page.items.into_iter().map(|f| f.into_response()).collect(),
        page: page.page,
        page_size: page.page_size,
        total: page.total,
        total_pages: page.total_pages,
        has_next,
        has_prev,
    }))
}

async fn delete_video(
    State(state): State<AppState>,
    _auth: AuthUser,
    axum::extract::Path(filename): axum::extract::Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let filename = sanitize_filename(&filename)?.to_string();
    let thumbnail_deleted = state.store.delete_video(&filename).await?;

    Ok(Json(DeleteResponse {
        filename,
        thumbnail_deleted,
    }))
}

async fn play(
    State(state): State<AppState>,
    axum::extract::Path(filename): axum::extract::Path<String>,
) -> Result<Response, AppError> {
    let filename = sanitize_filename(&filename)?;
    stream_file(state.store.video_path(filename), "Video not found").await
}

async fn thumbnail(
    State(state): State<AppState>,
    axum::extract::Path(filename): axum::extract::Path<String>,
) -> Result<Response, AppError> {
    let filename = sanitize_filename(&filename)?;
    stream_file(
        state.store.thumbnail_dir().join(filename),
        "Thumbnail not found",
    )
    .await
}

async fn stream_file(path: PathBuf, not_found: &str) -> Result<Response, AppError> {
    let file = File::open(&path)
        .await
        .map_err(|_| AppError::NotFound(not_found.to_string()))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = body.into_response();
    if let Ok(value) = mime.to_string().parse() {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_with_separators_are_rejected() {
        assert!(sanitize_filename("clip.mp4").is_ok());
        assert!(sanitize_filename("a.b.mkv").is_ok());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("nested/clip.mp4").is_err());
        assert!(sanitize_filename("nested\\clip.mp4").is_err());
    }
}
