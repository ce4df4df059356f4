use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::thumbnails::ThumbnailMethod;

/// A stored video file and its thumbnail pairing status, as observed on
/// disk at listing time.
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub filename: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub has_thumbnail: bool,
    pub thumbnail_url: Option<String>,
}

impl VideoFile {
    pub fn into_response(self) -> VideoResponse {
        let path = format!("/play/{}", self.filename);
        let thumbnail_url = self
            .thumbnail
            .as_ref()
            .map(|name| format!("/api/thumbnails/{name}"));

        VideoResponse {
            filename: self.filename,
            path,
            size: self.size,
            modified_at: self.modified_at,
            has_thumbnail: thumbnail_url.is_some(),
            thumbnail_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoResponse>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub path: String,
    pub thumbnail: Option<String>,
    pub thumbnail_method: Option<ThumbnailMethod>,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub filename: String,
    pub thumbnail_deleted: bool,
}
