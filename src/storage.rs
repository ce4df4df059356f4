use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::video::VideoFile;
use crate::thumbnails;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 50;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "ogg", "mov", "rm", "rmvb", "wmv", "avi", "3gp", "mkv",
];

fn is_video_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
}

/// Filesystem-backed store for videos and their derived thumbnails.
///
/// The video/thumbnail pairing is purely a naming convention: thumbnail
/// presence is re-checked on every access, never cached.
#[derive(Clone)]
pub struct VideoStore {
    video_dir: PathBuf,
    thumbnail_dir: PathBuf,
}

impl VideoStore {
    pub fn new(video_dir: impl Into<PathBuf>, thumbnail_dir: impl Into<PathBuf>) -> Self {
        Self {
            video_dir: video_dir.into(),
            thumbnail_dir: thumbnail_dir.into(),
        }
    }

    pub fn video_path(&self, name: &str) -> PathBuf {
        self.video_dir.join(name)
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.thumbnail_dir
    }

    /// Path of the thumbnail paired with `video_name`, whether or not it
    /// exists yet.
    pub fn thumbnail_path(&self, video_name: &str) -> PathBuf {
        self.thumbnail_dir.join(thumbnails::thumbnail_name(video_name))
    }

    /// Return `desired` if that name is free, otherwise the first free
    /// `stem_1.ext`, `stem_2.ext`, ...
    ///
    /// The probe and the later write are not atomic: two concurrent
    /// uploads of the same name can both pass the check. Single-writer
    /// use is assumed.
    pub async fn resolve_collision(&self, desired: &str) -> String {
        if !self.name_taken(desired).await {
            return desired.to_string();
        }

        let (stem, ext) = match desired.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (desired, None),
        };

        let mut counter = 1usize;
        loop {
            let candidate = match ext {
                Some(ext) => format!("{stem}_{counter}.{ext}"),
                None => format!("{stem}_{counter}"),
            };
            if !self.name_taken(&candidate).await {
                return candidate;
            }
            counter += 1;
        }
    }

    async fn name_taken(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.video_path(name)).await.unwrap_or(false)
    }

    /// Persist uploaded video bytes under a collision-free name derived
    /// from `desired` and return the name actually used. A failed write
    /// removes whatever was partially written.
    pub async fn save_video(&self, desired: &str, data: &[u8]) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.video_dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create video directory: {e}")))?;

        let name = self.resolve_collision(desired).await;
        let path = self.video_path(&name);

        if let Err(e) = tokio::fs::write(&path, data).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::Internal(format!("Failed to write video file: {e}")));
        }

        Ok(name)
    }

    /// Delete a video and its paired thumbnail. Returns whether a
    /// thumbnail was actually removed; a missing thumbnail is not an
    /// error, a missing video is.
    pub async fn delete_video(&self, name: &str) -> Result<bool, AppError> {
        let path = self.video_path(name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::NotFound(format!("Video {name} not found")));
        }

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete video: {e}")))?;

        let thumbnail_deleted = tokio::fs::remove_file(self.thumbnail_path(name)).await.is_ok();
        Ok(thumbnail_deleted)
    }

    /// All recognized video files in the store, newest modification first,
    /// each probed for its paired thumbnail.
    pub async fn list_videos(&self) -> Result<Vec<VideoFile>, AppError> {
        let mut entries = match tokio::fs::read_dir(&self.video_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read video directory: {e}"
                )));
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read video directory: {e}")))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !is_video_file(&name) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else {
                continue;
            };

            let thumb_name = thumbnails::thumbnail_name(&name);
            let has_thumbnail = tokio::fs::try_exists(self.thumbnail_dir.join(&thumb_name))
                .await
                .unwrap_or(false);

            files.push(VideoFile {
                filename: name,
                size: meta.len(),
                modified_at: DateTime::<Utc>::from(modified),
                thumbnail: has_thumbnail.then_some(thumb_name),
            });
        }

        sort_newest_first(&mut files);
        Ok(files)
    }
}

/// Stable sort, so entries with equal timestamps keep directory order.
fn sort_newest_first(files: &mut [VideoFile]) {
    files.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
}

pub struct VideoPage {
    pub items: Vec<VideoFile>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl VideoPage {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// 1-indexed pagination over an already-sorted listing. Pages past the
/// end yield an empty slice, not an error.
pub fn paginate(files: Vec<VideoFile>, page: usize, page_size: usize) -> VideoPage {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = files.len();
    let total_pages = total.div_ceil(page_size);

    let items = files
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    VideoPage {
        items,
        page,
        page_size,
        total,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store(root: &Path) -> VideoStore {
        VideoStore::new(root.join("videos"), root.join("videos").join("thumbnails"))
    }

    fn entry(name: &str, modified_secs: i64) -> VideoFile {
        VideoFile {
            filename: name.to_string(),
            size: 0,
            modified_at: Utc.timestamp_opt(modified_secs, 0).unwrap(),
            thumbnail: None,
        }
    }

    #[tokio::test]
    async fn repeated_uploads_get_numbered_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let first = store.save_video("clip.mp4", b"a").await.unwrap();
        let second = store.save_video("clip.mp4", b"b").await.unwrap();
        let third = store.save_video("clip.mp4", b"c").await.unwrap();

        assert_eq!(first, "clip.mp4");
        assert_eq!(second, "clip_1.mp4");
        assert_eq!(third, "clip_2.mp4");
        for name in [&first, &second, &third] {
            assert!(store.video_path(name).exists());
        }
    }

    #[tokio::test]
    async fn collision_resolution_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.save_video("raw", b"a").await.unwrap();
        let second = store.save_video("raw", b"b").await.unwrap();
        assert_eq!(second, "raw_1");
    }

    #[tokio::test]
    async fn save_fails_cleanly_when_directory_is_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // Occupy the video directory path with a plain file so the write
        // cannot succeed.
        std::fs::write(dir.path().join("videos"), b"not a directory").unwrap();
        let store = store(dir.path());

        let result = store.save_video("clip.mp4", b"data").await;
        assert!(result.is_err());
        assert!(!store.video_path("clip.mp4").exists());
    }

    #[tokio::test]
    async fn delete_removes_video_and_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.save_video("clip.mp4", b"data").await.unwrap();
        std::fs::create_dir_all(store.thumbnail_dir()).unwrap();
        std::fs::write(store.thumbnail_path("clip.mp4"), b"jpg").unwrap();

        let thumbnail_deleted = store.delete_video("clip.mp4").await.unwrap();
        assert!(thumbnail_deleted);
        assert!(!store.video_path("clip.mp4").exists());
        assert!(!store.thumbnail_path("clip.mp4").exists());
    }

    #[tokio::test]
    async fn delete_tolerates_missing_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.save_video("clip.mp4", b"data").await.unwrap();

        let thumbnail_deleted = store.delete_video("clip.mp4").await.unwrap();
        assert!(!thumbnail_deleted);
        assert!(!store.video_path("clip.mp4").exists());

        let again = store.delete_video("clip.mp4").await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_filters_extensions_and_reports_pairing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.save_video("a.MP4", b"a").await.unwrap();
        store.save_video("b.mkv", b"b").await.unwrap();
        store.save_video("notes.txt", b"n").await.unwrap();
        std::fs::create_dir_all(store.thumbnail_dir()).unwrap();
        std::fs::write(store.thumbnail_path("b.mkv"), b"jpg").unwrap();

        let files = store.list_videos().await.unwrap();
        assert_eq!(files.len(), 2);

        let b = files.iter().find(|f| f.filename == "b.mkv").unwrap();
        assert_eq!(b.thumbnail.as_deref(), Some("b_thumb.jpg"));
        let a = files.iter().find(|f| f.filename == "a.MP4").unwrap();
        assert!(a.thumbnail.is_none());
    }

    #[tokio::test]
    async fn listing_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.list_videos().await.unwrap().is_empty());
    }

    #[test]
    fn sort_is_newest_first() {
        let mut files = vec![entry("t1.mp4", 100), entry("t3.mp4", 300), entry("t2.mp4", 200)];
        sort_newest_first(&mut files);
        let order: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(order, ["t3.mp4", "t2.mp4", "t1.mp4"]);
    }

    #[test]
    fn pagination_splits_45_files_into_3_pages() {
        let files: Vec<_> = (0..45i64).map(|i| entry(&format!("v{i}.mp4"), i)).collect();

        let first = paginate(files.clone(), 1, 20);
        assert_eq!(first.total, 45);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 20);
        assert!(first.has_next());
        assert!(!first.has_prev());

        let last = paginate(files.clone(), 3, 20);
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_next());
        assert!(last.has_prev());

        let past_end = paginate(files, 4, 20);
        assert!(past_end.items.is_empty());
        assert!(!past_end.has_next());
    }

    #[test]
    fn pagination_clamps_page_and_size() {
        let files: Vec<_> = (0..5i64).map(|i| entry(&format!("v{i}.mp4"), i)).collect();

        let page = paginate(files.clone(), 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.items.len(), 1);

        let capped = paginate(files, 1, 500);
        assert_eq!(capped.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn recognizes_video_extensions_case_insensitively() {
        assert!(is_video_file("a.mp4"));
        assert!(is_video_file("a.MKV"));
        assert!(is_video_file("weird.name.3gp"));
        assert!(!is_video_file("a.txt"));
        assert!(!is_video_file("mp4"));
    }
}
