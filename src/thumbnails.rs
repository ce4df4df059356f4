use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use serde::Serialize;

use crate::error::AppError;
use crate::video;

const PLACEHOLDER_WIDTH: u32 = 400;
const PLACEHOLDER_HEIGHT: u32 = 225;
const PLACEHOLDER_BG: Rgb<u8> = Rgb([38, 41, 48]);
const PLACEHOLDER_FG: Rgb<u8> = Rgb([232, 234, 237]);
const CAPTION: &str = "No preview";

// Caption rendering is best-effort; these are the usual suspects.
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
];

/// Thumbnail filename derived from a video filename: `<stem>_thumb.jpg`.
pub fn thumbnail_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    format!("{stem}_thumb.jpg")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailMethod {
    NativeDecode,
    ExternalTranscode,
    Placeholder,
}

#[derive(Debug, Clone, Copy)]
pub struct ThumbnailOutcome {
    pub method: Option<ThumbnailMethod>,
    pub success: bool,
}

const STRATEGY_ORDER: [ThumbnailMethod; 3] = [
    ThumbnailMethod::NativeDecode,
    ThumbnailMethod::ExternalTranscode,
    ThumbnailMethod::Placeholder,
];

/// Produce a thumbnail for `video_path` at `thumb_path`.
///
/// Strategies run in order — in-process decode, external ffmpeg, synthetic
/// placeholder — stopping at the first success. Individual failures are
/// logged and absorbed; only the final outcome reaches the caller. A
/// failed run leaves no file at `thumb_path`.
pub async fn generate(video_path: &Path, thumb_path: &Path) -> ThumbnailOutcome {
    for method in STRATEGY_ORDER {
        match attempt(method, video_path, thumb_path).await {
            Ok(()) => {
                return ThumbnailOutcome {
                    method: Some(method),
                    success: true,
                };
            }
            Err(e) => tracing::warn!(?method, "Thumbnail strategy failed: {e}"),
        }
    }

    ThumbnailOutcome {
        method: None,
        success: false,
    }
}

async fn attempt(
    method: ThumbnailMethod,
    video_path: &Path,
    thumb_path: &Path,
) -> Result<(), AppError> {
    match method {
        ThumbnailMethod::NativeDecode => {
            let video = video_path.to_path_buf();
            let thumb = thumb_path.to_path_buf();
            tokio::task::spawn_blocking(move || {
                video::extract_first_frame(&video, &thumb, video::THUMB_MAX_WIDTH)
            })
            .await
            .map_err(|e| AppError::Internal(format!("Frame decode task panicked: {e}")))?
        }
        ThumbnailMethod::ExternalTranscode => {
            video::extract_frame_external(video_path, thumb_path, video::THUMB_MAX_WIDTH).await
        }
        ThumbnailMethod::Placeholder => {
            let thumb = thumb_path.to_path_buf();
            tokio::task::spawn_blocking(move || write_placeholder(&thumb))
                .await
                .map_err(|e| AppError::Internal(format!("Placeholder task panicked: {e}")))?
        }
    }
}

/// Synthesize a 16:9 placeholder with a centered play glyph so the UI
/// always has something to show. Only a failed disk write makes this
/// fail; the caption is skipped when no usable font is found.
pub fn write_placeholder(dest: &Path) -> Result<(), AppError> {
    let mut canvas = RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, PLACEHOLDER_BG);

    let (cx, cy) = (
        PLACEHOLDER_WIDTH as i32 / 2,
        PLACEHOLDER_HEIGHT as i32 / 2,
    );
    draw_polygon_mut(
        &mut canvas,
        &[
            Point::new(cx - 24, cy - 30),
            Point::new(cx - 24, cy + 30),
            Point::new(cx + 36, cy),
        ],
        PLACEHOLDER_FG,
    );

    if let Some(font) = load_caption_font() {
        draw_text_mut(
            &mut canvas,
            PLACEHOLDER_FG,
            155,
            186,
            PxScale::from(18.0),
            &font,
            CAPTION,
        );
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Internal(format!("Failed to create thumbnail directory: {e}")))?;
    }

    let tmp = dest.with_extension("tmp.jpg");
    if let Err(e) = canvas.save(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(AppError::Internal(format!(
            "Failed to write placeholder: {e}"
        )));
    }
    std::fs::rename(&tmp, dest).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        AppError::Internal(format!("Failed to move placeholder into place: {e}"))
    })
}

fn load_caption_font() -> Option<FontVec> {
    FONT_PATHS.iter().find_map(|path| {
        let bytes = std::fs::read(path).ok()?;
        FontVec::try_from_vec(bytes).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(thumbnail_name("clip.mp4"), "clip_thumb.jpg");
        assert_eq!(thumbnail_name("clip.mp4"), thumbnail_name("clip.mp4"));
    }

    #[test]
    fn derivation_splits_at_last_extension() {
        assert_eq!(thumbnail_name("a.b.mkv"), "a.b_thumb.jpg");
    }

    #[test]
    fn derivation_handles_missing_extension() {
        assert_eq!(thumbnail_name("raw"), "raw_thumb.jpg");
    }

    #[test]
    fn placeholder_writes_a_readable_image() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("thumbs").join("clip_thumb.jpg");

        write_placeholder(&dest).unwrap();

        let img = image::open(&dest).unwrap();
        assert_eq!(img.width(), PLACEHOLDER_WIDTH);
        assert_eq!(img.height(), PLACEHOLDER_HEIGHT);
    }

    #[tokio::test]
    async fn pipeline_falls_through_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("missing.mp4");
        let thumb = dir.path().join("missing_thumb.jpg");

        let outcome = generate(&video, &thumb).await;

        assert!(outcome.success);
        assert_eq!(outcome.method, Some(ThumbnailMethod::Placeholder));
        assert!(image::open(&thumb).is_ok());
    }
}
