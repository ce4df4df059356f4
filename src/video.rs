use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use ffmpeg_next as ffmpeg;
use once_cell::sync::OnceCell;
use tokio::process::Command;

use crate::error::AppError;

/// Maximum thumbnail width; height follows the source aspect ratio.
pub const THUMB_MAX_WIDTH: u32 = 400;

const EXTERNAL_SEEK: &str = "00:00:01.000";
const EXTERNAL_TIMEOUT: Duration = Duration::from_secs(30);

static FFMPEG_INIT: OnceCell<bool> = OnceCell::new();

fn ensure_initialized() -> Result<(), AppError> {
    if *FFMPEG_INIT.get_or_init(|| ffmpeg::init().is_ok()) {
        Ok(())
    } else {
        Err(AppError::Internal("Failed to initialize ffmpeg".into()))
    }
}

fn path_str(path: &Path) -> Result<&str, AppError> {
    path.to_str()
        .ok_or_else(|| AppError::Internal("Path contains invalid UTF-8".into()))
}

/// Proportional scale so width <= `max_width`, height rounded to the
/// nearest integer. Frames already narrow enough pass through unchanged.
fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Decode the first readable frame of `video` in-process and write it to
/// `dest` as a JPEG no wider than `max_width`.
///
/// The image goes through a sibling tmp file and a rename, so `dest`
/// never holds a partial write.
pub fn extract_first_frame(video: &Path, dest: &Path, max_width: u32) -> Result<(), AppError> {
    ensure_initialized()?;

    let mut input = ffmpeg::format::input(&video)
        .map_err(|e| AppError::Internal(format!("Failed to open video: {e}")))?;

    let stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| AppError::Internal("No video stream found".into()))?;
    let stream_index = stream.index();
    let parameters = stream.parameters();

    let codec_ctx = ffmpeg::codec::context::Context::from_parameters(parameters)
        .map_err(|e| AppError::Internal(format!("Failed to create codec context: {e}")))?;
    let mut decoder = codec_ctx
        .decoder()
        .video()
        .map_err(|e| AppError::Internal(format!("Failed to create video decoder: {e}")))?;

    let mut decoded = None;
    for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        let mut frame = ffmpeg::frame::Video::empty();
        if decoder.receive_frame(&mut frame).is_ok() {
            decoded = Some(frame);
            break;
        }
    }
    let frame =
        decoded.ok_or_else(|| AppError::Internal("No decodable frame in video".into()))?;

    if decoder.width() == 0 || decoder.height() == 0 {
        return Err(AppError::Internal("Video reports zero dimensions".into()));
    }
    let (width, height) = scaled_dimensions(decoder.width(), decoder.height(), max_width);

    let mut scaler = ffmpeg::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg::format::Pixel::RGB24,
        width,
        height,
        ffmpeg::software::scaling::flag::Flags::BILINEAR,
    )
    .map_err(|e| AppError::Internal(format!("Failed to create scaler: {e}")))?;

    let mut rgb = ffmpeg::frame::Video::empty();
    scaler
        .run(&frame, &mut rgb)
        .map_err(|e| AppError::Internal(format!("Failed to scale frame: {e}")))?;

    let data = rgb.data(0);
    let stride = rgb.stride(0);
    let buffer = image::ImageBuffer::<image::Rgb<u8>, Vec<u8>>::from_fn(width, height, |x, y| {
        let offset = y as usize * stride + x as usize * 3;
        image::Rgb([data[offset], data[offset + 1], data[offset + 2]])
    });

    write_jpeg(dest, width, height, buffer.into_raw())
}

fn write_jpeg(dest: &Path, width: u32, height: u32, rgb: Vec<u8>) -> Result<(), AppError> {
    use image::codecs::jpeg::JpegEncoder;
    use image::ColorType;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Internal(format!("Failed to create thumbnail directory: {e}")))?;
    }

    let tmp = dest.with_extension("tmp.jpg");
    let encoded = std::fs::File::create(&tmp)
        .map_err(|e| AppError::Internal(format!("Failed to create thumbnail file: {e}")))
        .and_then(|mut file| {
            let mut encoder = JpegEncoder::new_with_quality(&mut file, 85);
            encoder
                .encode(&rgb, width, height, ColorType::Rgb8.into())
                .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {e}")))
        });

    match encoded {
        Ok(()) => std::fs::rename(&tmp, dest).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            AppError::Internal(format!("Failed to move thumbnail into place: {e}"))
        }),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Ask the system `ffmpeg` for the frame at the 1-second mark, scaled to
/// at most `max_width` wide. The invocation is bounded by a timeout so a
/// hung process cannot block the handler, and succeeds only if the
/// process exits cleanly AND the output file actually appeared.
pub async fn extract_frame_external(
    video: &Path,
    dest: &Path,
    max_width: u32,
) -> Result<(), AppError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create thumbnail directory: {e}")))?;
    }

    let tmp = dest.with_extension("tmp.jpg");
    let scale_filter = format!("scale='min({max_width},iw)':-1");

    let mut cmd = Command::new("ffmpeg");
    cmd.args([
        "-y",
        "-ss",
        EXTERNAL_SEEK,
        "-i",
        path_str(video)?,
        "-vframes",
        "1",
        "-vf",
        &scale_filter,
        path_str(&tmp)?,
    ])
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| AppError::Internal(format!("Failed to run ffmpeg: {e}")))?;

    let output = match tokio::time::timeout(EXTERNAL_TIMEOUT, child.wait_with_output()).await {
        Ok(result) => {
            result.map_err(|e| AppError::Internal(format!("ffmpeg did not finish: {e}")))?
        }
        Err(_) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Internal(
                "ffmpeg frame extraction timed out".into(),
            ));
        }
    };

    if !output.status.success() {
        let _ = tokio::fs::remove_file(&tmp).await;
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Internal(format!(
            "ffmpeg frame extraction failed: {stderr}"
        )));
    }

    // Exit code alone is not trusted; the frame must actually be there.
    let written = tokio::fs::metadata(&tmp)
        .await
        .map(|m| m.len() > 0)
        .unwrap_or(false);
    if !written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(AppError::Internal(
            "ffmpeg exited cleanly but produced no frame".into(),
        ));
    }

    tokio::fs::rename(&tmp, dest)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to move thumbnail into place: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_preserves_aspect_ratio() {
        assert_eq!(scaled_dimensions(1920, 1080, 400), (400, 225));
        assert_eq!(scaled_dimensions(854, 480, 400), (400, 225));
    }

    #[test]
    fn scaling_leaves_narrow_frames_alone() {
        assert_eq!(scaled_dimensions(320, 240, 400), (320, 240));
        assert_eq!(scaled_dimensions(400, 300, 400), (400, 300));
    }

    #[test]
    fn native_extraction_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out_thumb.jpg");
        let result = extract_first_frame(Path::new("/nonexistent/clip.mp4"), &dest, 400);
        assert!(result.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn external_extraction_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out_thumb.jpg");
        let result =
            extract_frame_external(Path::new("/nonexistent/clip.mp4"), &dest, 400).await;
        assert!(result.is_err());
        assert!(!dest.exists());
    }
}
