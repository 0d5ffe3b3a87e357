use std::sync::Arc;

use crate::{
    assets::{PreparedImage, decode::premultiply_rgba8_in_place},
    foundation::error::{ReelError, ReelResult},
};

/// Stream facts for the scrubbed video, as reported by `ffprobe`.
#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    /// Filesystem path or URL handed to `ffmpeg -i`.
    pub locator: String,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    /// `None` when the container does not report a usable duration.
    pub duration_sec: Option<f64>,
}

impl VideoSourceInfo {
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }
}

/// How `ffmpeg` lands on a requested timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    /// Nearest preceding keyframe; cheap, may be a few frames early.
    Fast,
    /// Decode forward from the keyframe to the exact timestamp.
    Exact,
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
pub(crate) fn duration_from_probe(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
pub(crate) fn seek_args(mode: SeekMode, time_sec: f64) -> Vec<String> {
    let ts = format!("{:.6}", time_sec.max(0.0));
    match mode {
        SeekMode::Fast => vec!["-noaccurate_seek".into(), "-ss".into(), ts],
        SeekMode::Exact => vec!["-accurate_seek".into(), "-ss".into(), ts],
    }
}

/// Split a raw `rgba` batch from `ffmpeg` into premultiplied frames.
pub(crate) fn split_rgba_batch(
    bytes: &[u8],
    width: u32,
    height: u32,
    max_frames: u32,
) -> ReelResult<Vec<PreparedImage>> {
    let frame_len = width as usize * height as usize * 4;
    if frame_len == 0 {
        return Err(ReelError::media(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if !bytes.len().is_multiple_of(frame_len) {
        return Err(ReelError::media(format!(
            "decoded video batch has invalid size: got {} bytes, expected multiples of {frame_len}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(frame_len)
        .take(max_frames as usize)
        .map(|chunk| {
            let mut rgba = chunk.to_vec();
            premultiply_rgba8_in_place(&mut rgba);
            PreparedImage {
                width,
                height,
                rgba8_premul: Arc::new(rgba),
            }
        })
        .collect())
}

#[cfg(feature = "media-ffmpeg")]
#[tracing::instrument]
pub fn probe_video(locator: &str) -> ReelResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(locator)
        .output()
        .map_err(|e| ReelError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ReelError::media(format!(
            "ffprobe failed for '{locator}': {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| ReelError::media(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ReelError::media("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| ReelError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| ReelError::media("missing video height from ffprobe"))?;
    let (fps_num, fps_den) =
        parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1")).unwrap_or((0, 1));
    let duration_sec = duration_from_probe(
        parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref()),
    );

    Ok(VideoSourceInfo {
        locator: locator.to_string(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_locator: &str) -> ReelResult<VideoSourceInfo> {
    Err(ReelError::media(
        "video media requires the 'media-ffmpeg' feature",
    ))
}

/// Decode up to `frame_count` consecutive frames starting at `start_sec`. Audio is never decoded.
#[cfg(feature = "media-ffmpeg")]
#[tracing::instrument(skip(source), fields(locator = %source.locator))]
pub fn decode_video_frames(
    source: &VideoSourceInfo,
    start_sec: f64,
    frame_count: u32,
    mode: SeekMode,
) -> ReelResult<Vec<PreparedImage>> {
    if frame_count == 0 {
        return Ok(Vec::new());
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error"])
        .args(seek_args(mode, start_sec))
        .arg("-i")
        .arg(&source.locator)
        .args([
            "-an",
            "-frames:v",
            &frame_count.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| ReelError::media(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(ReelError::media(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.locator,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    split_rgba_batch(&out.stdout, source.width, source.height, frame_count)
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frames(
    _source: &VideoSourceInfo,
    _start_sec: f64,
    _frame_count: u32,
    _mode: SeekMode,
) -> ReelResult<Vec<PreparedImage>> {
    Err(ReelError::media(
        "video media requires the 'media-ffmpeg' feature",
    ))
}
