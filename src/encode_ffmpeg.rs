use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    foundation::{
        core::{Rgba8, Size},
        error::{ReelError, ReelResult},
    },
    render::{FrameRGBA, composite::over},
};

/// Output settings for an MP4 scroll sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeSettings {
    pub size: Size,
    pub fps: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
    /// x264 constant rate factor; encoder default when unset.
    pub crf: Option<u8>,
}

impl EncodeSettings {
    pub fn mp4(out_path: impl Into<PathBuf>, size: Size, fps: u32) -> Self {
        Self {
            size,
            fps,
            out_path: out_path.into(),
            overwrite: true,
            crf: None,
        }
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.size.is_empty() {
            return Err(ReelError::validation("encode width/height must be non-zero"));
        }
        if self.fps == 0 {
            return Err(ReelError::validation("encode fps must be non-zero"));
        }
        if !self.size.width.is_multiple_of(2) || !self.size.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "encode width/height must be even (yuv420p output)",
            ));
        }
        if self.crf.is_some_and(|c| c > 51) {
            return Err(ReelError::validation("encode crf must be in 0..=51"));
        }
        Ok(())
    }

    fn ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            if self.overwrite { "-y" } else { "-n" }.into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-s".into(),
            format!("{}x{}", self.size.width, self.size.height),
            "-r".into(),
            self.fps.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
        ];
        if let Some(crf) = self.crf {
            args.push("-crf".into());
            args.push(crf.to_string());
        }
        args.extend(
            ["-pix_fmt", "yuv420p", "-movflags", "+faststart"]
                .into_iter()
                .map(String::from),
        );
        args.push(self.out_path.to_string_lossy().into_owned());
        args
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams composited frames into a system `ffmpeg` process as raw RGBA.
pub struct FfmpegEncoder {
    settings: EncodeSettings,
    background: Rgba8,
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
    frames: u64,
}

impl std::fmt::Debug for FfmpegEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEncoder")
            .field("settings", &self.settings)
            .field("frames", &self.frames)
            .finish()
    }
}

impl FfmpegEncoder {
    /// Spawn ffmpeg. Translucent pixels are flattened over `background`.
    #[tracing::instrument(skip(settings), fields(out = %settings.out_path.display()))]
    pub fn spawn(settings: EncodeSettings, background: Rgba8) -> ReelResult<Self> {
        settings.validate()?;
        ensure_parent_dir(&settings.out_path)?;
        if !settings.overwrite && settings.out_path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                settings.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(ReelError::media(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(settings.ffmpeg_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelError::media(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::media("ffmpeg stdin unavailable"))?;

        tracing::info!(
            width = settings.size.width,
            height = settings.size.height,
            fps = settings.fps,
            "ffmpeg encoder started"
        );
        Ok(Self {
            scratch: vec![0u8; settings.size.width as usize * settings.size.height as usize * 4],
            settings,
            background,
            child,
            stdin: Some(stdin),
            frames: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn push(&mut self, frame: &FrameRGBA) -> ReelResult<()> {
        let Size { width, height } = self.settings.size;
        if frame.width != width || frame.height != height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {width}x{height}",
                frame.width, frame.height
            )));
        }
        flatten_to_opaque(&mut self.scratch, frame, self.background)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::media("ffmpeg encoder is already finished"));
        };
        stdin
            .write_all(&self.scratch)
            .map_err(|e| ReelError::media(format!("failed to write frame to ffmpeg: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    /// Close the pipe and wait for ffmpeg. Returns the output path.
    pub fn finish(mut self) -> ReelResult<PathBuf> {
        drop(self.stdin.take());
        let output = self
            .child
            .wait_with_output()
            .map_err(|e| ReelError::media(format!("failed to wait for ffmpeg: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::media(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::info!(frames = self.frames, "ffmpeg encoder finished");
        Ok(self.settings.out_path)
    }
}

/// Straight-alpha opaque RGBA8 of `frame` composited over `background`.
pub fn flatten_to_opaque(dst: &mut [u8], frame: &FrameRGBA, background: Rgba8) -> ReelResult<()> {
    if dst.len() != frame.data.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "flatten expects equal-length rgba8 buffers",
        ));
    }
    let bg = background.with_alpha(255).premultiplied();
    for (d, s) in dst.chunks_exact_mut(4).zip(frame.data.chunks_exact(4)) {
        let src = if frame.premultiplied {
            [s[0], s[1], s[2], s[3]]
        } else {
            Rgba8([s[0], s[1], s[2], s[3]]).premultiplied()
        };
        // Over an opaque background the result is opaque, so premultiplied equals straight.
        d.copy_from_slice(&over(bg, src, 1.0));
    }
    Ok(())
}
