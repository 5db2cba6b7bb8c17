use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::config::RenderConfig;
use crate::error::{ChartAnimError, ChartAnimResult};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pixel_format: String,
    pub crf: u32,
    pub preset: String,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn from_render(config: &RenderConfig, out_path: impl Into<PathBuf>) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            codec: config.codec.clone(),
            pixel_format: config.pixel_format.clone(),
            crf: config.crf,
            preset: config.preset.clone(),
            out_path: out_path.into(),
            overwrite: true,
        }
    }

    pub fn validate(&self) -> ChartAnimResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ChartAnimError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(ChartAnimError::validation("encode fps must be non-zero"));
        }
        if self.pixel_format == "yuv420p" && (self.width % 2 != 0 || self.height % 2 != 0) {
            return Err(ChartAnimError::validation(
                "encode width/height must be even for yuv420p output",
            ));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ChartAnimResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams packed RGB24 frames into a spawned system ffmpeg. Backpressure
/// is the child's stdin pipe; `write_frame` blocks when ffmpeg falls behind.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    frame_len: usize,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig) -> ChartAnimResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(ChartAnimError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(ChartAnimError::encode(
                "ffmpeg is required for video encoding, but was not found on PATH",
            ));
        }

        // System ffmpeg binary instead of ffmpeg-next, so no native FFmpeg
        // dev headers are needed.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if cfg.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            &cfg.codec,
            "-pix_fmt",
            &cfg.pixel_format,
            "-crf",
            &cfg.crf.to_string(),
            "-preset",
            &cfg.preset,
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ChartAnimError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChartAnimError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            frame_len: cfg.width as usize * cfg.height as usize * 3,
            cfg,
            child,
            stdin: Some(stdin),
        })
    }

    /// Writes one packed RGB24 frame of exactly `width * height * 3` bytes.
    pub fn write_frame(&mut self, frame: &[u8]) -> ChartAnimResult<()> {
        if frame.len() != self.frame_len {
            return Err(ChartAnimError::validation(format!(
                "frame size mismatch: got {} bytes, expected {} ({}x{}x3)",
                frame.len(),
                self.frame_len,
                self.cfg.width,
                self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ChartAnimError::encode("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(frame).map_err(|e| {
            ChartAnimError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        Ok(())
    }

    /// Closes stdin and waits for ffmpeg. A non-zero exit is logged rather
    /// than returned; the written frames cannot be rolled back at this point.
    pub fn finish(mut self) -> ChartAnimResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            ChartAnimError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                status = %output.status,
                stderr = %stderr.trim(),
                "ffmpeg exited with a non-zero status"
            );
        }

        Ok(())
    }
}
