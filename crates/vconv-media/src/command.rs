//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Lines of stderr kept on failure.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Change the container without re-encoding any stream.
    ///
    /// Produces `-i <input> -c copy -y <output>`.
    pub fn remux(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::new(input, output).codec_copy()
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Copy all streams as-is.
    pub fn codec_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments. The output is always overwritten.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.output_args.len() + 4);

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push("-y".to_string());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Something that can execute an FFmpeg command.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run `cmd`; `Ok` only when the process exits with status zero.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Runs FFmpeg as a child process.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Explicit binary; resolved on PATH when unset
    binary: Option<PathBuf>,
}

impl FfmpegRunner {
    /// Create a new runner using `ffmpeg` from PATH.
    pub fn new() -> Self {
        Self { binary: None }
    }

    /// Use a specific FFmpeg binary.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    fn resolve_binary(&self) -> MediaResult<PathBuf> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => check_ffmpeg(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegRunner {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let binary = self.resolve_binary()?;
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let output = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::spawn(&binary, e))?;

        if output.status.success() {
            info!("FFmpeg wrote {}", cmd.output().display());
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(MediaError::ffmpeg_failed(
            format!("FFmpeg exited with {}", output.status),
            Some(stderr_tail(&stderr)),
            output.status.code(),
        ))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
