/*!
 * External transcoder access.
 *
 * All audio work (silence tails, concatenation, duration probing, M4B
 * packaging, cover art) is delegated to `ffmpeg` / `ffprobe` subprocesses.
 * Every call runs under a timeout and its exit status is checked.
 */

use async_trait::async_trait;
use log::{debug, error};
use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::AudioConfig;
use crate::errors::TranscodeError;

/// Build an argument vector from mixed string and path values
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$(OsString::from(AsRef::<std::ffi::OsStr>::as_ref(&$arg))),*]
    };
}

/// Audio operations the narration pipeline needs
#[async_trait]
pub trait Transcoder: Send + Sync + Debug {
    /// Re-encode `path` in place with `duration_ms` of silence at the end
    async fn append_silence(&self, path: &Path, duration_ms: u64) -> Result<(), TranscodeError>;

    /// Concatenate `inputs` in order into `output`; the output codec follows its extension
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TranscodeError>;

    /// Length of an audio file in microseconds
    async fn duration_us(&self, path: &Path) -> Result<u64, TranscodeError>;

    /// Concatenate the files of a concat list losslessly into `intermediate`,
    /// then re-encode to AAC in `output` with metadata and chapters taken from
    /// the ffmetadata sidecar
    async fn package_m4b(
        &self,
        concat_list: &Path,
        metadata: &Path,
        intermediate: &Path,
        output: &Path,
    ) -> Result<(), TranscodeError>;

    /// Attach `cover` as artwork of `m4b`, in place
    async fn embed_cover(&self, m4b: &Path, cover: &Path) -> Result<(), TranscodeError>;
}

/// `Transcoder` backed by ffmpeg and ffprobe binaries
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            timeout: Duration::from_secs(config.transcode_timeout_secs),
        }
    }

    async fn run(&self, program: &str, args: Vec<OsString>) -> Result<Output, TranscodeError> {
        debug!("Running {} {:?}", program, args);

        let child = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = child => {
                result.map_err(|e| TranscodeError::SpawnFailed {
                    program: program.to_string(),
                    message: e.to_string(),
                })?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(TranscodeError::Timeout {
                    program: program.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let filtered = filter_ffmpeg_stderr(&stderr);
            error!("{} failed: {}", program, filtered);
            return Err(TranscodeError::CommandFailed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: filtered,
            });
        }

        Ok(output)
    }

    async fn ffmpeg(&self, args: Vec<OsString>, output: &Path) -> Result<(), TranscodeError> {
        self.run(&self.ffmpeg, args).await?;
        ensure_output(output).await
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn append_silence(&self, path: &Path, duration_ms: u64) -> Result<(), TranscodeError> {
        let padded = sibling_path(path, "padded");
        let args = args![
            "-y", "-i", path,
            "-af", format!("apad=pad_dur={}ms", duration_ms),
            &padded
        ];
        self.ffmpeg(args, &padded).await?;
        tokio::fs::rename(&padded, path).await?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TranscodeError> {
        // The concat filter decodes every input, so mp3 and flac parts can be mixed
        let mut args: Vec<OsString> = args!["-y"];
        let mut graph = String::new();
        for (i, input) in inputs.iter().enumerate() {
            args.extend(args!["-i", input]);
            graph.push_str(&format!("[{}:a]", i));
        }
        graph.push_str(&format!("concat=n={}:v=0:a=1[out]", inputs.len()));
        args.extend(args!["-filter_complex", graph, "-map", "[out]", output]);
        self.ffmpeg(args, output).await
    }

    async fn duration_us(&self, path: &Path) -> Result<u64, TranscodeError> {
        let args = args![
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=1",
            path
        ];
        let output = self.run(&self.ffprobe, args).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        parse_probe_duration(&text).ok_or_else(|| TranscodeError::Probe {
            path: path.to_path_buf(),
            message: format!("unexpected ffprobe output {:?}", text.trim()),
        })
    }

    async fn package_m4b(
        &self,
        concat_list: &Path,
        metadata: &Path,
        intermediate: &Path,
        output: &Path,
    ) -> Result<(), TranscodeError> {
        let args = args![
            "-y", "-f", "concat", "-safe", "0", "-i", concat_list,
            "-codec:a", "flac", "-f", "mp4", "-strict", "-2",
            intermediate
        ];
        self.ffmpeg(args, intermediate).await?;

        let args = args![
            "-y", "-i", intermediate, "-i", metadata,
            "-map_metadata", "1",
            "-codec", "aac",
            output
        ];
        self.ffmpeg(args, output).await
    }

    async fn embed_cover(&self, m4b: &Path, cover: &Path) -> Result<(), TranscodeError> {
        let with_cover = sibling_path(m4b, "cover");
        let args = args![
            "-y", "-i", m4b, "-i", cover,
            "-map", "0:a", "-map", "1:v",
            "-c", "copy",
            "-disposition:v:0", "attached_pic",
            &with_cover
        ];
        self.ffmpeg(args, &with_cover).await?;
        tokio::fs::rename(&with_cover, m4b).await?;
        Ok(())
    }
}

/// `dir/name.ext` -> `dir/name.<tag>.ext`
fn sibling_path(path: &Path, tag: &str) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, tag, ext.to_string_lossy()),
        None => format!("{}.{}", stem, tag),
    };
    path.with_file_name(name)
}

async fn ensure_output(path: &Path) -> Result<(), TranscodeError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(TranscodeError::MissingOutput(path.to_path_buf())),
    }
}

/// Seconds as printed by ffprobe -> microseconds
pub fn parse_probe_duration(output: &str) -> Option<u64> {
    let seconds: f64 = output.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1_000_000.0).round() as u64)
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "title",
        "encoder",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
