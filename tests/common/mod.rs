/*!
 * Common test utilities for the bookvox test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use bookvox::app_config::Config;
use bookvox::errors::TranscodeError;
use bookvox::transcoder::Transcoder;

/// Route library log output through the test harness
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Two short chapters with a header
pub const TWO_CHAPTER_BOOK: &str = "Title: Test Book
Author: Tester
# One
Hello world.
Good night.
# Two
Again here.
The end.
";

/// Creates the two-chapter sample book
pub fn create_test_book(dir: &Path, filename: &str) -> Result<PathBuf> {
    create_test_file(dir, filename, TWO_CHAPTER_BOOK)
}

/// Config for tests: no retry delay, default silences
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.speech.retry_backoff_ms = 0;
    config.speech.concurrent_requests = 4;
    config
}

/// Transcoder that works on the mock provider's text "audio".
///
/// Audio files are lines of `speech:<ms>` and `silence:<ms>`; a file lasts
/// the sum of those numbers. Concatenation joins bytes, silence appends a
/// line, packaging writes the concatenated list plus the metadata sidecar.
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    /// Log of operations, e.g. `concat book-part1.flac`
    calls: Mutex<Vec<String>>,
    /// Fail `concat` when the output file name ends with this
    fail_concat_into: Option<String>,
    /// Fail `package_m4b`
    fail_package: bool,
    /// Fail `embed_cover`
    fail_cover: bool,
}

impl FakeTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_concat_into(suffix: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_concat_into: Some(suffix.to_string()),
            ..Self::default()
        })
    }

    pub fn failing_package() -> Arc<Self> {
        Arc::new(Self {
            fail_package: true,
            ..Self::default()
        })
    }

    pub fn failing_cover() -> Arc<Self> {
        Arc::new(Self {
            fail_cover: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, op: &str, path: &Path) {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        self.calls.lock().push(format!("{} {}", op, name));
    }

    /// Milliseconds described by a fake audio file
    pub fn length_ms(content: &str) -> u64 {
        content
            .lines()
            .filter_map(|line| {
                let (kind, value) = line.split_once(':')?;
                match kind {
                    "speech" | "silence" => value.trim().parse::<u64>().ok(),
                    _ => None,
                }
            })
            .sum()
    }
}

fn read(path: &Path) -> Result<String, TranscodeError> {
    fs::read_to_string(path).map_err(|_| TranscodeError::MissingOutput(path.to_path_buf()))
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn append_silence(&self, path: &Path, duration_ms: u64) -> Result<(), TranscodeError> {
        self.record("silence", path);
        let mut content = read(path)?;
        content.push_str(&format!("silence:{}\n", duration_ms));
        fs::write(path, content)?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<(), TranscodeError> {
        self.record("concat", output);
        let name = output.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if let Some(suffix) = self.fail_concat_into.as_deref() {
            if name.ends_with(suffix) {
                return Err(TranscodeError::CommandFailed {
                    program: "ffmpeg".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "simulated failure".to_string(),
                });
            }
        }
        let mut joined = String::new();
        for input in inputs {
            joined.push_str(&read(input)?);
        }
        fs::write(output, joined)?;
        Ok(())
    }

    async fn duration_us(&self, path: &Path) -> Result<u64, TranscodeError> {
        self.record("probe", path);
        Ok(Self::length_ms(&read(path)?) * 1_000)
    }

    async fn package_m4b(
        &self,
        concat_list: &Path,
        metadata: &Path,
        intermediate: &Path,
        output: &Path,
    ) -> Result<(), TranscodeError> {
        self.record("package", output);
        if self.fail_package {
            return Err(TranscodeError::CommandFailed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "simulated packaging failure".to_string(),
            });
        }
        let mut audio = String::new();
        for line in read(concat_list)?.lines() {
            let quoted = line.trim_start_matches("file ").trim_matches('\'');
            let file = quoted.replace("'\\''", "'");
            audio.push_str(&read(Path::new(&file))?);
        }
        fs::write(intermediate, &audio)?;
        fs::write(output, format!("{}--metadata--\n{}", audio, read(metadata)?))?;
        Ok(())
    }

    async fn embed_cover(&self, m4b: &Path, cover: &Path) -> Result<(), TranscodeError> {
        self.record("cover", m4b);
        if self.fail_cover {
            return Err(TranscodeError::CommandFailed {
                program: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "simulated cover failure".to_string(),
            });
        }
        let mut content = read(m4b)?;
        let name = cover.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        content.push_str(&format!("cover:{}\n", name));
        fs::write(m4b, content)?;
        Ok(())
    }
}
