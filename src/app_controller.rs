use anyhow::{Result, Context, anyhow};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::audiobook::AudiobookAssembler;
use crate::epub_export::{self, EpubExport};
use crate::file_utils::{FileManager, FileType};
use crate::narration::NarrationPipeline;
use crate::providers::SpeechProvider;
use crate::providers::http::HttpSpeechProvider;
use crate::subtitle_processor::SubtitleTrack;
use crate::text_segmenter::Book;
use crate::transcoder::{FfmpegTranscoder, Transcoder};

// @module: Application controller for book narration

/// Files produced for one narrated book
#[derive(Debug, Clone)]
pub struct BookOutput {
    pub m4b_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub cue_count: usize,
}

/// Outcome of a folder or batch run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: Vec<BookOutput>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Speech service shared by all books
    provider: Arc<dyn SpeechProvider>,
    // @field: ffmpeg access shared by all books
    transcoder: Arc<dyn Transcoder>,
    // @field: Draw progress bars
    show_progress: bool,
}

impl Controller {
    // @method: Create a controller talking to the configured speech endpoint and ffmpeg
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = Arc::new(HttpSpeechProvider::new(&config.speech.endpoint, config.speech.timeout_secs));
        let transcoder = Arc::new(FfmpegTranscoder::new(&config.audio));
        Ok(Self::with_services(config, provider, transcoder))
    }

    /// Create a controller with explicit speech and transcoder backends
    pub fn with_services(config: Config, provider: Arc<dyn SpeechProvider>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            config,
            provider,
            transcoder,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dispatch on the input: EPUB is exported, a text file is narrated,
    /// a directory has every text file in it narrated
    pub async fn run(&self, input: PathBuf, cover: Option<PathBuf>) -> Result<()> {
        match FileManager::detect_file_type(&input)? {
            FileType::Epub => {
                let export = self.export_epub(&input)?;
                info!(
                    "Exported {} chapter files; review them, then run again on a text file or folder",
                    export.chapter_files.len()
                );
                Ok(())
            }
            FileType::Text => {
                let output = self.narrate_file(&input, cover.as_deref(), None).await?;
                info!(
                    "Done: {} ({} subtitle cues in {})",
                    output.m4b_path.display(),
                    output.cue_count,
                    output.subtitle_path.display()
                );
                Ok(())
            }
            FileType::Directory => {
                let summary = self.run_folder(input, cover).await?;
                Self::summary_result(&summary)
            }
            FileType::Unknown => Err(anyhow!("Unsupported input {:?}: expected .epub, .txt or a folder", input)),
        }
    }

    /// Export an EPUB to numbered chapter text files and its cover
    pub fn export_epub(&self, epub_path: &Path) -> Result<EpubExport> {
        epub_export::export_epub(epub_path)
    }

    /// Narrate one plain-text book into `<base>.m4b` plus a subtitle file
    pub async fn narrate_file(&self, text_path: &Path, cover: Option<&Path>, multi_progress: Option<MultiProgress>) -> Result<BookOutput> {
        let start_time = std::time::Instant::now();
        let book = Book::from_file(text_path)?;
        let base = FileManager::base_path(text_path);

        info!(
            "Narrating '{}' by {} ({} chapters) with voice {}",
            book.title,
            book.author,
            book.chapters.len(),
            self.config.speech.voice
        );

        let mut pipeline = NarrationPipeline::new(self.config.clone(), self.provider.clone(), self.transcoder.clone())
            .with_progress(self.show_progress);
        if let Some(multi) = multi_progress {
            pipeline = pipeline.with_multi_progress(multi);
        }

        let narrated = pipeline.narrate_book(&book, &base).await?;

        let format = self.config.subtitles.format;
        let subtitle_path = FileManager::artifact_path(&base, &format!(".{}", format.extension()));
        let track = SubtitleTrack::new(narrated.cues, format);
        info!("Writing subtitles to {}", subtitle_path.display());
        track.write_to_file(&subtitle_path)?;

        let assembled = AudiobookAssembler::new(self.transcoder.clone())
            .assemble(
                &narrated.chapter_files,
                &narrated.chapter_titles,
                &book.author,
                &book.title,
                &base,
                cover,
            )
            .await?;

        info!(
            "'{}' finished in {}",
            book.title,
            Self::format_duration(start_time.elapsed())
        );

        Ok(BookOutput {
            m4b_path: assembled.m4b_path,
            subtitle_path,
            cue_count: track.len(),
        })
    }

    /// Narrate every `.txt` file in a directory as its own book
    pub async fn run_folder(&self, input_dir: PathBuf, cover: Option<PathBuf>) -> Result<RunSummary> {
        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let text_files = FileManager::find_files(&input_dir, "txt")?;
        if text_files.is_empty() {
            return Err(anyhow!("No text files found in directory: {:?}", input_dir));
        }

        let summary = self
            .narrate_many(text_files, cover, self.config.batch.max_parallel_books)
            .await;
        self.write_summary_log(&input_dir, &summary);
        Ok(summary)
    }

    /// Export an EPUB and narrate a range of its chapters, each as its own book.
    ///
    /// `from_chapter` and `to_chapter` are 1-based positions in the exported
    /// chapter list, both inclusive.
    pub async fn run_batch(
        &self,
        epub_path: &Path,
        from_chapter: Option<usize>,
        to_chapter: Option<usize>,
        jobs: Option<usize>,
    ) -> Result<RunSummary> {
        let export = self.export_epub(epub_path)?;
        let selected = select_chapters(&export.chapter_files, from_chapter, to_chapter);
        if selected.is_empty() {
            return Err(anyhow!(
                "No chapters selected from {} (exported {})",
                epub_path.display(),
                export.chapter_files.len()
            ));
        }

        let jobs = jobs.unwrap_or(self.config.batch.max_parallel_books).max(1);
        info!("Narrating {} chapters with {} parallel jobs", selected.len(), jobs);

        let summary = self.narrate_many(selected, export.cover_path, jobs).await;
        let log_dir = epub_path.parent().unwrap_or_else(|| Path::new("."));
        self.write_summary_log(log_dir, &summary);
        Ok(summary)
    }

    /// Narrate books as independent tasks; a failure is logged and the rest continue
    async fn narrate_many(&self, files: Vec<PathBuf>, cover: Option<PathBuf>, jobs: usize) -> RunSummary {
        let multi_progress = MultiProgress::new();
        let overall = multi_progress.add(ProgressBar::new(files.len() as u64));
        if self.show_progress {
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} books ({percent}%) {msg} {eta}")
                .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            overall.set_style(style.progress_chars("█▓▒░"));
            overall.set_message("Narrating books");
        } else {
            overall.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }

        let results = stream::iter(files)
            .map(|file| {
                let cover = cover.clone();
                let multi_progress = multi_progress.clone();
                let overall = overall.clone();
                async move {
                    let result = self.narrate_file(&file, cover.as_deref(), Some(multi_progress)).await;
                    overall.inc(1);
                    (file, result)
                }
            })
            .buffer_unordered(jobs.max(1))
            .collect::<Vec<_>>()
            .await;

        overall.finish_with_message("Narration complete");

        let mut summary = RunSummary::default();
        for (file, result) in results {
            match result {
                Ok(output) => summary.processed.push(output),
                Err(e) => {
                    error!("Error processing {}: {:#}", file.display(), e);
                    summary.failed.push((file, format!("{:#}", e)));
                }
            }
        }
        summary.processed.sort_by(|a, b| a.m4b_path.cmp(&b.m4b_path));
        summary.failed.sort_by(|a, b| a.0.cmp(&b.0));

        info!(
            "Processing completed: {} narrated, {} errors",
            summary.processed.len(),
            summary.failed.len()
        );
        summary
    }

    fn write_summary_log(&self, dir: &Path, summary: &RunSummary) {
        if summary.failed.is_empty() {
            return;
        }
        let log_file_path = dir.join("bookvox.issues.log");
        for (file, message) in &summary.failed {
            if let Err(e) = FileManager::append_to_log_file(&log_file_path, &format!("{}: {}", file.display(), message)) {
                warn!("Failed to write issues log: {}", e);
                return;
            }
        }
        info!("Issues written to {}", log_file_path.display());
    }

    /// Turn a summary into the process outcome
    pub fn summary_result(summary: &RunSummary) -> Result<()> {
        if summary.failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} of {} books failed",
                summary.failed.len(),
                summary.failed.len() + summary.processed.len()
            ))
            .context("Batch finished with errors")
        }
    }

    /// Format a duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Pick the 1-based inclusive range `[from, to]` out of the exported chapter files
pub fn select_chapters(files: &[PathBuf], from_chapter: Option<usize>, to_chapter: Option<usize>) -> Vec<PathBuf> {
    let from = from_chapter.unwrap_or(1).max(1);
    let to = to_chapter.unwrap_or(files.len()).min(files.len());
    if from > to {
        return Vec::new();
    }
    files[from - 1..to].to_vec()
}
