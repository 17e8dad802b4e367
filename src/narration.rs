/*!
 * Book narration driver.
 *
 * Walks a book chapter by chapter and paragraph by paragraph. For every unit
 * the same ordered fragment list feeds three consumers: the synthesizer, the
 * silence inserter and the timeline stitcher, and the unit's audio is the
 * concatenation of its fragments in that same order.
 *
 * Unit layout per chapter `C` of a book with artifact prefix `<base>`:
 *
 * ```text
 * <base>-partC-title.mp3        title fragment + sentence silence
 * <base>-partC-sntncN.mp3       sentence N of the paragraph being built
 * <base>-partC-pgraphsP.flac    sentences of paragraph P + sentence silence
 *                               (+ chapter silence for the last paragraph)
 * <base>-partC.flac             title + paragraphs
 * ```
 *
 * Each finished unit leaves a checkpoint marker, so an interrupted run picks
 * up at the first unfinished unit and still produces complete subtitles.
 */

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::checkpoint::{UnitCheckpoint, fingerprint};
use crate::file_utils::FileManager;
use crate::providers::SpeechProvider;
use crate::synthesis::{BatchSynthesizer, FragmentRequest, SynthesisService, SynthesizedFragment};
use crate::text_segmenter::{Book, Chapter, has_alphanumeric, split_sentences};
use crate::timeline::{SubtitleCue, TimedSegment, TimelineStitcher};
use crate::transcoder::Transcoder;

/// Result of narrating a whole book
#[derive(Debug, Clone)]
pub struct NarratedBook {
    /// Chapter audio files in book order
    pub chapter_files: Vec<PathBuf>,
    /// Chapter titles in book order
    pub chapter_titles: Vec<String>,
    /// Subtitle cues over the concatenated chapter audio
    pub cues: Vec<SubtitleCue>,
}

/// Drives synthesis, silence insertion, concatenation and stitching
#[derive(Debug, Clone)]
pub struct NarrationPipeline {
    config: Config,
    synthesizer: BatchSynthesizer,
    transcoder: Arc<dyn Transcoder>,
    show_progress: bool,
    multi_progress: Option<MultiProgress>,
}

impl NarrationPipeline {
    pub fn new(config: Config, provider: Arc<dyn SpeechProvider>, transcoder: Arc<dyn Transcoder>) -> Self {
        let service = SynthesisService::new(provider, &config.speech);
        Self {
            synthesizer: BatchSynthesizer::new(service),
            config,
            transcoder,
            show_progress: true,
            multi_progress: None,
        }
    }

    /// Enable or disable the per-chapter progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Draw progress bars inside a shared display (parallel books)
    pub fn with_multi_progress(mut self, multi_progress: MultiProgress) -> Self {
        self.multi_progress = Some(multi_progress);
        self
    }

    pub fn transcoder(&self) -> Arc<dyn Transcoder> {
        Arc::clone(&self.transcoder)
    }

    fn voice(&self) -> &str {
        &self.config.speech.voice
    }

    fn sentence_silence_ms(&self) -> u64 {
        self.config.audio.sentence_silence_ms
    }

    fn chapter_silence_ms(&self) -> u64 {
        self.config.audio.chapter_silence_ms
    }

    /// Narrate every chapter of `book`, naming artifacts after `base`
    pub async fn narrate_book(&self, book: &Book, base: &Path) -> Result<NarratedBook> {
        let mut stitcher = TimelineStitcher::new();
        let mut chapter_files = Vec::with_capacity(book.chapters.len());

        for (i, chapter) in book.chapters.iter().enumerate() {
            let (path, segment) = self.narrate_chapter(chapter, base, i + 1).await?;
            stitcher.push_segment(&segment);
            chapter_files.push(path);
        }

        info!(
            "Narrated {} chapters of '{}', {} subtitle cues",
            chapter_files.len(),
            book.title,
            stitcher.cue_count()
        );

        Ok(NarratedBook {
            chapter_files,
            chapter_titles: book.chapter_titles(),
            cues: stitcher.finish(),
        })
    }

    /// Narrate one chapter into `<base>-part<number>.flac`
    pub async fn narrate_chapter(&self, chapter: &Chapter, base: &Path, number: usize) -> Result<(PathBuf, TimedSegment)> {
        let chapter_path = FileManager::artifact_path(base, &format!("-part{}.flac", number));
        let chapter_fp = fingerprint(
            self.voice(),
            &chapter_text(chapter),
            &[self.sentence_silence_ms(), self.chapter_silence_ms()],
        );

        if let Some(checkpoint) = UnitCheckpoint::load_if_complete(&chapter_path, &chapter_fp) {
            info!("{} exists, skipping to next chapter", chapter_path.display());
            return Ok((chapter_path, checkpoint.segment));
        }

        info!("Chapter {}: {}", number, chapter.title);

        let paragraphs: Vec<Vec<String>> = chapter
            .paragraphs
            .iter()
            .map(|p| split_sentences(p).into_iter().filter(|s| has_alphanumeric(s)).collect::<Vec<_>>())
            .filter(|sentences| !sentences.is_empty())
            .collect();

        let progress = self.progress_bar(paragraphs.len() as u64, &chapter.title);
        let mut stitcher = TimelineStitcher::new();
        let mut parts = Vec::with_capacity(paragraphs.len() + 1);

        let title_path = FileManager::artifact_path(base, &format!("-part{}-title.mp3", number));
        let title_segment = self.narrate_title(&chapter.title, &title_path).await?;
        stitcher.push_segment(&title_segment);
        parts.push(title_path);

        let last = paragraphs.len().saturating_sub(1);
        for (p, sentences) in paragraphs.iter().enumerate() {
            let paragraph_path = FileManager::artifact_path(base, &format!("-part{}-pgraphs{}.flac", number, p));
            let sentence_base = FileManager::artifact_path(base, &format!("-part{}", number));
            let segment = self
                .narrate_paragraph(sentences, &sentence_base, &paragraph_path, p == last)
                .await?;
            stitcher.push_segment(&segment);
            parts.push(paragraph_path);
            progress.inc(1);
        }

        self.transcoder
            .concat(&parts, &chapter_path)
            .await
            .with_context(|| format!("Failed to build chapter audio {}", chapter_path.display()))?;

        let segment = stitcher.into_segment();
        UnitCheckpoint::new(&chapter_path, chapter_fp, segment.clone()).store(&chapter_path)?;

        for part in &parts {
            UnitCheckpoint::remove(part)?;
        }
        FileManager::remove_files(&parts)?;

        progress.finish_and_clear();
        debug!("Chapter {} timeline length {} us", number, segment.duration_us);
        Ok((chapter_path, segment))
    }

    /// Title fragment followed by sentence silence
    async fn narrate_title(&self, title: &str, title_path: &Path) -> Result<TimedSegment> {
        let title_fp = fingerprint(self.voice(), title, &[self.sentence_silence_ms()]);
        if let Some(checkpoint) = UnitCheckpoint::load_if_complete(title_path, &title_fp) {
            debug!("{} exists, reusing title", title_path.display());
            return Ok(checkpoint.segment);
        }

        let fragments = self
            .synthesizer
            .synthesize_batch(vec![FragmentRequest::new(0, title, title_path)])
            .await?;

        let mut stitcher = TimelineStitcher::new();
        self.stitch_fragments(&mut stitcher, &fragments).await?;

        self.transcoder.append_silence(title_path, self.sentence_silence_ms()).await?;
        stitcher.add_silence(self.sentence_silence_ms());

        let segment = stitcher.into_segment();
        UnitCheckpoint::new(title_path, title_fp, segment.clone()).store(title_path)?;
        Ok(segment)
    }

    /// Sentences of one paragraph, concatenated into `paragraph_path`
    async fn narrate_paragraph(
        &self,
        sentences: &[String],
        sentence_base: &Path,
        paragraph_path: &Path,
        closes_chapter: bool,
    ) -> Result<TimedSegment> {
        let tail_ms = if closes_chapter { self.chapter_silence_ms() } else { 0 };
        let paragraph_fp = fingerprint(
            self.voice(),
            &sentences.join(" "),
            &[self.sentence_silence_ms(), tail_ms],
        );

        if let Some(checkpoint) = UnitCheckpoint::load_if_complete(paragraph_path, &paragraph_fp) {
            info!("{} exists, skipping to next paragraph", paragraph_path.display());
            return Ok(checkpoint.segment);
        }

        let requests: Vec<FragmentRequest> = sentences
            .iter()
            .enumerate()
            .map(|(z, sentence)| {
                let path = FileManager::artifact_path(sentence_base, &format!("-sntnc{}.mp3", z + 1));
                FragmentRequest::new(z, sentence.as_str(), path)
            })
            .collect();

        let fragments = self.synthesizer.synthesize_batch(requests).await?;

        let mut stitcher = TimelineStitcher::new();
        self.stitch_fragments(&mut stitcher, &fragments).await?;

        let files: Vec<PathBuf> = fragments.iter().map(|f| f.audio_path.clone()).collect();
        if let Some(last) = files.last() {
            self.transcoder.append_silence(last, self.sentence_silence_ms()).await?;
            stitcher.add_silence(self.sentence_silence_ms());
        }

        self.transcoder
            .concat(&files, paragraph_path)
            .await
            .with_context(|| format!("Failed to build paragraph audio {}", paragraph_path.display()))?;
        FileManager::remove_files(&files)?;

        if closes_chapter {
            self.transcoder.append_silence(paragraph_path, tail_ms).await?;
            stitcher.add_silence(tail_ms);
        }

        let segment = stitcher.into_segment();
        UnitCheckpoint::new(paragraph_path, paragraph_fp, segment.clone()).store(paragraph_path)?;
        Ok(segment)
    }

    /// Push fragments in index order; fragments without word events are
    /// advanced by their measured audio length when that is enabled
    async fn stitch_fragments(&self, stitcher: &mut TimelineStitcher, fragments: &[SynthesizedFragment]) -> Result<()> {
        for fragment in fragments {
            stitcher.push_fragment(&fragment.events);
            if fragment.events.is_empty() && self.config.audio.measure_silent_fragments {
                let measured = self.transcoder.duration_us(&fragment.audio_path).await?;
                debug!(
                    "Fragment {:?} has no word events, advancing by measured {} us",
                    fragment.text, measured
                );
                stitcher.advance(measured);
            }
        }
        Ok(())
    }

    fn progress_bar(&self, len: u64, title: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = match &self.multi_progress {
            Some(multi) => multi.add(ProgressBar::new(len)),
            None => ProgressBar::new(len),
        };
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} paragraphs ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message(title.to_string());
        progress_bar
    }
}

/// Everything that is spoken in a chapter, for fingerprinting
fn chapter_text(chapter: &Chapter) -> String {
    let mut text = chapter.title.clone();
    for paragraph in &chapter.paragraphs {
        text.push('\n');
        text.push_str(paragraph);
    }
    text
}
