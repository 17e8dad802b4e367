/*!
 * # bookvox - narrated audiobooks with time-aligned subtitles
 *
 * A Rust library that turns a book into a chaptered M4B audiobook read by a
 * speech service, together with a subtitle track whose cues line up with the
 * finished audio.
 *
 * ## Features
 *
 * - Export EPUB chapters to editable text files (plus the cover image)
 * - Segment book text into chapters, paragraphs and sentences
 * - Concurrent per-sentence synthesis with retries
 * - Silence padding between titles, paragraphs and chapters
 * - Subtitle timeline stitched from per-fragment word boundaries
 * - WebVTT or SRT output
 * - M4B packaging with chapter markers and cover art via ffmpeg
 * - Checkpointed resume of interrupted runs
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `text_segmenter`: Book text parsing and sentence splitting
 * - `providers`: Speech service clients:
 *   - `providers::http`: Streaming HTTP speech client
 *   - `providers::mock`: Scripted provider for tests
 * - `synthesis`: Per-fragment retries and bounded concurrent batches
 * - `timeline`: Subtitle timeline stitching
 * - `subtitle_processor`: WebVTT / SRT output
 * - `transcoder`: ffmpeg / ffprobe access
 * - `checkpoint`: Resume markers
 * - `narration`: Chapter and paragraph driver
 * - `audiobook`: Chapter metadata and M4B assembly
 * - `epub_export`: EPUB to chapter text files
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audiobook;
pub mod checkpoint;
pub mod epub_export;
pub mod errors;
pub mod file_utils;
pub mod narration;
pub mod providers;
pub mod subtitle_processor;
pub mod synthesis;
pub mod text_segmenter;
pub mod timeline;
pub mod transcoder;

// Re-export main types for easier usage
pub use app_config::Config;
pub use narration::{NarratedBook, NarrationPipeline};
pub use subtitle_processor::{SubtitleFormat, SubtitleTrack};
pub use text_segmenter::{Book, Chapter};
pub use timeline::{SubtitleCue, TimedSegment, TimelineStitcher, WordEvent, microseconds_to_timestamp, stitch};
pub use errors::{AppError, ProviderError, SegmentError, SynthesisError, TranscodeError};
