/*!
 * Subtitle timeline reconstruction.
 *
 * Speech is synthesized one fragment at a time (a chapter title or a single
 * sentence) and every fragment reports word boundaries relative to its own
 * start. The `TimelineStitcher` walks fragments in the exact order their audio
 * is concatenated and translates those local timings into whole-book time.
 *
 * Silence that is appended to a fragment's audio never shows up in its word
 * events. Whoever drives the stitcher must fold it in with
 * [`TimelineStitcher::add_silence`] at the same boundaries the audio gets it,
 * otherwise every later cue drifts ahead of the audio.
 */

use serde::{Deserialize, Serialize};

/// A spoken word, relative to the start of its own fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEvent {
    /// Microseconds from the start of the fragment audio
    pub offset_us: u64,
    /// Microseconds the word lasts
    pub duration_us: u64,
    /// Spoken word or boundary token
    pub text: String,
}

impl WordEvent {
    pub fn new(offset_us: u64, duration_us: u64, text: impl Into<String>) -> Self {
        Self {
            offset_us,
            duration_us,
            text: text.into(),
        }
    }

    /// End of the word relative to the fragment start
    pub fn end_us(&self) -> u64 {
        self.offset_us.saturating_add(self.duration_us)
    }
}

/// A cue in final-audio time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub start_us: u64,
    pub end_us: u64,
    pub text: String,
}

/// End of a fragment according to its word events.
///
/// This is `max(offset + duration)`, or 0 for a fragment without events, and
/// never the audio length: events and audio arrive on separate streams and the
/// audio usually carries trailing silence of its own.
pub fn fragment_end(events: &[WordEvent]) -> u64 {
    events.iter().map(WordEvent::end_us).max().unwrap_or(0)
}

/// Events of an already stitched unit, relative to the unit start, together
/// with the unit's full timeline length (fragment ends plus silences).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub events: Vec<WordEvent>,
    pub duration_us: u64,
}

/// One fragment's events and the silence appended after its audio
#[derive(Debug, Clone, Default)]
pub struct FragmentTiming {
    pub events: Vec<WordEvent>,
    pub trailing_silence_ms: u64,
}

impl FragmentTiming {
    pub fn new(events: Vec<WordEvent>) -> Self {
        Self {
            events,
            trailing_silence_ms: 0,
        }
    }

    pub fn with_silence(mut self, silence_ms: u64) -> Self {
        self.trailing_silence_ms = silence_ms;
        self
    }
}

/// Accumulates fragment events into one global subtitle track
#[derive(Debug, Default)]
pub struct TimelineStitcher {
    origin_us: u64,
    cumulative_offset_us: u64,
    cues: Vec<SubtitleCue>,
}

impl TimelineStitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start stitching at a non-zero position
    pub fn starting_at(offset_us: u64) -> Self {
        Self {
            origin_us: offset_us,
            cumulative_offset_us: offset_us,
            cues: Vec::new(),
        }
    }

    /// Running total of audio time preceding the next fragment
    pub fn cumulative_offset_us(&self) -> u64 {
        self.cumulative_offset_us
    }

    pub fn cue_count(&self) -> usize {
        self.cues.len()
    }

    /// Place a fragment's events at the current offset and move past the
    /// fragment. Returns the fragment end that was added to the offset.
    pub fn push_fragment(&mut self, events: &[WordEvent]) -> u64 {
        let end = fragment_end(events);
        self.place(events);
        self.cumulative_offset_us = self.cumulative_offset_us.saturating_add(end);
        end
    }

    /// Re-stitch a unit that was stitched earlier (possibly in another run)
    pub fn push_segment(&mut self, segment: &TimedSegment) {
        self.place(&segment.events);
        self.cumulative_offset_us = self.cumulative_offset_us.saturating_add(segment.duration_us);
    }

    /// Account for silence appended to the audio at this boundary
    pub fn add_silence(&mut self, duration_ms: u64) {
        self.advance(duration_ms.saturating_mul(1_000));
    }

    /// Move the offset forward by a caller-supplied duration
    pub fn advance(&mut self, duration_us: u64) {
        self.cumulative_offset_us = self.cumulative_offset_us.saturating_add(duration_us);
    }

    /// Final track, sorted by start time.
    ///
    /// Accumulation already produces ascending starts when durations are
    /// right; the sort keeps the output ordered when they are not. The sort is
    /// stable so cues sharing a start keep their fragment order.
    pub fn finish(mut self) -> Vec<SubtitleCue> {
        self.cues.sort_by_key(|cue| cue.start_us);
        self.cues
    }

    /// Collapse what was stitched so far into a segment relative to the
    /// position this stitcher started at
    pub fn into_segment(self) -> TimedSegment {
        let origin_us = self.origin_us;
        let duration_us = self.cumulative_offset_us - origin_us;
        let events = self
            .finish()
            .into_iter()
            .map(|cue| WordEvent::new(cue.start_us - origin_us, cue.end_us - cue.start_us, cue.text))
            .collect();
        TimedSegment { events, duration_us }
    }

    fn place(&mut self, events: &[WordEvent]) {
        for event in events {
            let start_us = self.cumulative_offset_us.saturating_add(event.offset_us);
            self.cues.push(SubtitleCue {
                start_us,
                end_us: start_us.saturating_add(event.duration_us),
                text: event.text.clone(),
            });
        }
    }
}

/// Run the whole stitching algorithm over fragments in concatenation order
pub fn stitch(fragments: &[FragmentTiming]) -> Vec<SubtitleCue> {
    let mut stitcher = TimelineStitcher::new();
    for fragment in fragments {
        stitcher.push_fragment(&fragment.events);
        stitcher.add_silence(fragment.trailing_silence_ms);
    }
    stitcher.finish()
}

/// Format microseconds as `H:MM:SS,mmm`. Hours are not wrapped at a day.
pub fn microseconds_to_timestamp(microseconds: u64) -> String {
    let total_ms = microseconds / 1_000;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}
