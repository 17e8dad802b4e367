/*!
 * Book text segmentation.
 *
 * Plain-text books are split into chapters, chapters into paragraphs and
 * paragraphs into sentences. The input format is the one produced by the EPUB
 * export: optional `Title:` / `Author:` header lines, `#` headings starting
 * chapters, one paragraph per line.
 */

use anyhow::{Context, Result};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::errors::SegmentError;

/// Title used for chapters without a usable heading
pub const BLANK_TITLE: &str = "blank";

const DEFAULT_AUTHOR: &str = "Unknown";

// Candidate sentence boundary: terminal punctuation, closing quotes/brackets, whitespace
static BOUNDARY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[.!?…]+["'”’»)\]]*\s+"#).expect("valid boundary regex")
});

static REPEATED_BANG: Lazy<Regex> = Lazy::new(|| Regex::new(r"!+").expect("valid regex"));
static REPEATED_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?+").expect("valid regex"));

// Lowercased, without the trailing period
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "al", "e.g", "i.e",
    "fig", "gen", "col", "capt", "lt", "sgt", "rev", "hon", "inc", "ltd", "vol",
    "jan", "feb", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// A chapter of the book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Chapter heading, `"blank"` when the source had none
    pub title: String,
    /// Paragraphs, each a space-joined run of sentences
    pub paragraphs: Vec<String>,
}

impl Chapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: normalize_title(&title.into()),
            paragraphs: Vec::new(),
        }
    }

    pub fn sentence_count(&self) -> usize {
        self.paragraphs.iter().map(|p| split_sentences(p).len()).sum()
    }
}

/// A parsed book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub chapters: Vec<Chapter>,
}

impl Book {
    /// Read and segment a plain-text book; the file stem is the fallback title
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read book text: {}", path.display()))?;
        let fallback_title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let book = parse_book(&text, &fallback_title);
        if book.chapters.is_empty() {
            return Err(SegmentError::EmptyBook(path.display().to_string()).into());
        }
        Ok(book)
    }

    pub fn chapter_titles(&self) -> Vec<String> {
        self.chapters.iter().map(|c| c.title.clone()).collect()
    }
}

/// Split book text into header metadata and chapters
pub fn parse_book(text: &str, fallback_title: &str) -> Book {
    let mut title = fallback_title.to_string();
    let mut author = DEFAULT_AUTHOR.to_string();
    let mut chapters = Vec::new();
    let mut current: Option<Chapter> = None;
    let mut header_lines = 0;

    for raw_line in text.lines() {
        // Header lines are only honoured before any chapter content
        if current.is_none() && header_lines < 2 {
            if let Some(value) = raw_line.strip_prefix("Title:") {
                title = value.trim().to_string();
                header_lines += 1;
                continue;
            }
            if let Some(value) = raw_line.strip_prefix("Author:") {
                author = value.trim().to_string();
                header_lines += 1;
                continue;
            }
        }

        let line = raw_line.trim();
        if let Some(heading) = line.strip_prefix('#') {
            let heading = heading.trim_start_matches('#');
            match current.as_mut() {
                // Consecutive headings: the later one names the chapter
                Some(chapter) if chapter.paragraphs.is_empty() => {
                    chapter.title = normalize_title(heading);
                }
                _ => {
                    if let Some(done) = current.take() {
                        chapters.push(done);
                    }
                    current = Some(Chapter::new(heading));
                }
            }
        } else if !line.is_empty() {
            let chapter = current.get_or_insert_with(|| Chapter::new(BLANK_TITLE));
            if let Some(paragraph) = prepare_paragraph(line) {
                chapter.paragraphs.push(paragraph);
            }
        }
    }

    if let Some(last) = current {
        if !last.paragraphs.is_empty() {
            chapters.push(last);
        }
    }

    debug!("Parsed '{}' by {}: {} chapters", title, author, chapters.len());
    Book { title, author, chapters }
}

/// Trim a heading; headings without alphanumeric content become `"blank"`
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if has_alphanumeric(trimmed) {
        trimmed.to_string()
    } else {
        BLANK_TITLE.to_string()
    }
}

/// Tokenize a paragraph and drop sentences with nothing to read
fn prepare_paragraph(line: &str) -> Option<String> {
    if !has_alphanumeric(line) {
        return None;
    }
    let sentences: Vec<String> = split_sentences(line)
        .into_iter()
        .filter(|s| has_alphanumeric(s))
        .collect();
    if sentences.is_empty() {
        None
    } else {
        Some(sentences.join(" "))
    }
}

pub fn has_alphanumeric(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Split a paragraph into sentences.
///
/// A boundary is terminal punctuation (with any closing quotes or brackets)
/// followed by whitespace, unless the word before it is a known abbreviation
/// or an initial, or the next word starts in lowercase.
pub fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in BOUNDARY_REGEX.find_iter(paragraph) {
        let punct = m.as_str().trim_end();
        let sentence_end = m.start() + punct.len();

        if punct.starts_with('.') && punct.trim_end_matches(['"', '\'', '”', '’', '»', ')', ']']) == "." {
            let word = preceding_word(&paragraph[start..m.start()]);
            if is_abbreviation(word) {
                continue;
            }
        }

        if let Some(next) = paragraph[m.end()..].chars().next() {
            if next.is_lowercase() {
                continue;
            }
        }

        let sentence = paragraph[start..sentence_end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = m.end();
    }

    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn preceding_word(text: &str) -> &str {
    let word = text.rsplit(char::is_whitespace).next().unwrap_or("");
    word.trim_start_matches(['"', '\'', '“', '‘', '«', '(', '['])
}

fn is_abbreviation(word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let mut chars = word.chars();
    // Single-letter initials such as "J." in "J. R. R. Tolkien"; the pronoun "I" is a word
    if let (Some(first), None) = (chars.next(), chars.next()) {
        return first.is_alphabetic() && first.is_uppercase() && first != 'I';
    }
    let lower = word.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Collapse runs of `!` and `?`, which some voices read out oddly
pub fn normalize_for_speech(sentence: &str) -> String {
    let collapsed = REPEATED_BANG.replace_all(sentence, "!");
    REPEATED_QUESTION.replace_all(&collapsed, "?").into_owned()
}
