/*!
 * EPUB export.
 *
 * An EPUB is not narrated directly. Every spine document becomes a numbered
 * text file `<stem>-<i>.txt` in the book text format (a `# title` heading,
 * then one paragraph per line) that can be reviewed and edited before the
 * narration run. The cover image, if the EPUB declares one, is saved next to
 * the text files.
 */

use anyhow::{Context, Result};
use epub::doc::EpubDoc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

static H1_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1(?:\s[^>]*)?>(.*?)</h1>").expect("valid h1 regex"));
static P_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").expect("valid p regex"));
static LINK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<a\s[^>]*href[^>]*>(.*?)</a>").expect("valid link regex"));
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid entity regex"));
static SPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s©]+").expect("valid whitespace regex"));

/// Text extracted from one spine document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedChapter {
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
}

impl ExportedChapter {
    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.is_empty())
    }

    /// Render in the book text format
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            text.push_str(&format!("# {}\n\n", title));
        }
        for paragraph in &self.paragraphs {
            text.push_str(paragraph);
            text.push('\n');
        }
        text
    }
}

/// Files written by an export
#[derive(Debug, Clone, Default)]
pub struct EpubExport {
    pub chapter_files: Vec<PathBuf>,
    pub cover_path: Option<PathBuf>,
}

/// Pull the `<h1>` title and the `<p>` paragraphs out of an XHTML document.
///
/// Links whose text has no letters (footnote markers) are dropped.
pub fn extract_chapter(html: &str) -> ExportedChapter {
    let without_footnotes = LINK_REGEX.replace_all(html, |caps: &regex::Captures| {
        let inner = strip_tags(&caps[1]);
        if inner.chars().any(char::is_alphabetic) {
            caps[0].to_string()
        } else {
            String::new()
        }
    });

    let title = H1_REGEX
        .captures(&without_footnotes)
        .map(|caps| clean_text(&caps[1]));

    let paragraphs = P_REGEX
        .captures_iter(&without_footnotes)
        .map(|caps| clean_text(&caps[1]))
        .collect();

    ExportedChapter { title, paragraphs }
}

fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

/// Strip markup, decode entities, collapse whitespace and `©`
fn clean_text(html: &str) -> String {
    let text = decode_entities(&strip_tags(html));
    SPACE_REGEX.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    ENTITY_REGEX
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                "copy" => Some('©'),
                "hellip" => Some('…'),
                "mdash" => Some('—'),
                "ndash" => Some('–'),
                "lsquo" => Some('‘'),
                "rsquo" => Some('’'),
                "ldquo" => Some('“'),
                "rdquo" => Some('”'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => entity[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn cover_extension(mime: &str) -> &str {
    match mime.rsplit('/').next().unwrap_or("") {
        "jpeg" | "jpg" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        "svg+xml" => "svg",
        _ => "img",
    }
}

/// Export an EPUB into numbered chapter text files next to it
pub fn export_epub<P: AsRef<Path>>(epub_path: P) -> Result<EpubExport> {
    let epub_path = epub_path.as_ref();
    let base = FileManager::base_path(epub_path);
    let mut doc = EpubDoc::new(epub_path)
        .with_context(|| format!("Failed to open EPUB at {}", epub_path.display()))?;

    let mut export = EpubExport::default();

    if let Some((data, mime)) = doc.get_cover() {
        let cover_path = FileManager::artifact_path(&base, &format!(".{}", cover_extension(&mime)));
        std::fs::write(&cover_path, &data)
            .with_context(|| format!("Failed to save cover image {}", cover_path.display()))?;
        info!("Cover image saved to {}", cover_path.display());
        export.cover_path = Some(cover_path);
    } else {
        warn!("No cover image found in {}", epub_path.display());
    }

    let mut index = 0usize;
    loop {
        if let Some((content, _mime)) = doc.get_current_str() {
            index += 1;
            let chapter = extract_chapter(&content);
            if chapter.is_empty() {
                debug!("Skipping empty chapter {}", index);
            } else {
                let outfile = FileManager::artifact_path(&base, &format!("-{}.txt", index));
                info!("Exporting {} to {}", epub_path.display(), outfile.display());
                FileManager::write_to_file(&outfile, &chapter.to_text())?;
                export.chapter_files.push(outfile);
            }
        }

        if !doc.go_next() {
            break;
        }
    }

    info!("Exported {} chapters from {}", export.chapter_files.len(), epub_path.display());
    Ok(export)
}
