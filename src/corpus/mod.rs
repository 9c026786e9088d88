
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CitationConfig;
use crate::{AssistError, Result};

static CHAPTER_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Chapter)(\d)").expect("valid regex"));
static SECTION_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Section)(\d)").expect("valid regex"));

/// One statute section: the unit of embedding, retrieval, and citation.
///
/// The same record is serialized into the metadata manifest, so the field
/// names here are part of the on-disk artifact format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionDocument {
    pub filename: String,
    pub chapter: Option<String>,
    pub section: Option<String>,
    pub link: Option<String>,
    pub full_text: String,
}

/// Splits a corpus filename like `Chapter183A_Section2.txt` into chapter
/// and section labels, re-inserting the space the scraper dropped
/// (`Chapter183A` becomes `Chapter 183A`). Anything that is not exactly
/// two `_`-separated tokens yields no labels; the document still loads, it
/// just cites with the fallback labels.
#[inline]
pub fn parse_filename(filename: &str) -> (Option<String>, Option<String>) {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename);

    let mut parts = stem.split('_');
    let (Some(chapter_raw), Some(section_raw), None) = (parts.next(), parts.next(), parts.next())
    else {
        return (None, None);
    };

    let chapter = CHAPTER_LABEL_REGEX
        .replace(chapter_raw.trim(), "$1 $2")
        .into_owned();
    let section = SECTION_LABEL_REGEX
        .replace(section_raw.trim(), "$1 $2")
        .into_owned();

    (Some(chapter), Some(section))
}

/// Loads every `.txt` file under `directory` as a section document, sorted
/// by path so repeated builds see the corpus in the same order. Files that
/// cannot be read are logged and skipped; a directory that cannot be
/// listed at all is an error. An empty result is not an error here.
#[inline]
pub fn load_sections(
    directory: &Path,
    citations: &CitationConfig,
) -> Result<Vec<SectionDocument>> {
    let entries = fs::read_dir(directory).map_err(|e| {
        AssistError::Corpus(format!(
            "Failed to read corpus directory {}: {e}",
            directory.display()
        ))
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("txt") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Error reading file {}: {e}", path.display());
                continue;
            }
        };

        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            warn!("Skipping file with non-UTF-8 name: {}", path.display());
            continue;
        };

        let (chapter, section) = parse_filename(filename);
        let link = section_link(citations, chapter.as_deref(), section.as_deref());

        debug!("Loaded {} ({} bytes)", filename, text.len());
        documents.push(SectionDocument {
            filename: filename.to_string(),
            chapter,
            section,
            link,
            full_text: text.trim().to_string(),
        });
    }

    Ok(documents)
}

/// Canonical statute URL for a parsed document, or nothing when either
/// label is missing or empty.
#[inline]
pub fn section_link(
    citations: &CitationConfig,
    chapter: Option<&str>,
    section: Option<&str>,
) -> Option<String> {
    match (chapter, section) {
        (Some(chapter), Some(section)) if !chapter.is_empty() && !section.is_empty() => {
            Some(citations.section_url(chapter, section))
        }
        _ => None,
    }
}
