//! Searchable-text extraction for tracked files.
//!
//! The blob is `"<filename tokens> <extension> <content>"`. Unsupported file
//! types produce an empty string, which keeps them out of the semantic index
//! and out of clustering.

use std::{
    fs::File,
    io::Read,
    path::Path,
    process::Command,
};

use anyhow::{anyhow, Context, Result};

use crate::{db::models::file_extension, log_warn};

const ENABLE_LOGS: bool = true;

/// Document extensions eligible for indexing and clustering.
pub const DOCUMENT_EXTENSIONS: [&str; 9] = [
    "pdf", "txt", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "csv",
];

/// Plain-text files are truncated to this many bytes before tokenising.
const MAX_PLAIN_TEXT_BYTES: u64 = 64 * 1024;

pub fn is_document_extension(ext: &str) -> bool {
    DOCUMENT_EXTENSIONS.contains(&ext)
}

pub fn is_document_path(path: &str) -> bool {
    file_extension(path).is_some_and(|ext| is_document_extension(&ext))
}

/// Filename stem, lower-cased, with `_` and `-` turned into spaces.
pub fn filename_tokens(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .replace(['_', '-'], " ")
        .to_lowercase()
}

pub fn get_searchable_text(path: &str) -> String {
    let Some(ext) = file_extension(path) else {
        return String::new();
    };
    if !is_document_extension(&ext) {
        return String::new();
    }

    let content = match extract_content(path, &ext) {
        Ok(content) => content,
        Err(err) => {
            log_warn!("Could not extract content from {path}: {err:#}");
            String::new()
        }
    };

    format!("{} {} {}", filename_tokens(path), ext, content)
        .trim()
        .to_string()
}

fn extract_content(path: &str, ext: &str) -> Result<String> {
    match ext {
        "pdf" => extract_pdf_text(path),
        "txt" | "csv" => read_plain_text(path),
        _ => Ok(String::new()),
    }
}

fn read_plain_text(path: &str) -> Result<String> {
    let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
    let mut bytes = Vec::new();
    file.take(MAX_PLAIN_TEXT_BYTES)
        .read_to_end(&mut bytes)
        .with_context(|| format!("failed to read {path}"))?;
    Ok(collapse_whitespace(&String::from_utf8_lossy(&bytes)))
}

/// Uses poppler's `pdftotext`; a missing binary is reported as an error and
/// the caller falls back to filename tokens only.
fn extract_pdf_text(path: &str) -> Result<String> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|err| anyhow!("pdftotext command failed: {err} (is poppler installed?)"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("pdftotext failed: {}", stderr.trim()));
    }

    Ok(collapse_whitespace(&String::from_utf8_lossy(&output.stdout)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn unsupported_types_yield_empty_text() {
        assert_eq!(get_searchable_text("/photos/beach_photo.jpg"), "");
        assert_eq!(get_searchable_text("/bin/tool"), "");
    }

    #[test]
    fn unreadable_documents_keep_filename_and_extension() {
        let text = get_searchable_text("/does/not/exist/Exam_Notes-final.docx");
        assert_eq!(text, "exam notes final docx");
    }

    #[test]
    fn plain_text_content_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meeting_notes.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Quarterly\n  budget   review").unwrap();

        let text = get_searchable_text(path.to_str().unwrap());
        assert_eq!(text, "meeting notes txt Quarterly budget review");
    }

    #[test]
    fn extension_matching_ignores_case() {
        assert!(is_document_path("/docs/Invoice.PDF"));
        assert!(!is_document_path("/docs/song.mp3"));
    }
}
