//! Document type detection.
//!
//! Classifies uploaded bytes by magic-number sniffing first, falling back to
//! the filename extension, then to a textual prologue sniff. Never errors:
//! unrecognized input yields [`DocumentType::Unknown`].

use crate::models::DocumentType;

/// Classify uploaded content. Pure function of the bytes and filename.
pub fn detect(content: &[u8], filename: &str) -> DocumentType {
    if let Some(t) = sniff_magic(content, filename) {
        return t;
    }
    if let Some(t) = from_extension(filename) {
        return t;
    }
    if let Some(t) = sniff_text(content) {
        return t;
    }
    DocumentType::Unknown
}

/// Byte-signature detection for binary formats.
fn sniff_magic(content: &[u8], filename: &str) -> Option<DocumentType> {
    if content.starts_with(b"%PDF-") {
        return Some(DocumentType::Pdf);
    }
    if content.starts_with(b"PK\x03\x04") {
        // OOXML containers are ZIP archives; the extension disambiguates.
        if filename.to_ascii_lowercase().ends_with(".docx") {
            return Some(DocumentType::Docx);
        }
        return None;
    }
    if content.starts_with(b"\x89PNG\r\n\x1a\n")
        || content.starts_with(b"\xFF\xD8\xFF")
        || content.starts_with(b"GIF87a")
        || content.starts_with(b"GIF89a")
        || content.starts_with(b"BM")
    {
        return Some(DocumentType::Image);
    }
    if content.starts_with(b"ID3") || content.starts_with(b"OggS") || content.starts_with(b"fLaC") {
        return Some(DocumentType::Audio);
    }
    if content.len() >= 12 && &content[0..4] == b"RIFF" {
        return match &content[8..12] {
            b"WAVE" => Some(DocumentType::Audio),
            b"AVI " => Some(DocumentType::Video),
            _ => None,
        };
    }
    if content.len() >= 12 && &content[4..8] == b"ftyp" {
        return Some(DocumentType::Video);
    }
    None
}

/// Filename extension fallback when the signature is inconclusive.
fn from_extension(filename: &str) -> Option<DocumentType> {
    let lower = filename.to_ascii_lowercase();
    if !lower.contains('.') {
        return None;
    }
    let ext = lower.rsplit('.').next()?;
    match ext {
        "pdf" => Some(DocumentType::Pdf),
        "docx" => Some(DocumentType::Docx),
        "txt" | "text" | "log" => Some(DocumentType::PlainText),
        "md" | "markdown" => Some(DocumentType::Markdown),
        "html" | "htm" | "xhtml" => Some(DocumentType::Html),
        "json" => Some(DocumentType::Json),
        "csv" | "tsv" => Some(DocumentType::Csv),
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tiff" => Some(DocumentType::Image),
        "mp3" | "wav" | "ogg" | "flac" | "m4a" => Some(DocumentType::Audio),
        "mp4" | "avi" | "mkv" | "mov" | "webm" => Some(DocumentType::Video),
        _ => None,
    }
}

/// Last-resort prologue sniff for markup-like text content.
fn sniff_text(content: &[u8]) -> Option<DocumentType> {
    let head = std::str::from_utf8(&content[..content.len().min(512)]).ok()?;
    let trimmed = head.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        return Some(DocumentType::Html);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(DocumentType::Json);
    }
    None
}
