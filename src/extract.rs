//! Multi-format text extraction.
//!
//! Converts uploaded bytes into plain UTF-8 text plus structural markers
//! (page, section, table/figure) anchored to byte offsets in that text.
//! One [`ExtractionStrategy`] exists per [`DocumentType`]; the pipeline
//! selects it through the [`ExtractorRegistry`] so adding a format never
//! touches the pipeline itself.

use std::io::Read;

use crate::models::{DocumentType, StructuralMarker};

/// Per-upload extraction options. Absent fields use the documented defaults.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub ocr: bool,
    pub ocr_language: String,
    pub extract_tables: bool,
    pub extract_figures: bool,
    pub vision_model: Option<String>,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            ocr: false,
            ocr_language: "eng".to_string(),
            extract_tables: false,
            extract_figures: false,
            vision_model: None,
        }
    }
}

/// Uniform extraction output, regardless of which strategy produced it.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub text: String,
    pub markers: Vec<StructuralMarker>,
    pub page_count: Option<i64>,
    pub language: Option<String>,
}

/// Extraction failure. Never escapes the pipeline boundary; the job tracker
/// records the reason and the document is left failed.
#[derive(Debug)]
pub enum ExtractError {
    /// No strategy can handle this content (unknown type, media without an
    /// OCR/transcription backend). Retrying cannot help.
    Unsupported(String),
    /// Extraction succeeded but produced no text. Retrying cannot help.
    EmptyDocument,
    /// The format library could not parse the bytes. Assumed transient
    /// enough to be worth the retry budget.
    Parse(String),
}

impl ExtractError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Parse(_))
    }
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unsupported(reason) => write!(f, "unsupported content: {}", reason),
            ExtractError::EmptyDocument => write!(f, "document produced no extractable text"),
            ExtractError::Parse(reason) => write!(f, "extraction failed: {}", reason),
        }
    }
}

impl std::error::Error for ExtractError {}

/// One extraction implementation per document type.
pub trait ExtractionStrategy: Send + Sync {
    /// The document type this strategy handles.
    fn document_type(&self) -> DocumentType;

    fn extract(
        &self,
        content: &[u8],
        filename: &str,
        options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError>;
}

/// Lookup table from detected type to strategy.
pub struct ExtractorRegistry {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Registry pre-loaded with all built-in strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PlainTextExtractor));
        registry.register(Box::new(MarkdownExtractor));
        registry.register(Box::new(HtmlExtractor));
        registry.register(Box::new(CsvExtractor));
        registry.register(Box::new(JsonExtractor));
        registry.register(Box::new(PdfExtractor));
        registry.register(Box::new(DocxExtractor));
        registry.register(Box::new(MediaExtractor::new(DocumentType::Image)));
        registry.register(Box::new(MediaExtractor::new(DocumentType::Audio)));
        registry.register(Box::new(MediaExtractor::new(DocumentType::Video)));
        registry
    }

    /// Register a strategy. Later registrations shadow earlier ones for the
    /// same document type, so tests can inject replacements.
    pub fn register(&mut self, strategy: Box<dyn ExtractionStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn find(&self, document_type: DocumentType) -> Option<&dyn ExtractionStrategy> {
        self.strategies
            .iter()
            .rev()
            .find(|s| s.document_type() == document_type)
            .map(|s| s.as_ref())
    }

    /// Dispatch extraction to the strategy for `document_type`.
    pub fn extract(
        &self,
        content: &[u8],
        filename: &str,
        document_type: DocumentType,
        options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let strategy = self.find(document_type).ok_or_else(|| {
            ExtractError::Unsupported(format!("no extractor for document type '{}'", document_type))
        })?;
        let result = strategy.extract(content, filename, options)?;
        if result.text.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }
        Ok(result)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn utf8(content: &[u8]) -> Result<&str, ExtractError> {
    std::str::from_utf8(content)
        .map_err(|e| ExtractError::Parse(format!("content is not valid UTF-8: {}", e)))
}

// ============ Plain text ============

/// Pass-through extraction for plain text.
pub struct PlainTextExtractor;

impl ExtractionStrategy for PlainTextExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::PlainText
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        _options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        Ok(ExtractionResult {
            text: utf8(content)?.to_string(),
            markers: Vec::new(),
            page_count: Some(1),
            language: None,
        })
    }
}

// ============ Markdown ============

/// Markdown extraction: structural markup stripped, headings tracked as
/// section markers spanning up to the next heading.
pub struct MarkdownExtractor;

impl ExtractionStrategy for MarkdownExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Markdown
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        _options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let source = utf8(content)?;
        let mut out = String::new();
        let mut markers: Vec<StructuralMarker> = Vec::new();
        let mut open_section: Option<(String, usize)> = None;
        let mut in_fence = false;

        for line in source.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if !in_fence {
                if let Some(title) = heading_title(trimmed) {
                    if let Some((prev_title, start)) = open_section.take() {
                        markers.push(section_marker(&prev_title, start, out.len()));
                    }
                    let start = out.len();
                    out.push_str(title);
                    out.push('\n');
                    open_section = Some((title.to_string(), start));
                    continue;
                }
            }
            let cleaned = if !in_fence {
                strip_bullet(line)
            } else {
                line
            };
            out.push_str(cleaned);
            out.push('\n');
        }
        if let Some((title, start)) = open_section {
            markers.push(section_marker(&title, start, out.len()));
        }

        Ok(ExtractionResult {
            text: out,
            markers,
            page_count: Some(1),
            language: None,
        })
    }
}

fn heading_title(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    rest.strip_prefix(' ').map(|t| t.trim_end_matches('#').trim())
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim_start();
    for prefix in ["- ", "* ", "+ ", "> "] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest;
        }
    }
    line
}

fn section_marker(title: &str, start: usize, end: usize) -> StructuralMarker {
    StructuralMarker {
        section_title: Some(title.to_string()),
        start_offset: start,
        end_offset: end,
        ..Default::default()
    }
}

// ============ HTML ============

/// HTML extraction: markup stripped via the streaming XML reader, headings
/// preserved as section boundaries, script/style content dropped.
pub struct HtmlExtractor;

impl ExtractionStrategy for HtmlExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Html
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        _options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let mut reader = quick_xml::Reader::from_reader(content);
        reader.config_mut().trim_text(true);
        reader.config_mut().check_end_names = false;

        let mut out = String::new();
        let mut markers: Vec<StructuralMarker> = Vec::new();
        let mut open_section: Option<(String, usize)> = None;
        let mut language: Option<String> = None;
        let mut skip_depth = 0usize;
        let mut heading: Option<String> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(e)) => {
                    let name = e.local_name().as_ref().to_ascii_lowercase();
                    match name.as_slice() {
                        b"script" | b"style" => skip_depth += 1,
                        b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6" => {
                            heading = Some(String::new());
                        }
                        b"html" => {
                            language = e.attributes().flatten().find_map(|a| {
                                (a.key.as_ref() == b"lang")
                                    .then(|| String::from_utf8_lossy(&a.value).into_owned())
                            });
                        }
                        b"p" | b"div" | b"li" | b"tr" | b"br" => {
                            if !out.is_empty() && !out.ends_with('\n') {
                                out.push('\n');
                            }
                        }
                        _ => {}
                    }
                }
                Ok(quick_xml::events::Event::End(e)) => {
                    let name = e.local_name().as_ref().to_ascii_lowercase();
                    match name.as_slice() {
                        b"script" | b"style" => skip_depth = skip_depth.saturating_sub(1),
                        b"h1" | b"h2" | b"h3" | b"h4" | b"h5" | b"h6" => {
                            if let Some(title) = heading.take() {
                                if let Some((prev, start)) = open_section.take() {
                                    markers.push(section_marker(&prev, start, out.len()));
                                }
                                if !out.is_empty() && !out.ends_with('\n') {
                                    out.push('\n');
                                }
                                let start = out.len();
                                out.push_str(title.trim());
                                out.push('\n');
                                open_section = Some((title.trim().to_string(), start));
                            }
                        }
                        b"p" | b"div" | b"li" | b"tr" => {
                            if !out.is_empty() && !out.ends_with('\n') {
                                out.push('\n');
                            }
                        }
                        _ => {}
                    }
                }
                Ok(quick_xml::events::Event::Text(t)) => {
                    if skip_depth == 0 {
                        let text = t.unescape().unwrap_or_default();
                        let text = text.trim();
                        if !text.is_empty() {
                            if let Some(h) = heading.as_mut() {
                                if !h.is_empty() {
                                    h.push(' ');
                                }
                                h.push_str(text);
                            } else {
                                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                                    out.push(' ');
                                }
                                out.push_str(text);
                            }
                        }
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(ExtractError::Parse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }
        if let Some((title, start)) = open_section {
            markers.push(section_marker(&title, start, out.len()));
        }

        Ok(ExtractionResult {
            text: out,
            markers,
            page_count: Some(1),
            language,
        })
    }
}

// ============ CSV ============

/// CSV extraction: rows rendered to a readable `header: value` form rather
/// than raw comma text. Row structure surfaces as table markers when
/// `extract_tables` is set.
pub struct CsvExtractor;

impl ExtractionStrategy for CsvExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Csv
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let source = utf8(content)?;
        let mut lines = source.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<String> = match lines.next() {
            Some(line) => split_csv_line(line),
            None => return Ok(ExtractionResult::default()),
        };

        let mut out = String::new();
        out.push_str(&header.join(", "));
        out.push('\n');

        let mut markers = Vec::new();
        for (row_idx, line) in lines.enumerate() {
            let fields = split_csv_line(line);
            let start = out.len();
            let rendered: Vec<String> = fields
                .iter()
                .enumerate()
                .map(|(i, v)| match header.get(i) {
                    Some(h) if !h.is_empty() => format!("{}: {}", h, v),
                    _ => v.clone(),
                })
                .collect();
            out.push_str(&rendered.join("; "));
            out.push('\n');
            if options.extract_tables {
                markers.push(StructuralMarker {
                    table_id: Some(format!("row-{}", row_idx + 1)),
                    start_offset: start,
                    end_offset: out.len(),
                    ..Default::default()
                });
            }
        }

        Ok(ExtractionResult {
            text: out,
            markers,
            page_count: Some(1),
            language: None,
        })
    }
}

/// Minimal CSV field splitter with double-quote handling.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

// ============ JSON ============

/// JSON extraction: rendered to an indented readable form, keys preserved.
pub struct JsonExtractor;

impl ExtractionStrategy for JsonExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Json
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        _options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let value: serde_json::Value = serde_json::from_slice(content)
            .map_err(|e| ExtractError::Parse(format!("invalid JSON: {}", e)))?;
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        Ok(ExtractionResult {
            text,
            markers: Vec::new(),
            page_count: Some(1),
            language: None,
        })
    }
}

// ============ PDF ============

/// PDF extraction via `pdf-extract`. Page markers come from form-feed page
/// breaks where the library emits them.
pub struct PdfExtractor;

impl ExtractionStrategy for PdfExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Pdf
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        _options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let raw = pdf_extract::extract_text_from_mem(content)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        if !raw.contains('\x0c') {
            return Ok(ExtractionResult {
                text: raw,
                markers: Vec::new(),
                page_count: Some(1),
                language: None,
            });
        }

        // Rebuild without the form feeds, one page marker per segment.
        let mut text = String::new();
        let mut markers = Vec::new();
        let mut page = 0i64;
        for segment in raw.split('\x0c') {
            if segment.trim().is_empty() {
                continue;
            }
            page += 1;
            let start = text.len();
            text.push_str(segment);
            if !text.ends_with('\n') {
                text.push('\n');
            }
            markers.push(StructuralMarker {
                page_number: Some(page),
                start_offset: start,
                end_offset: text.len(),
                ..Default::default()
            });
        }
        Ok(ExtractionResult {
            text,
            markers,
            page_count: Some(page.max(1)),
            language: None,
        })
    }
}

// ============ DOCX ============

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// DOCX extraction: `word/document.xml` text runs, paragraph-aware, with
/// `Heading*`-styled paragraphs tracked as section markers.
pub struct DocxExtractor;

impl ExtractionStrategy for DocxExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Docx
    }

    fn extract(
        &self,
        content: &[u8],
        _filename: &str,
        _options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(content))
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ExtractError::Parse("word/document.xml not found".to_string()))?;
        let mut doc_xml = Vec::new();
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(ExtractError::Parse(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
        extract_docx_body(&doc_xml)
    }
}

fn extract_docx_body(xml: &[u8]) -> Result<ExtractionResult, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut markers: Vec<StructuralMarker> = Vec::new();
    let mut open_section: Option<(String, usize)> = None;
    let mut para = String::new();
    let mut para_is_heading = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        para.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"pStyle" {
                    let styled_heading = e.attributes().flatten().any(|a| {
                        a.key.local_name().as_ref() == b"val"
                            && a.value.starts_with(b"Heading")
                    });
                    if styled_heading {
                        para_is_heading = true;
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    let text = para.trim();
                    if !text.is_empty() {
                        if para_is_heading {
                            if let Some((prev, start)) = open_section.take() {
                                markers.push(section_marker(&prev, start, out.len()));
                            }
                            open_section = Some((text.to_string(), out.len()));
                        }
                        out.push_str(text);
                        out.push_str("\n\n");
                    }
                    para.clear();
                    para_is_heading = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Parse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if let Some((title, start)) = open_section {
        markers.push(section_marker(&title, start, out.len()));
    }

    Ok(ExtractionResult {
        text: out,
        markers,
        page_count: None,
        language: None,
    })
}

// ============ Media (image/audio/video) ============

/// Placeholder strategy for media types. No OCR or transcription backend is
/// bundled, so extraction reports a non-retryable failure naming the type
/// and whether OCR was requested.
pub struct MediaExtractor {
    kind: DocumentType,
}

impl MediaExtractor {
    pub fn new(kind: DocumentType) -> Self {
        Self { kind }
    }
}

impl ExtractionStrategy for MediaExtractor {
    fn document_type(&self) -> DocumentType {
        self.kind
    }

    fn extract(
        &self,
        _content: &[u8],
        _filename: &str,
        options: &ExtractionOptions,
    ) -> Result<ExtractionResult, ExtractError> {
        let detail = if options.ocr {
            format!(
                "no OCR backend available for {} content (language '{}')",
                self.kind, options.ocr_language
            )
        } else {
            format!("{} content requires OCR, which is disabled", self.kind)
        };
        Err(ExtractError::Unsupported(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(
        content: &[u8],
        filename: &str,
        doc_type: DocumentType,
    ) -> Result<ExtractionResult, ExtractError> {
        ExtractorRegistry::with_builtins().extract(
            content,
            filename,
            doc_type,
            &ExtractionOptions::default(),
        )
    }

    #[test]
    fn plain_text_passes_through() {
        let result = extract(b"hello world", "a.txt", DocumentType::PlainText).unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(result.page_count, Some(1));
        assert!(result.markers.is_empty());
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = extract(b"\x00\x01", "blob", DocumentType::Unknown).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn empty_text_is_an_error_not_a_success() {
        let err = extract(b"   \n  ", "a.txt", DocumentType::PlainText).unwrap_err();
        assert!(matches!(err, ExtractError::EmptyDocument));
        assert!(!err.is_retryable());
    }

    #[test]
    fn markdown_headings_become_section_markers() {
        let md = b"# Intro\nSome intro text.\n\n## Details\nMore text here.\n";
        let result = extract(md, "doc.md", DocumentType::Markdown).unwrap();
        assert!(!result.text.contains('#'));
        assert_eq!(result.markers.len(), 2);
        assert_eq!(result.markers[0].section_title.as_deref(), Some("Intro"));
        assert_eq!(result.markers[1].section_title.as_deref(), Some("Details"));
        // Markers tile the output in order.
        assert!(result.markers[0].end_offset <= result.markers[1].start_offset);
        // Marker text actually contains the section body.
        let intro = &result.text[result.markers[0].start_offset..result.markers[0].end_offset];
        assert!(intro.contains("Some intro text."));
    }

    #[test]
    fn markdown_fences_are_dropped() {
        let md = b"# T\n```rust\nlet x = 1;\n```\nafter\n";
        let result = extract(md, "doc.md", DocumentType::Markdown).unwrap();
        assert!(!result.text.contains("```"));
        assert!(result.text.contains("let x = 1;"));
        assert!(result.text.contains("after"));
    }

    #[test]
    fn html_strips_markup_and_tracks_headings() {
        let html = b"<html lang=\"en\"><body>\
            <h1>Welcome</h1><p>First paragraph.</p>\
            <script>var x = 1;</script>\
            <h2>Usage</h2><p>Second paragraph.</p></body></html>";
        let result = extract(html, "page.html", DocumentType::Html).unwrap();
        assert!(!result.text.contains('<'));
        assert!(!result.text.contains("var x"));
        assert!(result.text.contains("First paragraph."));
        assert_eq!(result.language.as_deref(), Some("en"));
        let titles: Vec<_> = result
            .markers
            .iter()
            .filter_map(|m| m.section_title.as_deref())
            .collect();
        assert_eq!(titles, vec!["Welcome", "Usage"]);
    }

    #[test]
    fn csv_renders_header_value_pairs() {
        let csv = b"name,role\nada,engineer\ngrace,admiral\n";
        let result = extract(csv, "people.csv", DocumentType::Csv).unwrap();
        assert!(result.text.contains("name: ada"));
        assert!(result.text.contains("role: admiral"));
        assert!(result.markers.is_empty());
    }

    #[test]
    fn csv_table_markers_when_requested() {
        let csv = b"name,role\nada,engineer\ngrace,admiral\n";
        let options = ExtractionOptions {
            extract_tables: true,
            ..Default::default()
        };
        let result = ExtractorRegistry::with_builtins()
            .extract(csv, "people.csv", DocumentType::Csv, &options)
            .unwrap();
        assert_eq!(result.markers.len(), 2);
        assert_eq!(result.markers[0].table_id.as_deref(), Some("row-1"));
        assert_eq!(result.markers[1].table_id.as_deref(), Some("row-2"));
    }

    #[test]
    fn csv_quoted_fields() {
        assert_eq!(
            split_csv_line(r#"a,"b, c","d ""e"""#),
            vec!["a", "b, c", r#"d "e""#]
        );
    }

    #[test]
    fn json_renders_readable_form() {
        let json = br#"{"title":"x","tags":[1,2]}"#;
        let result = extract(json, "data.json", DocumentType::Json).unwrap();
        assert!(result.text.contains("\"title\""));
        assert!(result.text.contains('\n'));
    }

    #[test]
    fn invalid_json_is_a_retryable_parse_error() {
        let err = extract(b"{not json", "data.json", DocumentType::Json).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_pdf_is_a_parse_error() {
        let err = extract(b"not a pdf", "doc.pdf", DocumentType::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn invalid_docx_is_a_parse_error() {
        let err = extract(b"not a zip", "doc.docx", DocumentType::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn docx_body_paragraphs_and_headings() {
        let xml = br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>
    <w:p><w:r><w:t>Body text.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let result = extract_docx_body(xml).unwrap();
        assert!(result.text.contains("Title"));
        assert!(result.text.contains("Body text."));
        assert_eq!(result.markers.len(), 1);
        assert_eq!(result.markers[0].section_title.as_deref(), Some("Title"));
    }

    #[test]
    fn media_without_ocr_is_unsupported() {
        let err = extract(b"\x89PNG", "scan.png", DocumentType::Image).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn injected_strategy_shadows_builtin() {
        struct Fixed;
        impl ExtractionStrategy for Fixed {
            fn document_type(&self) -> DocumentType {
                DocumentType::PlainText
            }
            fn extract(
                &self,
                _: &[u8],
                _: &str,
                _: &ExtractionOptions,
            ) -> Result<ExtractionResult, ExtractError> {
                Ok(ExtractionResult {
                    text: "fixed".to_string(),
                    ..Default::default()
                })
            }
        }
        let mut registry = ExtractorRegistry::with_builtins();
        registry.register(Box::new(Fixed));
        let result = registry
            .extract(
                b"ignored",
                "a.txt",
                DocumentType::PlainText,
                &ExtractionOptions::default(),
            )
            .unwrap();
        assert_eq!(result.text, "fixed");
    }
}
