//! Sliding-window text chunker.
//!
//! Splits extracted text into overlapping fixed-size windows of
//! whitespace-delimited tokens. Each window becomes one [`ChunkRecord`]
//! carrying its byte span into the source text, the token count, a SHA-256
//! content hash, and the structural marker inherited from the extraction
//! (largest character overlap wins, earliest marker breaks ties).
//!
//! The same tokenizer is used for `word_count` reporting in
//! [`crate::enrich`], so sizing and statistics stay consistent within one
//! pipeline run.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{ChunkRecord, StructuralMarker};

/// Chunking precondition violation. Configuration-class: never retried.
#[derive(Debug)]
pub enum ChunkError {
    InvalidOverlap { chunk_size: usize, chunk_overlap: usize },
    ZeroChunkSize,
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkError::InvalidOverlap {
                chunk_size,
                chunk_overlap,
            } => write!(
                f,
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            ),
            ChunkError::ZeroChunkSize => write!(f, "chunk_size must be > 0"),
        }
    }
}

impl std::error::Error for ChunkError {}

/// Byte spans of whitespace-delimited tokens in `text`.
pub fn tokenize(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Split `text` into overlapping token windows of `chunk_size`, advancing by
/// `chunk_size - chunk_overlap` each step.
///
/// Empty text yields zero chunks. Text shorter than `chunk_size` yields one
/// chunk spanning the whole text. Chunk indices are dense, starting at 0.
pub fn chunk(
    document_id: &str,
    text: &str,
    markers: &[StructuralMarker],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<ChunkRecord>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    if chunk_overlap >= chunk_size {
        return Err(ChunkError::InvalidOverlap {
            chunk_size,
            chunk_overlap,
        });
    }

    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let step = chunk_size - chunk_overlap;
    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;
    let mut window_start = 0usize;

    loop {
        let window_end = (window_start + chunk_size).min(tokens.len());
        let span_start = tokens[window_start].0;
        let span_end = tokens[window_end - 1].1;
        let marker = dominant_marker(markers, span_start, span_end);

        chunks.push(make_chunk(
            document_id,
            chunk_index,
            &text[span_start..span_end],
            (window_end - window_start) as i64,
            span_start,
            span_end,
            marker,
        ));
        chunk_index += 1;

        if window_end == tokens.len() {
            break;
        }
        window_start += step;
    }

    Ok(chunks)
}

/// Pick the marker with the largest character overlap with `[start, end)`.
/// Ties go to the marker with the earliest start offset.
fn dominant_marker<'a>(
    markers: &'a [StructuralMarker],
    start: usize,
    end: usize,
) -> Option<&'a StructuralMarker> {
    let mut best: Option<(&StructuralMarker, usize)> = None;
    for m in markers {
        let overlap = m.end_offset.min(end).saturating_sub(m.start_offset.max(start));
        if overlap == 0 {
            continue;
        }
        best = match best {
            Some((cur, cur_overlap)) if overlap > cur_overlap => Some((m, overlap)),
            Some((cur, cur_overlap))
                if overlap == cur_overlap && m.start_offset < cur.start_offset =>
            {
                Some((m, overlap))
            }
            Some(existing) => Some(existing),
            None => Some((m, overlap)),
        };
    }
    best.map(|(m, _)| m)
}

fn make_chunk(
    document_id: &str,
    index: i64,
    text: &str,
    token_count: i64,
    start_offset: usize,
    end_offset: usize,
    marker: Option<&StructuralMarker>,
) -> ChunkRecord {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let chunk_type = marker.map(|m| {
        if m.table_id.is_some() {
            "table".to_string()
        } else if m.figure_id.is_some() {
            "figure".to_string()
        } else {
            "paragraph".to_string()
        }
    });

    ChunkRecord {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        token_count,
        chunk_type,
        page_number: marker.and_then(|m| m.page_number),
        section_title: marker.and_then(|m| m.section_title.clone()),
        table_id: marker.and_then(|m| m.table_id.clone()),
        figure_id: marker.and_then(|m| m.figure_id.clone()),
        start_offset: start_offset as i64,
        end_offset: end_offset as i64,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_text_yields_zero_chunks() {
        let chunks = chunk("doc1", "", &[], 500, 50).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_yields_one_chunk_spanning_everything() {
        let text = "only a few words here";
        let chunks = chunk("doc1", text, &[], 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len() as i64);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].token_count, 5);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = chunk("doc1", "a b c", &[], 100, 150).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidOverlap { .. }));
        let err = chunk("doc1", "a b c", &[], 100, 100).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidOverlap { .. }));
    }

    #[test]
    fn window_positions_for_1200_tokens() {
        // 1,200 tokens, chunk_size 500, overlap 50: windows [0,500),
        // [450,950), [900,1200).
        let text = words(1200);
        let tokens = tokenize(&text);
        let chunks = chunk("doc1", &text, &[], 500, 50).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[0].start_offset as usize, tokens[0].0);
        assert_eq!(chunks[0].end_offset as usize, tokens[499].1);
        assert_eq!(chunks[1].start_offset as usize, tokens[450].0);
        assert_eq!(chunks[1].end_offset as usize, tokens[949].1);
        assert_eq!(chunks[2].start_offset as usize, tokens[900].0);
        assert_eq!(chunks[2].end_offset as usize, tokens[1199].1);
        assert_eq!(chunks[0].token_count, 500);
        assert_eq!(chunks[2].token_count, 300);
    }

    #[test]
    fn every_token_is_covered_by_some_chunk() {
        for (size, overlap) in [(10, 3), (7, 1), (50, 49), (5, 0)] {
            let text = words(137);
            let tokens = tokenize(&text);
            let chunks = chunk("doc1", &text, &[], size, overlap).unwrap();
            for (start, end) in &tokens {
                assert!(
                    chunks.iter().any(|c| {
                        c.start_offset as usize <= *start && c.end_offset as usize >= *end
                    }),
                    "token [{}, {}) not covered for size={} overlap={}",
                    start,
                    end,
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn indices_are_dense_and_offsets_non_decreasing() {
        let text = words(531);
        let chunks = chunk("doc1", &text, &[], 64, 16).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert!(c.start_offset < c.end_offset);
        }
        for pair in chunks.windows(2) {
            assert!(pair[0].start_offset < pair[1].start_offset);
            assert!(pair[0].end_offset <= pair[1].end_offset);
        }
    }

    #[test]
    fn overlap_never_exceeds_configured_bound() {
        let text = words(400);
        let tokens = tokenize(&text);
        let chunks = chunk("doc1", &text, &[], 100, 25).unwrap();
        for pair in chunks.windows(2) {
            // Count tokens shared between consecutive windows.
            let shared = tokens
                .iter()
                .filter(|(s, e)| {
                    *s >= pair[1].start_offset as usize
                        && *e <= pair[0].end_offset as usize
                })
                .count();
            assert!(shared <= 25, "shared tokens {} exceed overlap", shared);
            assert!(shared > 0, "consecutive windows should overlap");
        }
    }

    #[test]
    fn deterministic_content_across_runs() {
        let text = words(300);
        let a = chunk("doc1", &text, &[], 50, 10).unwrap();
        let b = chunk("doc1", &text, &[], 50, 10).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.start_offset, y.start_offset);
            assert_eq!(x.end_offset, y.end_offset);
        }
    }

    #[test]
    fn largest_overlap_marker_wins() {
        let text = words(100); // each token "wN" + space
        let tokens = tokenize(&text);
        let mid = tokens[60].0;
        let markers = vec![
            StructuralMarker {
                section_title: Some("first".to_string()),
                start_offset: 0,
                end_offset: mid,
                ..Default::default()
            },
            StructuralMarker {
                section_title: Some("second".to_string()),
                start_offset: mid,
                end_offset: text.len(),
                ..Default::default()
            },
        ];
        let chunks = chunk("doc1", &text, &markers, 100, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        // 60 of 100 tokens fall under "first".
        assert_eq!(chunks[0].section_title.as_deref(), Some("first"));
        assert_eq!(chunks[0].chunk_type.as_deref(), Some("paragraph"));
    }

    #[test]
    fn marker_tie_breaks_to_earliest() {
        let text = "aa bb cc dd";
        let markers = vec![
            StructuralMarker {
                section_title: Some("late".to_string()),
                start_offset: 6,
                end_offset: 11,
                ..Default::default()
            },
            StructuralMarker {
                section_title: Some("early".to_string()),
                start_offset: 0,
                end_offset: 5,
                ..Default::default()
            },
        ];
        let chunks = chunk("doc1", text, &markers, 10, 2).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_title.as_deref(), Some("early"));
    }

    #[test]
    fn table_marker_sets_chunk_type() {
        let text = "row one data";
        let markers = vec![StructuralMarker {
            table_id: Some("row-1".to_string()),
            start_offset: 0,
            end_offset: text.len(),
            ..Default::default()
        }];
        let chunks = chunk("doc1", text, &markers, 10, 2).unwrap();
        assert_eq!(chunks[0].chunk_type.as_deref(), Some("table"));
        assert_eq!(chunks[0].table_id.as_deref(), Some("row-1"));
    }

    #[test]
    fn multibyte_text_chunks_on_char_boundaries() {
        let text = "naïve café — über schön déjà vu";
        let chunks = chunk("doc1", text, &[], 3, 1).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            // Slicing must have stayed on char boundaries.
            assert!(!c.text.is_empty());
            assert_eq!(
                c.text,
                &text[c.start_offset as usize..c.end_offset as usize]
            );
        }
    }
}
