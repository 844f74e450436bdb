//! Text chunking for document processing.
//!
//! Built on [`text_splitter`], measured in characters. The splitter prefers
//! the largest semantic unit that fits: paragraphs (runs of blank lines), then
//! single line breaks, then sentences, then words, and finally graphemes for a
//! run with no break in it. Adjacent units are packed into chunks of at most
//! `max_chunk_size` characters.
//!
//! Each chunk is an exact substring of the input with no leading or trailing
//! whitespace. Consecutive chunks share up to `overlap` characters, and every
//! chunk ends past the end of the one before it.

use std::fmt;

use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

use crate::types::{AppError, Result};

/// A chunk and its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

pub struct TextChunker {
    max_chunk_size: usize,
    overlap: usize,
    splitter: TextSplitter<text_splitter::Characters>,
}

impl fmt::Debug for TextChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextChunker")
            .field("max_chunk_size", &self.max_chunk_size)
            .field("overlap", &self.overlap)
            .finish()
    }
}

impl TextChunker {
    /// # Errors
    ///
    /// `InvalidConfig` if `max_chunk_size` is zero or `overlap >= max_chunk_size`.
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(AppError::InvalidConfig(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if overlap >= max_chunk_size {
            return Err(AppError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_chunk_size
            )));
        }

        let config = ChunkConfig::new(max_chunk_size)
            .with_overlap(overlap)
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?
            .with_trim(true);

        Ok(Self {
            max_chunk_size,
            overlap,
            splitter: TextSplitter::new(config),
        })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_spans(text)
            .into_iter()
            .map(|span| span.content)
            .collect()
    }

    pub fn chunk_spans(&self, text: &str) -> Vec<TextSpan> {
        let mut spans: Vec<TextSpan> = Vec::new();

        for (start, content) in self.splitter.chunk_indices(text) {
            let end = start + content.len();
            // A chunk made only of overlap adds nothing new.
            if spans.last().is_some_and(|prev| end <= prev.end) {
                continue;
            }
            spans.push(TextSpan {
                start,
                end,
                content: content.to_string(),
            });
        }

        debug!(
            input_len = text.len(),
            chunks = spans.len(),
            max_chunk_size = self.max_chunk_size,
            "Text chunked"
        );
        spans
    }
}

/// Split `text` into chunks of at most `max_chunk_size` characters.
///
/// # Errors
///
/// `InvalidConfig` if `overlap >= max_chunk_size`.
pub fn chunk(text: &str, max_chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(TextChunker::new(max_chunk_size, overlap)?.chunk(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_text() -> String {
        let mut text = String::new();
        for p in 0..12 {
            for s in 0..(p % 5 + 1) {
                text.push_str(&format!(
                    "Paragraph {} sentence {} talks about retrieval and ranking. ",
                    p, s
                ));
            }
            if p % 4 == 3 {
                text.push_str(&"x".repeat(150));
            }
            text.push_str("\n\n");
        }
        text
    }

    /// Chunks must tile the trimmed text: every gap between spans is
    /// whitespace and every span is a literal slice of the input.
    fn assert_reconstructs(text: &str, spans: &[TextSpan]) {
        let mut rebuilt = String::new();
        let mut covered = spans[0].start;
        for span in spans {
            assert_eq!(&text[span.start..span.end], span.content);
            assert!(span.end > covered || rebuilt.is_empty());
            if span.start > covered {
                assert!(text[covered..span.start].trim().is_empty());
            }
            rebuilt.push_str(&text[covered..span.end]);
            covered = span.end;
        }
        assert_eq!(rebuilt, text.trim());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\n\n\t \n")]
    fn empty_text_yields_no_chunks(#[case] text: &str) {
        let chunker = TextChunker::new(100, 10).unwrap();
        assert!(chunker.chunk(text).is_empty());
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = chunk("This is a small text.", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["This is a small text.".to_string()]);
    }

    #[test]
    fn paragraphs_become_separate_chunks() {
        let chunks = chunk("The sky is blue.\n\nGrass is green.", 20, 0).unwrap();
        assert_eq!(chunks, vec!["The sky is blue.", "Grass is green."]);
    }

    #[test]
    fn paragraphs_pack_together_when_they_fit() {
        let chunks = chunk("The sky is blue.\n\nGrass is green.", 100, 10).unwrap();
        assert_eq!(chunks, vec!["The sky is blue.\n\nGrass is green."]);
    }

    #[test]
    fn long_paragraph_splits_on_sentences() {
        let chunks = chunk("One. Two. Three.", 10, 0).unwrap();
        assert_eq!(chunks, vec!["One. Two.", "Three."]);
    }

    #[test]
    fn unbroken_run_is_cut_with_overlap() {
        let text = "x".repeat(1500);
        let chunker = TextChunker::new(1000, 200).unwrap();
        let spans = chunker.chunk_spans(&text);

        assert!(spans.len() >= 2);
        assert_eq!(spans[0].content.chars().count(), 1000);
        for pair in spans.windows(2) {
            // The next chunk starts inside the previous one.
            assert!(pair[1].start < pair[0].end);
            assert!(pair[0].end - pair[1].start <= 200);
        }
        assert_reconstructs(&text, &spans);
    }

    #[rstest]
    #[case("é!. ?é!ab.!", 3, 2)]
    #[case("a b c d e f g h", 3, 2)]
    #[case("ab.\n\ncd. ef gh.\nij", 4, 3)]
    fn chunks_always_advance(#[case] text: &str, #[case] max: usize, #[case] overlap: usize) {
        let chunker = TextChunker::new(max, overlap).unwrap();
        let spans = chunker.chunk_spans(text);

        assert!(!spans.is_empty());
        for pair in spans.windows(2) {
            assert!(pair[1].start >= pair[0].start);
            assert!(pair[1].end > pair[0].end, "{:?} repeats {:?}", pair[1], pair[0]);
        }
        assert_reconstructs(text, &spans);
    }

    #[test]
    fn overlap_starts_on_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunk(text, 20, 8).unwrap();

        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                text.split_whitespace().any(|w| w == first_word),
                "chunk {:?} starts mid-word",
                pair[1]
            );
        }
    }

    #[rstest]
    #[case(1000, 200)]
    #[case(200, 50)]
    #[case(120, 0)]
    #[case(64, 48)]
    #[case(30, 10)]
    fn chunks_respect_limit_and_reconstruct(#[case] max: usize, #[case] overlap: usize) {
        let text = sample_text();
        let chunker = TextChunker::new(max, overlap).unwrap();
        let spans = chunker.chunk_spans(&text);

        assert!(!spans.is_empty());
        for span in &spans {
            assert!(span.content.chars().count() <= max);
            assert_eq!(span.content, span.content.trim());
        }
        assert_reconstructs(&text, &spans);
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = sample_text();
        let chunker = TextChunker::new(150, 40).unwrap();
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "héllo wörld ñandú ".repeat(40);
        let chunker = TextChunker::new(25, 5).unwrap();
        let spans = chunker.chunk_spans(&text);

        for span in &spans {
            assert!(span.content.chars().count() <= 25);
        }
        assert_reconstructs(&text, &spans);
    }

    #[rstest]
    #[case(100, 100)]
    #[case(100, 150)]
    #[case(0, 0)]
    fn invalid_configuration_is_rejected(#[case] max: usize, #[case] overlap: usize) {
        assert!(matches!(
            TextChunker::new(max, overlap),
            Err(AppError::InvalidConfig(_))
        ));
    }
}
