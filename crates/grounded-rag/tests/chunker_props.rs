//! Property tests for the sliding-window chunker

use proptest::prelude::*;

use grounded_rag::ingestion::TextChunker;
use grounded_rag::types::Document;

fn window_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|max| (Just(max), 0..max))
}

proptest! {
    #[test]
    fn chunks_cover_text_with_exact_overlap(
        text in "\\PC{0,300}",
        (max, overlap) in window_params(),
    ) {
        let doc = Document::new("p.txt", None, text.clone());
        let chunks = TextChunker::new(max, overlap).unwrap().chunk(&doc);
        let chars: Vec<char> = text.chars().collect();

        if chars.is_empty() {
            prop_assert!(chunks.is_empty());
            return Ok(());
        }

        prop_assert_eq!(chunks[0].start_offset, 0);
        prop_assert_eq!(chunks.last().unwrap().end_offset, chars.len());

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(chunk.end_offset - chunk.start_offset <= max);
            prop_assert!(chunk.end_offset > chunk.start_offset);
            let expected: String = chars[chunk.start_offset..chunk.end_offset].iter().collect();
            prop_assert_eq!(&chunk.text, &expected);
            prop_assert_eq!(chunk.chunk_index, i);
        }

        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].end_offset - pair[1].start_offset, overlap);
            prop_assert_eq!(pair[0].end_offset - pair[0].start_offset, max);
        }
    }

    #[test]
    fn chunking_is_deterministic(
        text in "[a-z ]{0,200}",
        (max, overlap) in window_params(),
    ) {
        let doc = Document::new("d.txt", None, text);
        let chunker = TextChunker::new(max, overlap).unwrap();
        prop_assert_eq!(chunker.chunk(&doc), chunker.chunk(&doc));
    }

    #[test]
    fn short_documents_are_a_single_chunk(text in "[a-z]{1,50}") {
        let doc = Document::new("s.txt", None, text.clone());
        let chunks = TextChunker::new(50, 10).unwrap().chunk(&doc);
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(&chunks[0].text, &text);
    }
}
