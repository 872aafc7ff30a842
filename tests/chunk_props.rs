//! Properties of the character-window chunker over random text and window sizes.

use proptest::prelude::*;

use local_rag::chunk::char_windows;

fn params() -> impl Strategy<Value = (String, usize, usize)> {
    (1usize..64).prop_flat_map(|size| {
        (
            "[a-zé ]{0,300}",
            Just(size),
            0..size,
        )
    })
}

proptest! {
    #[test]
    fn windows_never_exceed_chunk_size((text, size, overlap) in params()) {
        for (_, window) in char_windows(&text, size, overlap) {
            prop_assert!(window.chars().count() <= size);
            prop_assert!(!window.is_empty());
        }
    }

    #[test]
    fn adjacent_windows_overlap_exactly((text, size, overlap) in params()) {
        let windows = char_windows(&text, size, overlap);
        for pair in windows.windows(2) {
            let (start_a, a) = pair[0];
            let (start_b, _) = pair[1];
            prop_assert_eq!(start_b - start_a, size - overlap);
            // Every window but the last is full.
            prop_assert_eq!(a.chars().count(), size);
            let tail: String = a.chars().skip(size - overlap).collect();
            let head: String = pair[1].1.chars().take(overlap).collect();
            prop_assert_eq!(tail, head);
        }
    }

    #[test]
    fn windows_cover_the_whole_text((text, size, overlap) in params()) {
        let windows = char_windows(&text, size, overlap);
        let total = text.chars().count();
        if text.trim().is_empty() {
            prop_assert!(windows.is_empty());
        } else {
            prop_assert_eq!(windows[0].0, 0);
            let (last_start, last) = windows[windows.len() - 1];
            prop_assert_eq!(last_start + last.chars().count(), total);
        }
    }
}
