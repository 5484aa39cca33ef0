//! svault-chunks: fixed-size chunk codec
//!
//! [`split`] slices a byte buffer into fixed-size chunks (the final chunk
//! may be shorter); [`join`] concatenates already-ordered, already-decrypted
//! chunks back into one buffer. Both are pure.
//!
//! Chunk size is a deployment constant, but nothing here records it: a
//! file's layout is implied by chunk ordering alone, so previously stored
//! files remain readable if the constant ever changes. Readers must not
//! assume uniform chunk size.

/// Split `data` into chunks of at most `chunk_size` bytes, in order.
///
/// Empty input yields zero chunks; callers that disallow empty files
/// reject them before chunking.
///
/// # Panics
/// Panics if `chunk_size` is zero (a configuration bug, validated at
/// startup by the engine).
pub fn split(data: &[u8], chunk_size: usize) -> Vec<&[u8]> {
    assert!(chunk_size > 0, "chunk_size must be non-zero");
    data.chunks(chunk_size).collect()
}

/// Number of chunks [`split`] produces for `size` bytes.
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    debug_assert!(chunk_size > 0);
    size.div_ceil(chunk_size as u64)
}

/// Concatenate ordered plaintext chunks into one buffer.
///
/// Ordering is the caller's contract — the reassembly pipeline supplies
/// chunks in index order; `join` never reorders.
pub fn join<I, C>(ordered_chunks: I) -> Vec<u8>
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for chunk in ordered_chunks {
        out.extend_from_slice(chunk.as_ref());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_data_yields_no_chunks() {
        assert!(split(&[], 1024).is_empty());
        assert_eq!(chunk_count(0, 1024), 0);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let data = vec![0xABu8; 4096];
        let chunks = split(&data, 1024);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() == 1024));
    }

    #[test]
    fn one_byte_over_adds_a_chunk() {
        let data = vec![0u8; 1025];
        let chunks = split(&data, 1024);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1024);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn single_byte_input() {
        let chunks = split(&[0x42], 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], &[0x42]);
    }

    #[test]
    fn chunk_count_matches_split() {
        for size in [0u64, 1, 1023, 1024, 1025, 5 * 1024] {
            let data = vec![0u8; size as usize];
            assert_eq!(
                chunk_count(size, 1024),
                split(&data, 1024).len() as u64,
                "size {size}"
            );
        }
    }

    #[test]
    fn join_tolerates_mixed_sizes() {
        // A reader must not assume uniform chunk size
        let parts: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![4], vec![], vec![5, 6]];
        assert_eq!(join(parts), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    #[should_panic(expected = "chunk_size must be non-zero")]
    fn zero_chunk_size_panics() {
        split(&[1, 2, 3], 0);
    }

    proptest! {
        /// join(split(x)) == x for any payload and chunk size
        #[test]
        fn split_join_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 0..=8192),
            chunk_size in 1usize..=2048,
        ) {
            let chunks = split(&data, chunk_size);
            prop_assert_eq!(join(chunks), data);
        }

        /// Every chunk except possibly the last is exactly chunk_size
        #[test]
        fn only_final_chunk_is_short(
            data in proptest::collection::vec(any::<u8>(), 1..=8192),
            chunk_size in 1usize..=2048,
        ) {
            let chunks = split(&data, chunk_size);
            for c in &chunks[..chunks.len() - 1] {
                prop_assert_eq!(c.len(), chunk_size);
            }
            prop_assert!(chunks.last().unwrap().len() <= chunk_size);
            prop_assert!(!chunks.last().unwrap().is_empty());
        }
    }
}
