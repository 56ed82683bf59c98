use crate::error::ConfigError;

/// Splits `seq` into contiguous runs of `size` elements; the last run may be
/// shorter. An empty sequence yields no runs.
pub fn partition<T>(seq: &[T], size: usize) -> Result<Vec<&[T]>, ConfigError> {
    if size == 0 {
        return Err(ConfigError::ChunkSize(0));
    }

    Ok(seq.chunks(size).collect())
}

/// Concatenates chunks back into one sequence, keeping their order.
pub fn flatten<U>(chunks: impl IntoIterator<Item = Vec<U>>) -> Vec<U> {
    chunks.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        let seq: Vec<u32> = (0..7).collect();
        let chunks = partition(&seq, 3).unwrap();

        assert_eq!(chunks, vec![&[0, 1, 2][..], &[3, 4, 5][..], &[6][..]]);
    }

    #[test]
    fn test_partition_empty() {
        let seq: [u8; 0] = [];
        assert!(partition(&seq, 4).unwrap().is_empty());
    }

    #[test]
    fn test_partition_zero() {
        assert_eq!(partition(&[1, 2, 3], 0), Err(ConfigError::ChunkSize(0)));
    }

    #[test]
    fn test_round_trip() {
        let seq: Vec<u32> = (0..23).collect();

        for size in 1..=30 {
            let chunks = partition(&seq, size).unwrap();
            assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= size));
            let owned = chunks.into_iter().map(<[u32]>::to_vec);
            assert_eq!(flatten(owned), seq, "size {size}");
        }
    }
}
