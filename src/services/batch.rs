//! Fixed-size batching of ordered inputs.

use crate::error::VectorStoreError;

/// Split `items` into consecutive batches of `batch_size`.
///
/// Order is preserved. Every batch is full except possibly the last; empty
/// input yields no batches.
pub fn to_batches<T>(items: &[T], batch_size: usize) -> Result<Vec<&[T]>, VectorStoreError> {
    if batch_size == 0 {
        return Err(VectorStoreError::Validation(
            "batch size must be positive".to_string(),
        ));
    }
    Ok(items.chunks(batch_size).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_batch_size_rejected() {
        let items = [1, 2, 3];
        assert!(matches!(
            to_batches(&items, 0),
            Err(VectorStoreError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let items: [u8; 0] = [];
        assert!(to_batches(&items, 5).unwrap().is_empty());
    }

    #[test]
    fn test_remainder_in_last_batch() {
        let items: Vec<u32> = (0..7).collect();
        let batches = to_batches(&items, 3).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_exact_multiple_has_full_last_batch() {
        let items: Vec<u32> = (0..6).collect();
        let batches = to_batches(&items, 3).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn test_batch_size_one() {
        let items = ["a", "b"];
        let batches = to_batches(&items, 1).unwrap();
        assert_eq!(batches, vec![&["a"][..], &["b"][..]]);
    }

    #[test]
    fn test_concatenation_preserves_order() {
        for n in 0..40usize {
            let items: Vec<usize> = (0..n).collect();
            for b in 1..12 {
                let batches = to_batches(&items, b).unwrap();
                let total: usize = batches.iter().map(|batch| batch.len()).sum();
                assert_eq!(total, n);
                if let Some((last, rest)) = batches.split_last() {
                    assert!(rest.iter().all(|batch| batch.len() == b));
                    assert!(!last.is_empty() && last.len() <= b);
                }
                assert_eq!(batches.concat(), items);
            }
        }
    }
}
