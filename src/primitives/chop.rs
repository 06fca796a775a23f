//! Splitting flat sequences into portions.

use crate::types::{DbError, Result};

/// Splits `items` into consecutive chunks of at most `size` elements.
pub fn chop_by<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>> {
    if size == 0 {
        return Err(DbError::Invalid("chop size must be positive"));
    }
    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}

/// Like [`chop_by`] but pads the last chunk with `None` up to `size`.
pub fn chop_and_pad_by<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<Option<T>>>> {
    if size == 0 {
        return Err(DbError::Invalid("chop size must be positive"));
    }
    Ok(items
        .chunks(size)
        .map(|chunk| {
            let mut padded: Vec<Option<T>> = chunk.iter().cloned().map(Some).collect();
            padded.resize(size, None);
            padded
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chop_by_basic() {
        assert_eq!(chop_by(&[1, 2, 3], 5).unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(chop_by(&[1, 2, 3], 3).unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(
            chop_by(&[1, 2, 3, 4, 5], 3).unwrap(),
            vec![vec![1, 2, 3], vec![4, 5]]
        );
        assert!(chop_by::<i64>(&[], 2).unwrap().is_empty());
    }

    #[test]
    fn chop_and_pad_by_basic() {
        assert_eq!(
            chop_and_pad_by(&[1, 2, 3], 5).unwrap(),
            vec![vec![Some(1), Some(2), Some(3), None, None]]
        );
        assert_eq!(
            chop_and_pad_by(&[1, 2, 3, 4, 5], 3).unwrap(),
            vec![vec![Some(1), Some(2), Some(3)], vec![Some(4), Some(5), None]]
        );
    }

    #[test]
    fn zero_slice_is_rejected() {
        assert!(matches!(chop_by(&[1, 2], 0), Err(DbError::Invalid(_))));
        assert!(matches!(chop_and_pad_by(&[1, 2], 0), Err(DbError::Invalid(_))));
    }
}
