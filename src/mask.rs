//! Binary pixel masks with a cached population count
use crate::{Image, Shape, Size};
use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed size grid of bits, one bit per pixel
///
/// Population count is maintained on every mutation so `count` is O(1).
#[derive(Clone, PartialEq, Eq)]
pub struct BitMask {
    size: Size,
    words: Vec<u64>,
    count: usize,
}

impl fmt::Debug for BitMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitMask")
            .field("width", &self.size.width)
            .field("height", &self.size.height)
            .field("count", &self.count)
            .finish()
    }
}

impl BitMask {
    /// Create empty mask
    pub fn new(size: Size) -> Self {
        Self {
            size,
            words: vec![0; size.area().div_ceil(WORD_BITS)],
            count: 0,
        }
    }

    /// Create mask from the alpha channel, marking pixels with `alpha > threshold`
    pub fn from_alpha(alpha: impl Image<Pixel = u8>, threshold: u8) -> Self {
        let shape = alpha.shape();
        let mut mask = Self::new(shape.size());
        for (row, col, value) in alpha.enumerate() {
            if *value > threshold {
                mask.insert(row * shape.width + col);
            }
        }
        mask
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.size)
    }

    /// Number of set bits
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the bit at `index` is set (out of range bits are never set)
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / WORD_BITS)
            .is_some_and(|word| word & (1u64 << (index % WORD_BITS)) != 0)
    }

    /// Whether the pixel at signed coordinates is set
    pub fn contains_xy(&self, x: i64, y: i64) -> bool {
        self.shape()
            .checked_offset(x, y)
            .is_some_and(|index| self.contains(index))
    }

    /// Set bit at `index`, returns `true` if it was not set before
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        if index >= self.size.area() {
            return false;
        }
        let word = &mut self.words[index / WORD_BITS];
        let bit = 1u64 << (index % WORD_BITS);
        if *word & bit != 0 {
            return false;
        }
        *word |= bit;
        self.count += 1;
        true
    }

    /// Unset all bits
    pub fn clear(&mut self) {
        self.words.fill(0);
        self.count = 0;
    }

    /// Iterate over indices of set bits in increasing order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, word)| {
                let mut word = *word;
                std::iter::from_fn(move || {
                    if word == 0 {
                        return None;
                    }
                    let bit = word.trailing_zeros() as usize;
                    word &= word - 1;
                    Some(word_index * WORD_BITS + bit)
                })
            })
    }

    /// Convert index of a bit into `(x, y)` pixel coordinates
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index % self.size.width, index / self.size.width)
    }

    /// Recompute population count from the stored words
    pub fn popcount(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageOwned;

    fn size(width: usize, height: usize) -> Size {
        Size { width, height }
    }

    #[test]
    fn test_insert_idempotent() {
        let mut mask = BitMask::new(size(10, 10));
        assert!(mask.insert(0));
        assert!(mask.insert(64));
        assert!(mask.insert(99));
        assert!(!mask.insert(64));
        assert!(!mask.insert(100));
        assert_eq!(mask.count(), 3);
        assert_eq!(mask.popcount(), 3);
        assert!(mask.contains(64));
        assert!(!mask.contains(65));
        assert!(!mask.contains(1_000));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 64, 99]);
        assert_eq!(mask.position(64), (4, 6));

        mask.clear();
        assert!(mask.is_empty());
        assert_eq!(mask.iter().count(), 0);
    }

    #[test]
    fn test_from_alpha() {
        let alpha = ImageOwned::new_with(size(4, 2), |row, col| (row * 4 + col) as u8 * 5);
        // values 0 5 10 15 20 25 30 35, threshold is exclusive
        let mask = BitMask::from_alpha(&alpha, 16);
        assert_eq!(mask.count(), 4);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![4, 5, 6, 7]);
        assert!(mask.contains_xy(0, 1));
        assert!(!mask.contains_xy(3, 0));
        assert!(!mask.contains_xy(-1, 1));
        assert!(!mask.contains_xy(4, 1));
    }
}
