use crate::error::{Error, Result};

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Length limit: a backing vector of at most `i32::MAX` words, one bit per
/// element, bounds the cell count.
const MAX_LENGTH: u64 = (i32::MAX as u64) * 64;

/// Dense array of `length` cells, each `bits_per_element` (1..=64) bits wide,
/// packed into 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub(crate) struct BitArray {
    length: u64,
    bits_per_element: u32,
    words: Vec<u64>,
}

impl BitArray {
    pub fn new(length: u64, bits_per_element: u32) -> Result<Self> {
        if length == 0 || length >= MAX_LENGTH {
            return Err(Error::invalid_argument(format!(
                "length must be in range (0, {MAX_LENGTH}): {length} given"
            )));
        }
        if !(1..=64).contains(&bits_per_element) {
            return Err(Error::invalid_argument(format!(
                "bits per element must be in range [1, 64]: {bits_per_element} given"
            )));
        }
        let total_bits = length * u64::from(bits_per_element);
        let word_count = total_bits.div_ceil(64);
        if word_count >= i32::MAX as u64 {
            return Err(Error::invalid_argument(format!(
                "too large: cannot allocate a bit array with length {length} and \
                 {bits_per_element} bits per element"
            )));
        }
        Ok(BitArray {
            length,
            bits_per_element,
            words: vec![0; word_count as usize],
        })
    }

    /// Inverse of [`BitArray::to_bytes`]. The byte count must match the word
    /// count of an array with the given dimensions exactly.
    pub fn from_bytes(length: u64, bits_per_element: u32, bytes: &[u8]) -> Result<Self> {
        let mut array = Self::new(length, bits_per_element)?;
        if bytes.len() != array.words.len() * 8 {
            return Err(Error::invalid_argument(format!(
                "expected {} bytes, got {}",
                array.words.len() * 8,
                bytes.len()
            )));
        }
        for (word, chunk) in array.words.iter_mut().zip(bytes.chunks_exact(8)) {
            *word = u64::from_le_bytes(chunk.try_into().expect("chunks are 8 bytes"));
        }
        Ok(array)
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Returns the cell at `index` in the low `bits_per_element` bits.
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn get(&self, index: u64) -> u64 {
        assert!(index < self.length, "index is out of bounds: {index}");
        let width = self.bits_per_element;
        let bit_start = index * u64::from(width);
        let bit_end = bit_start + u64::from(width);
        let word1 = (bit_start / 64) as usize;
        let word2 = ((bit_end - 1) / 64) as usize;

        let a = (bit_start % 64) as u32;
        if word1 < word2 {
            // The cell straddles two words.
            let b = a + width - 64;
            let low = self.words[word1] >> a;
            let high = self.words[word2] & mask(b);
            low | (high << (64 - a))
        } else {
            (self.words[word1] >> a) & mask(width)
        }
    }

    /// Writes the low `bits_per_element` bits of `value` into cell `index`.
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: u64, value: u64) {
        assert!(index < self.length, "index is out of bounds: {index}");
        let width = self.bits_per_element;
        let bit_start = index * u64::from(width);
        let bit_end = bit_start + u64::from(width);
        let word1 = (bit_start / 64) as usize;
        let word2 = ((bit_end - 1) / 64) as usize;

        let value = value & mask(width);
        let a = (bit_start % 64) as u32;
        if word1 < word2 {
            let b = a + width - 64;
            self.words[word1] &= clear_mask(a, 64);
            self.words[word1] |= value << a;
            self.words[word2] &= clear_mask(0, b);
            self.words[word2] |= value >> (64 - a);
        } else {
            let b = a + width;
            self.words[word1] &= clear_mask(a, b);
            self.words[word1] |= value << a;
        }
    }

    /// Emits the backing words in order, 8 little-endian bytes per word.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * 8);
        for word in &self.words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }
}

#[inline]
fn mask(len: u32) -> u64 {
    if len == 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

/// Mask that clears the bit range `[a, b)` of a word when `&`-ed in.
#[inline]
fn clear_mask(a: u32, b: u32) -> u64 {
    mask(64) ^ (mask(b - a) << a)
}
