use std::collections::HashMap;
use std::sync::OnceLock;

use rand::{Rng, RngCore};

use crate::bits::BitArray;
use crate::error::{Error, Result};
use crate::size::Size;
use crate::table::{self, CuckooFilterTable, SerializedTable, EMPTY_SLOT};

/// Bucket capacity the compression scheme is specialised for.
const BUCKET_CAPACITY: usize = 4;

/// Number of multisets of 4 nibbles: C(16 + 3, 4).
const SORTED_TAG_COUNT: usize = 3876;

/// All non-decreasing 4-tuples of nibbles, packed 4 bits each into a 16-bit
/// tag, in lexicographic order.
fn sorted_tags() -> &'static [u16; SORTED_TAG_COUNT] {
    static TAGS: OnceLock<[u16; SORTED_TAG_COUNT]> = OnceLock::new();
    TAGS.get_or_init(|| {
        let mut tags = [0u16; SORTED_TAG_COUNT];
        let mut next = 0;
        for a in 0u16..16 {
            for b in a..16 {
                for c in b..16 {
                    for d in c..16 {
                        tags[next] = (a << 12) | (b << 8) | (c << 4) | d;
                        next += 1;
                    }
                }
            }
        }
        tags
    })
}

/// Inverse of [`sorted_tags`]: tag -> its index in the enumeration.
fn sorted_tag_index() -> &'static HashMap<u16, u16> {
    static INDEX: OnceLock<HashMap<u16, u16>> = OnceLock::new();
    INDEX.get_or_init(|| {
        sorted_tags()
            .iter()
            .enumerate()
            .map(|(index, &tag)| (tag, index as u16))
            .collect()
    })
}

/// Table layout that compresses each bucket with the semi-sorting scheme,
/// saving one bit per slot relative to [`UncompressedTable`].
///
/// Fingerprint order inside a bucket carries no meaning, so a bucket is a
/// multiset. This layout splits each fingerprint into its high `F - 4` bits
/// and its low nibble, sorts the four nibbles, and replaces them with the
/// 12-bit index of the sorted 4-tuple in the enumeration of all such tuples
/// (3876 < 2^12 of them). Each cell then stores a high part plus a 3-bit
/// chunk of that index: `F - 1` bits per slot. The empty sentinel decomposes
/// as high part 0, nibble 0 and participates in the multiset like any other
/// value.
///
/// Only applicable for bucket capacity 4 and fingerprint length >= 4; in
/// practice not a limitation since capacity 4 tends to minimise the table
/// size and fingerprints shorter than 4 bits cannot reach useful false
/// positive rates. Operations decode and re-encode the whole bucket, so they
/// are a constant factor slower than the uncompressed layout.
///
/// [`UncompressedTable`]: crate::uncompressed::UncompressedTable
#[derive(Debug)]
pub(crate) struct SemiSortedTable {
    size: Size,
    array: BitArray,
}

impl SemiSortedTable {
    /// Table type tag in the serialization header.
    pub const TABLE_TYPE: i32 = 1;

    pub fn new(size: Size) -> Result<Self> {
        Self::check_applicable(size)?;
        let array = BitArray::new(size.slot_count(), size.fingerprint_length() - 1)?;
        Ok(SemiSortedTable { size, array })
    }

    pub fn from_parts(size: Size, body: &[u8]) -> Result<Self> {
        Self::check_applicable(size)?;
        let array = table::body_to_array(size, size.fingerprint_length() - 1, body)?;
        Ok(SemiSortedTable { size, array })
    }

    fn check_applicable(size: Size) -> Result<()> {
        if size.bucket_capacity() as usize != BUCKET_CAPACITY {
            return Err(Error::invalid_argument(format!(
                "the semi-sorted layout only supports bucket capacity {BUCKET_CAPACITY}: \
                 {} given",
                size.bucket_capacity()
            )));
        }
        if size.fingerprint_length() < 4 {
            return Err(Error::invalid_argument(format!(
                "the semi-sorted layout only supports fingerprint length >= 4: {} given",
                size.fingerprint_length()
            )));
        }
        Ok(())
    }

    #[inline]
    fn cell_index(&self, bucket_index: u32, slot_index: usize) -> u64 {
        u64::from(bucket_index) * BUCKET_CAPACITY as u64 + slot_index as u64
    }

    fn decode_bucket(&self, bucket_index: u32) -> [u64; BUCKET_CAPACITY] {
        let mut tag_index = 0usize;
        let mut high_parts = [0u64; BUCKET_CAPACITY];
        for (slot_index, high_part) in high_parts.iter_mut().enumerate() {
            let cell = self.array.get(self.cell_index(bucket_index, slot_index));
            // Cell 3 carries the most significant chunk of the tag index.
            tag_index |= ((cell & 0x7) as usize) << (3 * slot_index);
            *high_part = cell >> 3;
        }

        let tag = sorted_tags()[tag_index];
        let mut fingerprints = [0u64; BUCKET_CAPACITY];
        for slot_index in 0..BUCKET_CAPACITY {
            let nibble = u64::from(tag >> (4 * (BUCKET_CAPACITY - 1 - slot_index))) & 0xF;
            fingerprints[slot_index] = (high_parts[slot_index] << 4) | nibble;
        }
        fingerprints
    }

    /// Re-encodes the whole bucket. Slot order is not preserved: the cells
    /// are rewritten in non-decreasing low-nibble order.
    fn encode_bucket(&mut self, bucket_index: u32, fingerprints: [u64; BUCKET_CAPACITY]) {
        let mut high_parts = [0u64; BUCKET_CAPACITY];
        let mut nibbles = [0u16; BUCKET_CAPACITY];
        for slot_index in 0..BUCKET_CAPACITY {
            high_parts[slot_index] = fingerprints[slot_index] >> 4;
            nibbles[slot_index] = (fingerprints[slot_index] & 0xF) as u16;
        }

        let mut order = [0usize, 1, 2, 3];
        order.sort_by_key(|&slot_index| nibbles[slot_index]);
        let tag = (nibbles[order[0]] << 12)
            | (nibbles[order[1]] << 8)
            | (nibbles[order[2]] << 4)
            | nibbles[order[3]];
        let tag_index = u64::from(sorted_tag_index()[&tag]);

        for slot_index in 0..BUCKET_CAPACITY {
            let chunk = (tag_index >> (3 * slot_index)) & 0x7;
            self.array.set(
                self.cell_index(bucket_index, slot_index),
                (high_parts[order[slot_index]] << 3) | chunk,
            );
        }
    }
}

impl CuckooFilterTable for SemiSortedTable {
    fn insert_with_replacement(
        &mut self,
        bucket_index: u32,
        fingerprint: u64,
        rng: &mut dyn RngCore,
    ) -> Option<u64> {
        debug_assert_ne!(fingerprint, EMPTY_SLOT);
        let mut fingerprints = self.decode_bucket(bucket_index);
        for stored in fingerprints.iter_mut() {
            if *stored == EMPTY_SLOT {
                *stored = fingerprint;
                self.encode_bucket(bucket_index, fingerprints);
                return None;
            }
        }

        let victim_slot = rng.gen_range(0..BUCKET_CAPACITY);
        let replaced = fingerprints[victim_slot];
        fingerprints[victim_slot] = fingerprint;
        self.encode_bucket(bucket_index, fingerprints);
        Some(replaced)
    }

    fn contains(&self, bucket_index: u32, fingerprint: u64) -> bool {
        self.decode_bucket(bucket_index).contains(&fingerprint)
    }

    fn delete(&mut self, bucket_index: u32, fingerprint: u64) -> bool {
        debug_assert_ne!(fingerprint, EMPTY_SLOT);
        let mut fingerprints = self.decode_bucket(bucket_index);
        for stored in fingerprints.iter_mut() {
            if *stored == fingerprint {
                *stored = EMPTY_SLOT;
                self.encode_bucket(bucket_index, fingerprints);
                return true;
            }
        }
        false
    }

    fn is_full(&self, bucket_index: u32) -> bool {
        !self.contains(bucket_index, EMPTY_SLOT)
    }

    fn size(&self) -> Size {
        self.size
    }

    fn serialize(&self) -> SerializedTable {
        table::serialize_parts(Self::TABLE_TYPE, self.size, &self.array)
    }
}
