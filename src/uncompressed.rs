use rand::{Rng, RngCore};

use crate::bits::BitArray;
use crate::error::Result;
use crate::size::Size;
use crate::table::{self, CuckooFilterTable, SerializedTable, EMPTY_SLOT};

/// Table layout that stores each fingerprint in its own cell.
///
/// A bucket of capacity K with F-bit fingerprints takes K * F bits. Slot `s`
/// of bucket `b` lives at cell `b * K + s`.
#[derive(Debug)]
pub(crate) struct UncompressedTable {
    size: Size,
    array: BitArray,
}

impl UncompressedTable {
    /// Table type tag in the serialization header.
    pub const TABLE_TYPE: i32 = 0;

    pub fn new(size: Size) -> Result<Self> {
        // bucket_capacity <= 128 and fingerprint_length <= 64, so a slot
        // index always fits the cell index space.
        let array = BitArray::new(size.slot_count(), size.fingerprint_length())?;
        Ok(UncompressedTable { size, array })
    }

    pub fn from_parts(size: Size, body: &[u8]) -> Result<Self> {
        let array = table::body_to_array(size, size.fingerprint_length(), body)?;
        Ok(UncompressedTable { size, array })
    }

    #[inline]
    fn cell_index(&self, bucket_index: u32, slot_index: u32) -> u64 {
        u64::from(bucket_index) * u64::from(self.size.bucket_capacity()) + u64::from(slot_index)
    }
}

impl CuckooFilterTable for UncompressedTable {
    fn insert_with_replacement(
        &mut self,
        bucket_index: u32,
        fingerprint: u64,
        rng: &mut dyn RngCore,
    ) -> Option<u64> {
        debug_assert_ne!(fingerprint, EMPTY_SLOT);
        for slot_index in 0..self.size.bucket_capacity() {
            let cell = self.cell_index(bucket_index, slot_index);
            if self.array.get(cell) == EMPTY_SLOT {
                self.array.set(cell, fingerprint);
                return None;
            }
        }

        let victim_slot = rng.gen_range(0..self.size.bucket_capacity());
        let cell = self.cell_index(bucket_index, victim_slot);
        let replaced = self.array.get(cell);
        self.array.set(cell, fingerprint);
        Some(replaced)
    }

    fn contains(&self, bucket_index: u32, fingerprint: u64) -> bool {
        (0..self.size.bucket_capacity())
            .any(|slot_index| self.array.get(self.cell_index(bucket_index, slot_index)) == fingerprint)
    }

    fn delete(&mut self, bucket_index: u32, fingerprint: u64) -> bool {
        debug_assert_ne!(fingerprint, EMPTY_SLOT);
        for slot_index in 0..self.size.bucket_capacity() {
            let cell = self.cell_index(bucket_index, slot_index);
            if self.array.get(cell) == fingerprint {
                self.array.set(cell, EMPTY_SLOT);
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
