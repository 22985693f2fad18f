use std::fmt;

use rand::RngCore;

use crate::bits::BitArray;
use crate::error::{Error, Result};
use crate::semi_sorted::SemiSortedTable;
use crate::size::Size;
use crate::uncompressed::UncompressedTable;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Value of an empty slot. Reserved: strategies never produce it as a
/// fingerprint.
pub(crate) const EMPTY_SLOT: u64 = 0;

/// An array of buckets where each bucket stores a fixed number of
/// fingerprints.
///
/// Eviction randomness is passed in per call so the same table can be driven
/// by whatever RNG its owner holds.
pub(crate) trait CuckooFilterTable: fmt::Debug {
    /// Inserts `fingerprint` into the bucket, replacing a uniformly chosen
    /// victim if the bucket is full.
    ///
    /// Returns the replaced fingerprint, or `None` if an empty slot was
    /// available.
    fn insert_with_replacement(
        &mut self,
        bucket_index: u32,
        fingerprint: u64,
        rng: &mut dyn RngCore,
    ) -> Option<u64>;

    /// Returns whether the bucket contains `fingerprint`.
    fn contains(&self, bucket_index: u32, fingerprint: u64) -> bool;

    /// Deletes one occurrence of `fingerprint` from the bucket, returning
    /// whether one existed.
    fn delete(&mut self, bucket_index: u32, fingerprint: u64) -> bool;

    /// Returns whether the bucket has no empty slot left.
    fn is_full(&self, bucket_index: u32) -> bool;

    /// Returns the table dimensions.
    fn size(&self) -> Size;

    /// Serializes the table into a self-describing byte blob.
    fn serialize(&self) -> SerializedTable;
}

/// Creates an empty table, choosing the semi-sorted layout when space
/// optimization is requested and the dimensions allow it.
///
/// Space optimization is best effort: dimensions outside the semi-sorted
/// applicability window silently fall back to the uncompressed layout.
pub(crate) fn create(
    size: Size,
    use_space_optimization: bool,
) -> Result<Box<dyn CuckooFilterTable>> {
    if use_space_optimization && size.bucket_capacity() == 4 && size.fingerprint_length() >= 4 {
        Ok(Box::new(SemiSortedTable::new(size)?))
    } else {
        Ok(Box::new(UncompressedTable::new(size)?))
    }
}

/// Reconstructs a table from its serialization.
pub(crate) fn from_serialized(serialized: &SerializedTable) -> Result<Box<dyn CuckooFilterTable>> {
    let raw = serialized.raw();
    if raw.len() <= 16 {
        return Err(Error::parse(format!(
            "expected a header of 16 bytes and a non-empty body, got {} bytes",
            raw.len()
        )));
    }

    let table_type = read_header_field(raw, 0);
    let size = Size::builder()
        .bucket_count(read_header_field(raw, 4) as u32)
        .bucket_capacity(read_header_field(raw, 8) as u32)
        .fingerprint_length(read_header_field(raw, 12) as u32)
        .build()?;

    let body = &raw[16..];
    if body.len() % 8 != 0 {
        return Err(Error::parse(format!(
            "body must be a whole number of 64-bit words, got {} bytes",
            body.len()
        )));
    }

    match table_type {
        UncompressedTable::TABLE_TYPE => Ok(Box::new(UncompressedTable::from_parts(size, body)?)),
        SemiSortedTable::TABLE_TYPE => Ok(Box::new(SemiSortedTable::from_parts(size, body)?)),
        _ => Err(Error::parse(format!("unknown table type: {table_type}"))),
    }
}

fn read_header_field(raw: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes(
        raw[offset..offset + 4]
            .try_into()
            .expect("header field is 4 bytes"),
    )
}

/// Checks that `body` holds exactly the words a table of the given cell
/// dimensions serializes to, then deserializes it.
pub(crate) fn body_to_array(size: Size, cell_width: u32, body: &[u8]) -> Result<BitArray> {
    let expected = 8 * (size.slot_count() * u64::from(cell_width)).div_ceil(64);
    if body.len() as u64 != expected {
        return Err(Error::parse(format!(
            "body of {} bytes does not match the header dimensions (expected {expected})",
            body.len()
        )));
    }
    BitArray::from_bytes(size.slot_count(), cell_width, body)
}

/// Emits the wire format: four big-endian signed 32-bit header fields (table
/// type and dimensions) followed by the bit array as little-endian words.
pub(crate) fn serialize_parts(table_type: i32, size: Size, array: &BitArray) -> SerializedTable {
    let body = array.to_bytes();
    let mut raw = Vec::with_capacity(16 + body.len());
    raw.extend_from_slice(&table_type.to_be_bytes());
    raw.extend_from_slice(&(size.bucket_count() as i32).to_be_bytes());
    raw.extend_from_slice(&(size.bucket_capacity() as i32).to_be_bytes());
    raw.extend_from_slice(&(size.fingerprint_length() as i32).to_be_bytes());
    raw.extend_from_slice(&body);
    SerializedTable { raw }
}

/// Serialized form of a cuckoo filter table.
///
/// The bytes are opaque to callers; only the table implementations emit and
/// parse them. The serialization does not record the hash function, strategy,
/// or funnel, so reconstruction must be supplied with the ones used when the
/// table was serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct SerializedTable {
    #[cfg_attr(feature = "serde_support", serde(with = "serde_bytes"))]
    raw: Vec<u8>,
}

impl SerializedTable {
    /// Creates a serialization from a raw byte array. The bytes are copied.
    pub fn from_byte_array(bytes: &[u8]) -> Self {
        SerializedTable {
            raw: bytes.to_vec(),
        }
    }

    /// Returns the serialization as a byte array. The bytes are copied.
    pub fn as_byte_array(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const BUCKET_COUNT: u32 = 1000;
    const BUCKET_CAPACITY: u32 = 4;
    const FINGERPRINT_LENGTH: u32 = 16;

    fn size() -> Size {
        Size::builder()
            .bucket_count(BUCKET_COUNT)
            .bucket_capacity(BUCKET_CAPACITY)
            .fingerprint_length(FINGERPRINT_LENGTH)
            .build()
            .expect("valid size")
    }

    fn tables() -> Vec<Box<dyn CuckooFilterTable>> {
        vec![
            create(size(), false).expect("valid size"),
            create(size(), true).expect("valid size"),
        ]
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xc0ffee)
    }

    #[test]
    fn insert_with_replacement_reports_the_victim() {
        for mut table in tables() {
            let mut rng = rng();
            for bucket_index in 0..BUCKET_COUNT {
                let offset = u64::from(bucket_index) * u64::from(BUCKET_CAPACITY);
                for slot in 0..u64::from(BUCKET_CAPACITY) {
                    assert_eq!(
                        table.insert_with_replacement(bucket_index, offset + slot + 1, &mut rng),
                        None
                    );
                }

                let incoming = offset + u64::from(BUCKET_CAPACITY) + 1;
                let replaced = table
                    .insert_with_replacement(bucket_index, incoming, &mut rng)
                    .expect("bucket was full");

                assert!((offset + 1..incoming).contains(&replaced));
                assert!(!table.contains(bucket_index, replaced));
                for fingerprint in offset + 1..=incoming {
                    if fingerprint != replaced {
                        assert!(table.contains(bucket_index, fingerprint));
                    }
                }
            }
        }
    }

    #[test]
    fn contains_only_inserted_fingerprints() {
        for mut table in tables() {
            assert!(!table.contains(0, 1));
            assert_eq!(table.insert_with_replacement(0, 1, &mut rng()), None);
            assert!(table.contains(0, 1));
            assert!(!table.contains(0, 2));
            assert!(!table.contains(1, 1));
        }
    }

    #[test]
    fn delete_removes_one_occurrence_at_a_time() {
        for mut table in tables() {
            let mut rng = rng();
            assert_eq!(table.insert_with_replacement(0, 1, &mut rng), None);
            assert_eq!(table.insert_with_replacement(0, 1, &mut rng), None);

            assert!(table.delete(0, 1));
            assert!(table.contains(0, 1));
            assert!(table.delete(0, 1));
            assert!(!table.contains(0, 1));
            assert!(!table.delete(0, 1));
        }
    }

    #[test]
    fn is_full_after_capacity_insertions() {
        for mut table in tables() {
            let mut rng = rng();
            for slot in 0..u64::from(BUCKET_CAPACITY) {
                assert!(!table.is_full(0));
                assert_eq!(table.insert_with_replacement(0, slot + 1, &mut rng), None);
            }
            assert!(table.is_full(0));
            assert!(table.delete(0, 1));
            assert!(!table.is_full(0));
        }
    }

    #[test]
    fn reports_its_size() {
        for table in tables() {
            assert_eq!(table.size(), size());
        }
    }

    #[test]
    fn serialize_and_deserialize_preserves_contents() {
        for mut table in tables() {
            let mut rng = rng();
            for bucket_index in 0..BUCKET_CAPACITY {
                let offset = u64::from(bucket_index) * u64::from(BUCKET_CAPACITY);
                for slot in 0..u64::from(BUCKET_CAPACITY) {
                    assert_eq!(
                        table.insert_with_replacement(bucket_index, offset + slot + 1, &mut rng),
                        None
                    );
                }
            }

            let existing = from_serialized(&table.serialize()).expect("valid serialization");
            for bucket_index in 0..BUCKET_CAPACITY {
                let offset = u64::from(bucket_index) * u64::from(BUCKET_CAPACITY);
                for slot in 0..u64::from(BUCKET_CAPACITY) {
                    assert!(existing.contains(bucket_index, offset + slot + 1));
                }
            }
        }
    }

    #[test]
    fn header_is_big_endian_and_typed() {
        let uncompressed = create(size(), false).expect("valid size");
        let raw = uncompressed.serialize().as_byte_array();
        let mut expected_header = Vec::new();
        for field in [0i32, 1000, 4, 16] {
            expected_header.extend_from_slice(&field.to_be_bytes());
        }
        assert_eq!(&raw[..16], &expected_header[..]);
        // 4000 cells of 16 bits: 1000 words.
        assert_eq!(raw.len(), 16 + 8000);

        let semi_sorted = create(size(), true).expect("valid size");
        let raw = semi_sorted.serialize().as_byte_array();
        assert_eq!(&raw[..4], &1i32.to_be_bytes()[..]);
        // 4000 cells of 15 bits: ceil(60000 / 64) = 938 words.
        assert_eq!(raw.len(), 16 + 938 * 8);
    }

    #[test]
    fn space_optimization_falls_back_when_inapplicable() {
        let narrow = Size::builder()
            .bucket_count(100)
            .bucket_capacity(2)
            .fingerprint_length(16)
            .build()
            .expect("valid size");
        let table = create(narrow, true).expect("valid size");
        assert_eq!(table.serialize().as_byte_array()[3], 0);

        let short = Size::builder()
            .bucket_count(100)
            .bucket_capacity(4)
            .fingerprint_length(3)
            .build()
            .expect("valid size");
        let table = create(short, true).expect("valid size");
        assert_eq!(table.serialize().as_byte_array()[3], 0);
    }

    #[test]
    fn from_serialized_rejects_malformed_blobs() {
        // Too short to hold the header.
        assert!(matches!(
            from_serialized(&SerializedTable::from_byte_array(&[0; 12])),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            from_serialized(&SerializedTable::from_byte_array(&[0; 16])),
            Err(Error::Parse(_))
        ));

        let good = create(size(), false).expect("valid size").serialize();
        let raw = good.as_byte_array();

        // Unknown table type.
        let mut unknown_type = raw.clone();
        unknown_type[3] = 7;
        assert!(matches!(
            from_serialized(&SerializedTable::from_byte_array(&unknown_type)),
            Err(Error::Parse(_))
        ));

        // Body not a whole number of words.
        assert!(matches!(
            from_serialized(&SerializedTable::from_byte_array(&raw[..raw.len() - 3])),
            Err(Error::Parse(_))
        ));

        // Whole words, but fewer than the header dimensions require.
        assert!(matches!(
            from_serialized(&SerializedTable::from_byte_array(&raw[..raw.len() - 8])),
            Err(Error::Parse(_))
        ));

        // Out-of-range dimensions.
        let mut bad_capacity = raw;
        bad_capacity[8..12].copy_from_slice(&200i32.to_be_bytes());
        assert!(matches!(
            from_serialized(&SerializedTable::from_byte_array(&bad_capacity)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[cfg(feature = "serde_support")]
    #[test]
    fn serialized_table_survives_serde() {
        let serialized = create(size(), false).expect("valid size").serialize();
        let encoded = bincode::serialize(&serialized).expect("serializable");
        let decoded: SerializedTable = bincode::deserialize(&encoded).expect("deserializable");
        assert_eq!(decoded, serialized);
    }

    #[test]
    fn construction_copies_the_byte_array() {
        let mut bytes = vec![0u8, 1, 2, 3, 4];
        let serialized = SerializedTable::from_byte_array(&bytes);
        bytes[0] = 2;
        assert_eq!(serialized.as_byte_array(), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn accessor_copies_the_byte_array() {
        let serialized = SerializedTable::from_byte_array(&[0, 1, 2, 3, 4]);
        let mut bytes = serialized.as_byte_array();
        bytes[0] = 1;
        assert_eq!(serialized.as_byte_array(), [0, 1, 2, 3, 4]);
    }
}
