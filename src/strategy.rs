use crate::hash::HashFunction;

/// Derives fingerprints and bucket placements from 64-bit hash values.
///
/// A strategy is a bundle of pure functions. `alt_bucket_index` must be an
/// involution with respect to the bucket index: with the other parameters
/// fixed, `alt_bucket_index(alt_bucket_index(b)) == b` for every valid `b`.
/// Without this property, evicted fingerprints could not be pushed back to
/// their other candidate bucket without re-hashing the original element.
pub trait Strategy {
    /// Computes a fingerprint in the open interval `(0, 2^fingerprint_length)`.
    ///
    /// The value 0 is reserved for empty slots and must never be returned.
    fn fingerprint(&self, hash: u64, fingerprint_length: u32) -> u64;

    /// Computes the primary bucket index, in `[0, bucket_count)`.
    fn bucket_index(&self, hash: u64, bucket_count: u32) -> u32;

    /// Computes the other candidate bucket index, in `[0, bucket_count)`.
    ///
    /// `hash_function` is the same function the owning filter hashes elements
    /// with; implementations may or may not use it.
    fn alt_bucket_index(
        &self,
        fingerprint: u64,
        bucket_index: u32,
        bucket_count: u32,
        hash_function: &dyn HashFunction,
    ) -> u32;

    /// Maximum number of replacements made during one insertion before the
    /// insertion is declared failed.
    fn max_replacement_count(&self) -> usize {
        500
    }
}

/// Strategy deriving placements with floor-mod arithmetic.
///
/// The fingerprint is the most significant `fingerprint_length` bits of the
/// hash (most significant to remove the correlation with the bucket index,
/// which consumes the hash from the low end). A fingerprint of 0 is remapped
/// to 1, so 1 is twice as likely as any other value; taking the hash mod
/// `2^fingerprint_length - 1` plus one would be uniform but costs an extra
/// mod on every operation. See [`UniformMod`] for that trade.
///
/// The alternate bucket is `floor_mod(h(fp) - b, bucket_count)` where `h(fp)`
/// hashes the 8-byte little-endian encoding of the fingerprint; subtracting
/// from a fixed quantity is self-inverse modulo `bucket_count`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleMod;

impl Strategy for SimpleMod {
    fn fingerprint(&self, hash: u64, fingerprint_length: u32) -> u64 {
        let fingerprint = hash >> (64 - fingerprint_length);
        if fingerprint == 0 {
            1
        } else {
            fingerprint
        }
    }

    fn bucket_index(&self, hash: u64, bucket_count: u32) -> u32 {
        (hash as i64).rem_euclid(i64::from(bucket_count)) as u32
    }

    fn alt_bucket_index(
        &self,
        fingerprint: u64,
        bucket_index: u32,
        bucket_count: u32,
        hash_function: &dyn HashFunction,
    ) -> u32 {
        let fingerprint_hash = hash_function.hash(&fingerprint.to_le_bytes()) as i64;
        fingerprint_hash
            .wrapping_sub(i64::from(bucket_index))
            .rem_euclid(i64::from(bucket_count)) as u32
    }
}

/// Variant of [`SimpleMod`] with an unbiased fingerprint distribution.
///
/// Fingerprints are `hash mod (2^fingerprint_length - 1) + 1`, never 0 and
/// uniform over `(0, 2^fingerprint_length)`. Tables built with this strategy
/// are not interchangeable with [`SimpleMod`] tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformMod;

impl Strategy for UniformMod {
    fn fingerprint(&self, hash: u64, fingerprint_length: u32) -> u64 {
        let non_zero_values = if fingerprint_length == 64 {
            u64::MAX
        } else {
            (1u64 << fingerprint_length) - 1
        };
        hash % non_zero_values + 1
    }

    fn bucket_index(&self, hash: u64, bucket_count: u32) -> u32 {
        SimpleMod.bucket_index(hash, bucket_count)
    }

    fn alt_bucket_index(
        &self,
        fingerprint: u64,
        bucket_index: u32,
        bucket_count: u32,
        hash_function: &dyn HashFunction,
    ) -> u32 {
        SimpleMod.alt_bucket_index(fingerprint, bucket_index, bucket_count, hash_function)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::Murmur3x128;

    const FINGERPRINT_LENGTH: u32 = 16;
    const BUCKET_COUNT: u32 = 100;

    #[test]
    fn simple_mod_fingerprint_zero_maps_to_one() {
        assert_eq!(SimpleMod.fingerprint(0, FINGERPRINT_LENGTH), 1);
        assert_eq!(
            SimpleMod.fingerprint(1 << (FINGERPRINT_LENGTH + 1), FINGERPRINT_LENGTH),
            1
        );
        assert_eq!(SimpleMod.fingerprint(0, 64), 1);
    }

    #[test]
    fn simple_mod_fingerprint_uses_most_significant_bits() {
        assert_eq!(
            SimpleMod.fingerprint(u64::MAX, FINGERPRINT_LENGTH),
            (1 << FINGERPRINT_LENGTH) - 1
        );
        assert_eq!(SimpleMod.fingerprint(u64::MAX, 64), u64::MAX);
        assert_eq!(SimpleMod.fingerprint(1 << 63, FINGERPRINT_LENGTH), 1 << 15);
    }

    #[test]
    fn simple_mod_bucket_index_is_floor_mod() {
        assert_eq!(SimpleMod.bucket_index(0, BUCKET_COUNT), 0);
        assert_eq!(SimpleMod.bucket_index(99, BUCKET_COUNT), 99);
        assert_eq!(SimpleMod.bucket_index(100, BUCKET_COUNT), 0);
        assert_eq!(SimpleMod.bucket_index(199, BUCKET_COUNT), 99);
        // -1 as a signed hash floor-mods to 99, not to a negative remainder.
        assert_eq!(SimpleMod.bucket_index(u64::MAX, BUCKET_COUNT), 99);
    }

    #[test]
    fn simple_mod_alt_bucket_index_is_an_involution() {
        let hash_function = Murmur3x128;
        for fingerprint in (1..1000).step_by(10) {
            for bucket_index in 0..BUCKET_COUNT {
                let other = SimpleMod.alt_bucket_index(
                    fingerprint,
                    bucket_index,
                    BUCKET_COUNT,
                    &hash_function,
                );
                assert!(other < BUCKET_COUNT);
                assert_eq!(
                    SimpleMod.alt_bucket_index(fingerprint, other, BUCKET_COUNT, &hash_function),
                    bucket_index
                );
            }
        }
    }

    #[test]
    fn uniform_mod_fingerprint_is_never_zero() {
        for length in [4, 16, 64] {
            for hash in [0, 1, u64::MAX / 2, u64::MAX - 1, u64::MAX] {
                let fingerprint = UniformMod.fingerprint(hash, length);
                assert_ne!(fingerprint, 0);
                if length < 64 {
                    assert!(fingerprint < 1 << length);
                }
            }
        }
    }

    #[test]
    fn uniform_mod_shares_the_involution() {
        let hash_function = Murmur3x128;
        for fingerprint in (1..200).step_by(7) {
            for bucket_index in (0..BUCKET_COUNT).step_by(13) {
                let other = UniformMod.alt_bucket_index(
                    fingerprint,
                    bucket_index,
                    BUCKET_COUNT,
                    &hash_function,
                );
                assert_eq!(
                    UniformMod.alt_bucket_index(fingerprint, other, BUCKET_COUNT, &hash_function),
                    bucket_index
                );
            }
        }
    }

    #[test]
    fn default_replacement_budget() {
        assert_eq!(SimpleMod.max_replacement_count(), 500);
    }
}
