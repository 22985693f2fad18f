use crate::error::{Error, Result};

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Exclusive upper bound on the bucket count, so indices fit a signed 32-bit
/// serialization header field.
const MAX_BUCKET_COUNT: u64 = 1 << 31;
const MAX_BUCKET_CAPACITY: u32 = 128;
const MAX_FINGERPRINT_LENGTH: u32 = 64;

/// Empirically achievable load by bucket capacity.
const APPROX_LOAD_BY_BUCKET_CAPACITY: [(u32, f64); 7] = [
    (2, 0.85),
    (3, 0.91),
    (4, 0.95),
    (5, 0.96),
    (6, 0.97),
    (7, 0.98),
    (8, 0.98),
];

/// Dimensions of a cuckoo filter table.
///
/// A size is the triple (bucket count, bucket capacity, fingerprint length):
/// the table has `bucket_count` buckets, each holding up to `bucket_capacity`
/// fingerprints of `fingerprint_length` bits. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Size {
    bucket_count: u32,
    bucket_capacity: u32,
    fingerprint_length: u32,
}

impl Size {
    /// Returns a builder with all fields unset.
    pub fn builder() -> SizeBuilder {
        SizeBuilder::default()
    }

    /// Computes a space-efficient size that stores up to
    /// `elements_count_upper_bound` elements (with high probability) at the
    /// given target false positive rate.
    ///
    /// For each candidate bucket capacity the fingerprint length follows from
    /// the target rate and the bucket count from the empirically achievable
    /// load; the candidate with the fewest total bits wins.
    pub fn compute_efficient(
        target_false_positive_rate: f64,
        elements_count_upper_bound: u64,
    ) -> Result<Self> {
        if !(target_false_positive_rate > 0.0 && target_false_positive_rate < 1.0) {
            return Err(Error::invalid_argument(format!(
                "target false positive rate must be in range (0, 1): \
                 {target_false_positive_rate} given"
            )));
        }
        if elements_count_upper_bound == 0 {
            return Err(Error::invalid_argument(
                "elements count upper bound must be > 0: 0 given",
            ));
        }

        let mut best: Option<(u64, Size)> = None;
        for (bucket_capacity, load) in APPROX_LOAD_BY_BUCKET_CAPACITY {
            let fingerprint_length = (-target_false_positive_rate.log2()
                + f64::from(bucket_capacity).log2()
                + 1.0)
                .ceil() as u64;
            let bucket_count = (elements_count_upper_bound as f64
                / (f64::from(bucket_capacity) * load))
                .ceil() as u64;
            if fingerprint_length > u64::from(MAX_FINGERPRINT_LENGTH)
                || bucket_count >= MAX_BUCKET_COUNT
            {
                continue;
            }

            let total_bits = bucket_count * u64::from(bucket_capacity) * fingerprint_length;
            if best.map_or(true, |(bits, _)| bits > total_bits) {
                best = Some((
                    total_bits,
                    Size {
                        bucket_count: bucket_count as u32,
                        bucket_capacity,
                        fingerprint_length: fingerprint_length as u32,
                    },
                ));
            }
        }

        best.map(|(_, size)| size).ok_or_else(|| {
            Error::invalid_argument(
                "could not compute a suitable size from the given input: either the target \
                 false positive rate is too low, or the computed size is too big",
            )
        })
    }

    /// Total number of buckets.
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Maximum number of fingerprints each bucket can hold.
    pub fn bucket_capacity(&self) -> u32 {
        self.bucket_capacity
    }

    /// Length of each fingerprint in bits.
    pub fn fingerprint_length(&self) -> u32 {
        self.fingerprint_length
    }

    /// Total number of slots.
    pub(crate) fn slot_count(&self) -> u64 {
        u64::from(self.bucket_count) * u64::from(self.bucket_capacity)
    }
}

/// Builder for [`Size`]. All fields are required.
#[derive(Debug, Default, Clone)]
pub struct SizeBuilder {
    bucket_count: u32,
    bucket_capacity: u32,
    fingerprint_length: u32,
}

impl SizeBuilder {
    /// Sets the number of buckets; must be in range `[1, 2^31)`.
    pub fn bucket_count(mut self, bucket_count: u32) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// Sets the bucket capacity; must be in range `[1, 128]`.
    pub fn bucket_capacity(mut self, bucket_capacity: u32) -> Self {
        self.bucket_capacity = bucket_capacity;
        self
    }

    /// Sets the fingerprint length in bits; must be in range `[1, 64]`.
    pub fn fingerprint_length(mut self, fingerprint_length: u32) -> Self {
        self.fingerprint_length = fingerprint_length;
        self
    }

    /// Validates the configured dimensions and builds a [`Size`].
    pub fn build(self) -> Result<Size> {
        if self.bucket_count == 0 || u64::from(self.bucket_count) >= MAX_BUCKET_COUNT {
            return Err(Error::invalid_argument(format!(
                "bucket count must be in range [1, {MAX_BUCKET_COUNT}): {} given",
                self.bucket_count
            )));
        }
        if !(1..=MAX_BUCKET_CAPACITY).contains(&self.bucket_capacity) {
            return Err(Error::invalid_argument(format!(
                "bucket capacity must be in range [1, {MAX_BUCKET_CAPACITY}]: {} given",
                self.bucket_capacity
            )));
        }
        if !(1..=MAX_FINGERPRINT_LENGTH).contains(&self.fingerprint_length) {
            return Err(Error::invalid_argument(format!(
                "fingerprint length must be in range [1, {MAX_FINGERPRINT_LENGTH}]: {} given",
                self.fingerprint_length
            )));
        }
        Ok(Size {
            bucket_count: self.bucket_count,
            bucket_capacity: self.bucket_capacity,
            fingerprint_length: self.fingerprint_length,
        })
    }
}
