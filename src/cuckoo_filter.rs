use std::marker::PhantomData;

use rand::rngs::ThreadRng;
use rand::{Rng, RngCore};

use crate::error::{Error, Result};
use crate::funnel::Funnel;
use crate::hash::{HashFunction, Murmur3x128};
use crate::size::Size;
use crate::strategy::{SimpleMod, Strategy};
use crate::table::{self, CuckooFilterTable, SerializedTable};

/// Placeholder for index alignment of the rollback log; never dereferenced.
const SENTINEL_BUCKET_INDEX: u32 = u32::MAX;

/// A space-efficient probabilistic multiset supporting membership check,
/// insertion, and deletion.
///
/// Lookups may return false positives, with a probability controlled by the
/// filter [`Size`]. They never return false negatives, as long as
/// [`delete`](CuckooFilter::delete) is only called on elements that are in
/// the filter.
///
/// Not safe for concurrent mutation; wrap the whole filter in external
/// synchronisation if it must be shared.
#[derive(Debug)]
pub struct CuckooFilter<T: ?Sized, F, H = Murmur3x128, S = SimpleMod, R = DefaultRng> {
    size: Size,
    table: Box<dyn CuckooFilterTable>,
    hash_function: H,
    strategy: S,
    funnel: F,
    rng: R,
    count: u64,
    _element: PhantomData<fn(&T)>,
}

impl<T: ?Sized, F: Funnel<T>> CuckooFilter<T, F> {
    /// Creates a filter sized for up to `elements_count_upper_bound` elements
    /// at the given target false positive rate, with the default hash
    /// function, strategy, and RNG.
    pub fn new(
        target_false_positive_rate: f64,
        elements_count_upper_bound: u64,
        funnel: F,
    ) -> Result<Self> {
        let size = Size::compute_efficient(target_false_positive_rate, elements_count_upper_bound)?;
        CuckooFilterBuilder::new().size(size).finish(funnel)
    }

    /// Reconstructs a filter from a serialized table, with the default hash
    /// function and strategy.
    ///
    /// The serialization records neither hash function, strategy, nor funnel;
    /// the supplied ones must be behaviourally identical to those used when
    /// the table was serialized, otherwise lookups are meaningless.
    pub fn from_serialized_table(serialized: &SerializedTable, funnel: F) -> Result<Self> {
        CuckooFilterBuilder::new().finish_from_serialized(serialized, funnel)
    }
}

impl<T: ?Sized, F, H, S, R> CuckooFilter<T, F, H, S, R>
where
    F: Funnel<T>,
    H: HashFunction,
    S: Strategy,
    R: Rng,
{
    /// Returns true if `element` is in the filter.
    ///
    /// May return a false positive; never returns a false negative (see the
    /// caveat on [`delete`](CuckooFilter::delete)).
    pub fn contains(&self, element: &T) -> bool {
        let (fingerprint, bucket_index, other_bucket_index) = self.placement(element);
        self.table.contains(bucket_index, fingerprint)
            || self.table.contains(other_bucket_index, fingerprint)
    }

    /// Inserts `element`, returning true if it was stored.
    ///
    /// Insertion fails when no room can be made for the element's
    /// fingerprint; the table is left exactly as it was. Other elements may
    /// still insert successfully afterwards, but a failure is a good
    /// indicator that the filter is close to its maximum capacity.
    pub fn insert(&mut self, element: &T) -> bool {
        let (fingerprint, bucket_index, other_bucket_index) = self.placement(element);

        // Fast path: one of the two candidate buckets has room.
        if self.attempt_insertion(fingerprint, bucket_index, other_bucket_index) {
            self.count += 1;
            return true;
        }

        let start_bucket_index = if self.rng.gen_range(0..2) == 0 {
            bucket_index
        } else {
            other_bucket_index
        };
        let inserted = self.insert_with_repeated_replacements(fingerprint, start_bucket_index);
        if inserted {
            self.count += 1;
        }
        inserted
    }

    /// Deletes `element`, returning true if it was found and removed.
    ///
    /// Only call this for elements that are in the filter. Deleting an absent
    /// element can remove the fingerprint of an unrelated colliding element,
    /// after which lookups for that element return a false negative.
    pub fn delete(&mut self, element: &T) -> bool {
        let (fingerprint, bucket_index, other_bucket_index) = self.placement(element);
        let deleted = self.table.delete(bucket_index, fingerprint)
            || self.table.delete(other_bucket_index, fingerprint);
        if deleted {
            // Saturating: a filter rebuilt from a serialized table starts at
            // count 0 but may still hold fingerprints to delete.
            self.count = self.count.saturating_sub(1);
        }
        deleted
    }

    /// Returns the dimensions of the filter.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Returns the number of elements in the filter.
    ///
    /// A filter reconstructed from a serialized table starts over at 0: the
    /// serialization does not record the count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the ratio of [`count`](CuckooFilter::count) to the theoretical
    /// maximum capacity, in `[0, 1]`.
    pub fn load(&self) -> f64 {
        self.count as f64 / self.size.slot_count() as f64
    }

    /// Serializes the state of the table.
    ///
    /// Hash function, strategy, and funnel are not part of the
    /// serialization; reconstruction must be supplied with the same ones.
    pub fn serialize_table(&self) -> SerializedTable {
        self.table.serialize()
    }

    fn placement(&self, element: &T) -> (u64, u32, u32) {
        let mut bytes = Vec::with_capacity(16);
        self.funnel.write(element, &mut bytes);
        let hash = self.hash_function.hash(&bytes);

        let fingerprint = self.strategy.fingerprint(hash, self.size.fingerprint_length());
        let bucket_index = self.strategy.bucket_index(hash, self.size.bucket_count());
        let other_bucket_index = self.strategy.alt_bucket_index(
            fingerprint,
            bucket_index,
            self.size.bucket_count(),
            &self.hash_function,
        );
        (fingerprint, bucket_index, other_bucket_index)
    }

    /// Inserts into whichever candidate bucket has room, if either does.
    fn attempt_insertion(
        &mut self,
        fingerprint: u64,
        bucket_index: u32,
        other_bucket_index: u32,
    ) -> bool {
        if !self.table.is_full(bucket_index) {
            self.table
                .insert_with_replacement(bucket_index, fingerprint, &mut self.rng);
            return true;
        }
        if !self.table.is_full(other_bucket_index) {
            self.table
                .insert_with_replacement(other_bucket_index, fingerprint, &mut self.rng);
            return true;
        }
        false
    }

    /// Random walk over the cuckoo graph: push visited fingerprints to their
    /// alternate buckets until a free slot turns up or the budget runs out.
    ///
    /// A breadth-first search would find a free slot deterministically, but
    /// it is slower and the extra success probability is negligible in
    /// practice. On failure every replacement is reversed, leaving the table
    /// bit-identical to its pre-insert state (up to in-bucket order).
    fn insert_with_repeated_replacements(
        &mut self,
        fingerprint: u64,
        start_bucket_index: u32,
    ) -> bool {
        let mut visited_bucket_indices = vec![SENTINEL_BUCKET_INDEX];
        let mut replaced_fingerprints = vec![fingerprint];

        let mut current_fingerprint = fingerprint;
        let mut current_bucket_index = start_bucket_index;
        for _ in 0..self.strategy.max_replacement_count() {
            match self.table.insert_with_replacement(
                current_bucket_index,
                current_fingerprint,
                &mut self.rng,
            ) {
                None => return true,
                Some(replaced_fingerprint) => {
                    visited_bucket_indices.push(current_bucket_index);
                    replaced_fingerprints.push(replaced_fingerprint);

                    current_fingerprint = replaced_fingerprint;
                    current_bucket_index = self.strategy.alt_bucket_index(
                        current_fingerprint,
                        current_bucket_index,
                        self.size.bucket_count(),
                        &self.hash_function,
                    );
                }
            }
        }

        // No luck. Reverse the replacements, newest first.
        for i in (1..visited_bucket_indices.len()).rev() {
            let bucket_index = visited_bucket_indices[i];
            self.table.delete(bucket_index, replaced_fingerprints[i - 1]);
            self.table
                .insert_with_replacement(bucket_index, replaced_fingerprints[i], &mut self.rng);
        }
        false
    }
}

/// Builder for [`CuckooFilter`]s.
///
/// The size is required; hash function, strategy, and RNG default to
/// [`Murmur3x128`], [`SimpleMod`], and [`DefaultRng`].
#[derive(Debug)]
pub struct CuckooFilterBuilder<H = Murmur3x128, S = SimpleMod, R = DefaultRng> {
    size: Option<Size>,
    use_space_optimization: bool,
    hash_function: H,
    strategy: S,
    rng: R,
}

impl CuckooFilterBuilder {
    /// Creates a builder with every field at its default.
    pub fn new() -> Self {
        CuckooFilterBuilder {
            size: None,
            use_space_optimization: false,
            hash_function: Murmur3x128,
            strategy: SimpleMod,
            rng: DefaultRng::default(),
        }
    }
}

impl Default for CuckooFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HashFunction, S: Strategy, R: Rng> CuckooFilterBuilder<H, S, R> {
    /// Sets the filter dimensions. Required unless the filter is finished
    /// from a serialized table.
    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Requests the space-optimized table representation, saving one bit per
    /// slot when the dimensions allow it.
    ///
    /// Best effort: with a bucket capacity other than 4 or fingerprints
    /// shorter than 4 bits the uncompressed representation is used anyway.
    /// The optimized representation makes filter operations slower by a
    /// constant factor and carries a small fixed space overhead, so for small
    /// filters it can end up larger than the plain one.
    pub fn space_optimization(mut self, use_space_optimization: bool) -> Self {
        self.use_space_optimization = use_space_optimization;
        self
    }

    /// Replaces the hash function.
    pub fn hash_function<H2: HashFunction>(self, hash_function: H2) -> CuckooFilterBuilder<H2, S, R> {
        CuckooFilterBuilder {
            size: self.size,
            use_space_optimization: self.use_space_optimization,
            hash_function,
            strategy: self.strategy,
            rng: self.rng,
        }
    }

    /// Replaces the placement strategy.
    pub fn strategy<S2: Strategy>(self, strategy: S2) -> CuckooFilterBuilder<H, S2, R> {
        CuckooFilterBuilder {
            size: self.size,
            use_space_optimization: self.use_space_optimization,
            hash_function: self.hash_function,
            strategy,
            rng: self.rng,
        }
    }

    /// Replaces the random number generator. Inject a seeded RNG for
    /// deterministic tests.
    pub fn rng<R2: Rng>(self, rng: R2) -> CuckooFilterBuilder<H, S, R2> {
        CuckooFilterBuilder {
            size: self.size,
            use_space_optimization: self.use_space_optimization,
            hash_function: self.hash_function,
            strategy: self.strategy,
            rng,
        }
    }

    /// Builds an empty filter for elements serialized by `funnel`.
    ///
    /// Fails if the size was not set.
    pub fn finish<T: ?Sized, F: Funnel<T>>(self, funnel: F) -> Result<CuckooFilter<T, F, H, S, R>> {
        let size = self
            .size
            .ok_or_else(|| Error::invalid_argument("size must be set"))?;
        let table = table::create(size, self.use_space_optimization)?;
        Ok(CuckooFilter {
            size,
            table,
            hash_function: self.hash_function,
            strategy: self.strategy,
            funnel,
            rng: self.rng,
            count: 0,
            _element: PhantomData,
        })
    }

    /// Builds a filter over an existing serialized table; the dimensions and
    /// layout are decoded from the blob, so any size set on the builder is
    /// ignored. The count starts over at 0.
    pub fn finish_from_serialized<T: ?Sized, F: Funnel<T>>(
        self,
        serialized: &SerializedTable,
        funnel: F,
    ) -> Result<CuckooFilter<T, F, H, S, R>> {
        let table = table::from_serialized(serialized)?;
        Ok(CuckooFilter {
            size: table.size(),
            table,
            hash_function: self.hash_function,
            strategy: self.strategy,
            funnel,
            rng: self.rng,
            count: 0,
            _element: PhantomData,
        })
    }
}

/// The default random number generator, backing victim selection and the
/// random-walk start choice.
#[derive(Debug, Clone, Default)]
pub struct DefaultRng(ThreadRng);

impl RngCore for DefaultRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}
