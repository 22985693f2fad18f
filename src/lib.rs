//! A [Cuckoo Filter][cuckoo filter]: a space-efficient probabilistic multiset
//! supporting membership check, insertion, and deletion.
//!
//! Like a Bloom filter, lookups can return false positives but never false
//! negatives; unlike a Bloom filter, elements can be deleted again, and at
//! equal false-positive targets the filter often needs fewer bits per
//! element. Deletion comes with one obligation: only delete elements that are
//! in the filter, otherwise a colliding element's fingerprint may be removed
//! instead.
//!
//! # Examples
//!
//! Sizing from a target false positive rate:
//!
//! ```
//! use cuckoo_filter::{CuckooFilter, StrFunnel};
//!
//! let mut filter = CuckooFilter::<str, _>::new(0.01, 1000, StrFunnel).unwrap();
//! assert!(!filter.contains("foo"));
//! filter.insert("foo");
//! assert!(filter.contains("foo"));
//! assert!(filter.delete("foo"));
//! assert!(!filter.contains("foo"));
//! ```
//!
//! Explicit dimensions, the space-optimized table layout, and a
//! serialization round-trip:
//!
//! ```
//! use cuckoo_filter::{CuckooFilter, CuckooFilterBuilder, I64Funnel, Size};
//!
//! let size = Size::builder()
//!     .bucket_count(100)
//!     .bucket_capacity(4)
//!     .fingerprint_length(16)
//!     .build()
//!     .unwrap();
//! let mut filter = CuckooFilterBuilder::new()
//!     .size(size)
//!     .space_optimization(true)
//!     .finish::<i64, _>(I64Funnel)
//!     .unwrap();
//! for i in 0..100 {
//!     assert!(filter.insert(&i));
//! }
//!
//! let serialized = filter.serialize_table();
//! let restored = CuckooFilter::<i64, _>::from_serialized_table(&serialized, I64Funnel).unwrap();
//! for i in 0..100 {
//!     assert!(restored.contains(&i));
//! }
//! ```
//!
//! # References
//!
//! - [Cuckoo Filter: Practically Better Than Bloom][cuckoo filter]
//!
//! [cuckoo filter]: https://www.cs.cmu.edu/~dga/papers/cuckoo-conext2014.pdf
#![warn(missing_docs)]

pub use crate::cuckoo_filter::{CuckooFilter, CuckooFilterBuilder, DefaultRng};
pub use crate::error::{Error, Result};
pub use crate::funnel::{BytesFunnel, FnFunnel, Funnel, I32Funnel, I64Funnel, StrFunnel};
pub use crate::hash::{HashFunction, Murmur3x128, SipHash13};
pub use crate::size::{Size, SizeBuilder};
pub use crate::strategy::{SimpleMod, Strategy, UniformMod};
pub use crate::table::SerializedTable;

mod bits;
mod cuckoo_filter;
mod error;
mod funnel;
mod hash;
mod semi_sorted;
mod size;
mod strategy;
mod table;
mod uncompressed;
