use std::hash::Hasher as _;
use std::io;

use siphasher::sip::SipHasher13;

/// Hash function supplying 64 bits of entropy per element.
///
/// The filter hashes the bytes produced by a [`Funnel`](crate::Funnel), and
/// the strategy hashes fingerprint encodings. Implementations must be pure:
/// equal inputs always produce equal outputs, across processes.
pub trait HashFunction {
    /// Calculates the 64-bit hash value of `bytes`.
    fn hash(&self, bytes: &[u8]) -> u64;
}

/// 128-bit MurmurHash3 (x64 variant, seed 0), truncated to the first eight
/// digest bytes interpreted little-endian.
///
/// The truncation matches the common "as long" convention of 128-bit hash
/// codes, so tables built with this function are interchangeable with other
/// murmur3-128 based implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Murmur3x128;

impl HashFunction for Murmur3x128 {
    fn hash(&self, bytes: &[u8]) -> u64 {
        let mut reader = io::Cursor::new(bytes);
        let digest =
            murmur3::murmur3_x64_128(&mut reader, 0).expect("reading from a slice never fails");
        digest as u64
    }
}

/// SipHash-1-3 with a fixed zero key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SipHash13;

impl HashFunction for SipHash13 {
    fn hash(&self, bytes: &[u8]) -> u64 {
        let mut hasher = SipHasher13::new();
        hasher.write(bytes);
        hasher.finish()
    }
}
