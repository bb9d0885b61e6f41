// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Digest utilities for pkgstore.
//!
//! Everything the store needs to name and verify content lives here:
//!
//! - [`Algorithm`] and [`Hash`]: a digest value tagged with the algorithm that
//!   produced it.
//! - [`Context`] and [`HashingReader`]: incremental hashing, the latter over
//!   any [`AsyncRead`](tokio::io::AsyncRead).
//! - [`sri`]: the `"<algorithm>-<base64>"` integrity string format and
//!   [`verify_digest`], the pure integrity check used before anything touches
//!   the disk.

use std::fmt as sfmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest as _;
use thiserror::Error;

mod algo;
mod hashing_reader;
pub mod sri;

pub use algo::{Algorithm, UnknownAlgorithm};
pub use hashing_reader::{DigestState, HashingReader};
pub use sri::{ExpectedDigest, IntegrityError, MalformedReason, verify_digest};

const LARGEST_ALGORITHM: Algorithm = Algorithm::LARGEST;

#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("hash has wrong length {length} != {} for hash type '{algorithm}'", algorithm.size())]
pub struct InvalidHashError {
    algorithm: Algorithm,
    length: usize,
}

/// A digest together with the algorithm that produced it.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Hash {
    algorithm: Algorithm,
    data: [u8; LARGEST_ALGORITHM.size()],
}

impl Hash {
    pub const fn new(algorithm: Algorithm, hash: &[u8]) -> Hash {
        let mut data = [0u8; LARGEST_ALGORITHM.size()];
        let (hash_data, _postfix) = data.split_at_mut(algorithm.size());
        hash_data.copy_from_slice(hash);
        Hash { algorithm, data }
    }

    pub fn from_slice(algorithm: Algorithm, hash: &[u8]) -> Result<Hash, InvalidHashError> {
        if hash.len() != algorithm.size() {
            return Err(InvalidHashError {
                algorithm,
                length: hash.len(),
            });
        }
        Ok(Hash::new(algorithm, hash))
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[inline]
    pub fn digest_bytes(&self) -> &[u8] {
        &self.data[0..(self.algorithm.size())]
    }

    /// Lowercase hexadecimal rendering of the digest, the form the content
    /// store derives file names from.
    pub fn to_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(self.digest_bytes())
    }

    /// Display adapter rendering this hash as an integrity string.
    pub fn as_sri(&self) -> sri::Sri<'_> {
        sri::Sri(self)
    }
}

impl std::ops::Deref for Hash {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.digest_bytes()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        self.digest_bytes()
    }
}

impl sfmt::Debug for Hash {
    fn fmt(&self, f: &mut sfmt::Formatter<'_>) -> sfmt::Result {
        write!(f, "Hash({})", self.as_sri())
    }
}

impl sfmt::Display for Hash {
    fn fmt(&self, f: &mut sfmt::Formatter<'_>) -> sfmt::Result {
        sfmt::Display::fmt(&self.as_sri(), f)
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.as_sri())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<Hash>().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone)]
enum InnerContext {
    MD5(md5::Context),
    SHA1(sha1::Sha1),
    SHA256(sha2::Sha256),
    SHA512(sha2::Sha512),
}

/// A context for multi-step (Init-Update-Finish) digest calculation.
///
/// # Examples
///
/// ```
/// use pkgstore_utils_hash as hash;
///
/// let one_shot = hash::Algorithm::SHA512.digest("hello, world");
///
/// let mut ctx = hash::Context::new(hash::Algorithm::SHA512);
/// ctx.update("hello");
/// ctx.update(", ");
/// ctx.update("world");
/// let multi_path = ctx.finish();
///
/// assert_eq!(one_shot, multi_path);
/// ```
#[derive(Clone)]
pub struct Context(Algorithm, InnerContext);

impl Context {
    /// Constructs a new context with `algorithm`.
    pub fn new(algorithm: Algorithm) -> Self {
        let inner = match algorithm {
            Algorithm::MD5 => InnerContext::MD5(md5::Context::new()),
            Algorithm::SHA1 => InnerContext::SHA1(sha1::Sha1::new()),
            Algorithm::SHA256 => InnerContext::SHA256(sha2::Sha256::new()),
            Algorithm::SHA512 => InnerContext::SHA512(sha2::Sha512::new()),
        };
        Context(algorithm, inner)
    }

    /// Update the digest with all the data in `data`.
    /// `update` may be called zero or more times before `finish` is called.
    pub fn update<D: AsRef<[u8]>>(&mut self, data: D) {
        let data = data.as_ref();
        match &mut self.1 {
            InnerContext::MD5(ctx) => ctx.consume(data),
            InnerContext::SHA1(ctx) => ctx.update(data),
            InnerContext::SHA256(ctx) => ctx.update(data),
            InnerContext::SHA512(ctx) => ctx.update(data),
        }
    }

    /// Finalizes the digest calculation and returns the [`Hash`] value.
    /// This consumes the context to prevent misuse.
    ///
    /// [`Hash`]: struct@Hash
    pub fn finish(self) -> Hash {
        match self.1 {
            InnerContext::MD5(ctx) => Hash::new(self.0, ctx.finalize().as_ref()),
            InnerContext::SHA1(ctx) => Hash::new(self.0, &ctx.finalize()),
            InnerContext::SHA256(ctx) => Hash::new(self.0, &ctx.finalize()),
            InnerContext::SHA512(ctx) => Hash::new(self.0, &ctx.finalize()),
        }
    }

    /// The algorithm that this context is using.
    pub fn algorithm(&self) -> Algorithm {
        self.0
    }
}

impl sfmt::Debug for Context {
    fn fmt(&self, f: &mut sfmt::Formatter<'_>) -> sfmt::Result {
        f.debug_tuple("Context").field(&self.0).finish()
    }
}

#[cfg(any(test, feature = "test"))]
mod proptests {
    use super::*;
    use ::proptest::prelude::*;

    impl Arbitrary for Algorithm {
        type Parameters = ();
        type Strategy = BoxedStrategy<Algorithm>;
        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                1 => Just(Algorithm::MD5),
                2 => Just(Algorithm::SHA1),
                2 => Just(Algorithm::SHA256),
                5 => Just(Algorithm::SHA512)
            ]
            .boxed()
        }
    }

    impl Arbitrary for Hash {
        type Parameters = Algorithm;
        type Strategy = BoxedStrategy<Hash>;

        fn arbitrary_with(algorithm: Self::Parameters) -> Self::Strategy {
            any_hash(algorithm).boxed()
        }
    }

    prop_compose! {
        fn any_hash(algorithm: Algorithm)
                   (data in any::<Vec<u8>>()) -> Hash
        {
            algorithm.digest(data)
        }
    }
}

#[cfg(test)]
mod unittests {
    use hex_literal::hex;
    use rstest::rstest;

    use super::*;

    /// value taken from: https://tools.ietf.org/html/rfc1321
    const MD5_ABC: Hash = Hash::new(Algorithm::MD5, &hex!("900150983cd24fb0d6963f7d28e17f72"));

    /// value taken from: https://tools.ietf.org/html/rfc3174
    const SHA1_ABC: Hash = Hash::new(
        Algorithm::SHA1,
        &hex!("a9993e364706816aba3e25717850c26c9cd0d89d"),
    );

    /// value taken from: https://tools.ietf.org/html/rfc4634
    const SHA256_ABC: Hash = Hash::new(
        Algorithm::SHA256,
        &hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"),
    );

    /// value taken from: https://tools.ietf.org/html/rfc4634
    const SHA512_ABC: Hash = Hash::new(
        Algorithm::SHA512,
        &hex!(
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        ),
    );

    #[rstest]
    #[case::md5("md5", Algorithm::MD5)]
    #[case::sha1("sha1", Algorithm::SHA1)]
    #[case::sha256("sha256", Algorithm::SHA256)]
    #[case::sha512("sha512", Algorithm::SHA512)]
    #[case::sha512_upper("SHA512", Algorithm::SHA512)]
    #[case::sha256_mixed("ShA256", Algorithm::SHA256)]
    fn algorithm_from_str(#[case] input: &str, #[case] expected: Algorithm) {
        let actual = input.parse().unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn unknown_algorithm() {
        assert_eq!(
            Err(UnknownAlgorithm("sha384".into())),
            "sha384".parse::<Algorithm>()
        );
    }

    #[rstest]
    #[case::md5(&MD5_ABC)]
    #[case::sha1(&SHA1_ABC)]
    #[case::sha256(&SHA256_ABC)]
    #[case::sha512(&SHA512_ABC)]
    fn test_digest(#[case] expected: &Hash) {
        assert_eq!(expected.algorithm().digest("abc"), *expected);
    }

    #[rstest]
    #[case::sha512(Algorithm::SHA512)]
    #[case::sha256(Algorithm::SHA256)]
    #[case::sha1(Algorithm::SHA1)]
    #[case::md5(Algorithm::MD5)]
    fn context_matches_one_shot(#[case] algorithm: Algorithm) {
        let mut ctx = Context::new(algorithm);
        ctx.update("ab");
        ctx.update("c");
        assert_eq!(ctx.finish(), algorithm.digest("abc"));
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(
            SHA256_ABC.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[rstest]
    #[case::sha256(&SHA256_ABC, "sha256-ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=")]
    #[case::sha1(&SHA1_ABC, "sha1-qZk+NkcGgWq6PiVxeFDCbJzQ2J0=")]
    #[case::md5(&MD5_ABC, "md5-kAFQmDzST7DWlj99KOF/cg==")]
    #[case::sha512(&SHA512_ABC, "sha512-3a81oZNherrMQXNJriBBMRLm+k6JqX6iCp7u5ktV05ohkpkqJ0/BqDa6PCOj/uu9RU1EI2Q86A4qmslPpUyknw==")]
    fn test_serde_hash_sri(#[case] hash: &Hash, #[case] sri_str: &str) {
        let serialized = serde_json::to_value(hash).unwrap();
        assert_eq!(serialized.as_str().unwrap(), sri_str);

        let deserialized: Hash = serde_json::from_value(serialized).unwrap();
        assert_eq!(&deserialized, hash);
    }

    #[test]
    fn test_serde_hash_invalid() {
        let json = serde_json::json!("invalid-hash-string");
        let result: Result<Hash, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
