// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! Subresource-integrity style digest strings.
//!
//! An integrity string is `"<algorithm>-<base64(digest)>"`, for example
//! `sha512-3a81oZNherrMQXNJ...==`. Producers disagree about base64 padding,
//! so parsing strips `=` and ignores non-canonical trailing bits. Rendering
//! always emits canonical padded base64.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use data_encoding::{BASE64, Encoding, Specification};
use derive_more::Display;
use thiserror::Error;

use crate::{Algorithm, Hash, UnknownAlgorithm};

const BASE64_SYMBOLS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Padding-free base64 decoder that accepts non-zero trailing bits.
static BASE64_LENIENT: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(BASE64_SYMBOLS);
    spec.check_trailing_bits = false;
    spec.encoding().unwrap()
});

/// Why an integrity string could not be parsed.
#[derive(Display, Debug, PartialEq, Eq, Clone, Copy)]
pub enum MalformedReason {
    #[display("missing '-' between algorithm and digest")]
    MissingSeparator,
    #[display("empty algorithm")]
    EmptyAlgorithm,
    #[display("empty digest")]
    EmptyDigest,
    #[display("digest contains characters outside the base64 alphabet")]
    InvalidCharacter,
    #[display("digest is not valid base64")]
    InvalidBase64,
    #[display("digest has {actual} bytes, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
}

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum IntegrityError {
    #[error("malformed integrity '{digest}': {reason}")]
    Malformed {
        digest: String,
        reason: MalformedReason,
    },

    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnknownAlgorithm),

    #[error("{algorithm} integrity mismatch: expected {expected}, got {provided}")]
    Mismatch {
        algorithm: Algorithm,
        expected: String,
        provided: String,
    },
}

impl IntegrityError {
    fn malformed(digest: &str, reason: MalformedReason) -> Self {
        IntegrityError::Malformed {
            digest: digest.to_owned(),
            reason,
        }
    }

    /// True for the variant produced when well-formed content fails the
    /// comparison, as opposed to an unusable digest string.
    pub fn is_mismatch(&self) -> bool {
        matches!(self, IntegrityError::Mismatch { .. })
    }
}

/// [`Display`](fmt::Display) adapter rendering a [`Hash`] as an integrity
/// string. Obtained through [`Hash::as_sri`].
#[derive(Debug, Clone, Copy)]
pub struct Sri<'a>(pub(crate) &'a Hash);

impl fmt::Display for Sri<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.0.algorithm(),
            BASE64.encode(self.0.digest_bytes())
        )
    }
}

/// Split `s` into its algorithm and raw digest bytes.
///
/// The digest length is not checked against the algorithm here; a short or
/// long digest is a mismatch for [`verify_digest`] but a parse error for
/// [`Hash::from_str`].
fn split_sri(s: &str) -> Result<(Algorithm, Vec<u8>), IntegrityError> {
    let (algorithm, payload) = s
        .split_once('-')
        .ok_or_else(|| IntegrityError::malformed(s, MalformedReason::MissingSeparator))?;
    if algorithm.is_empty() {
        return Err(IntegrityError::malformed(s, MalformedReason::EmptyAlgorithm));
    }
    if payload.is_empty() {
        return Err(IntegrityError::malformed(s, MalformedReason::EmptyDigest));
    }
    if !payload
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return Err(IntegrityError::malformed(s, MalformedReason::InvalidCharacter));
    }
    let algorithm: Algorithm = algorithm.parse()?;

    let unpadded = payload.trim_end_matches('=');
    if unpadded.is_empty() {
        return Err(IntegrityError::malformed(s, MalformedReason::EmptyDigest));
    }
    let digest = BASE64_LENIENT
        .decode(unpadded.as_bytes())
        .map_err(|_| IntegrityError::malformed(s, MalformedReason::InvalidBase64))?;
    Ok((algorithm, digest))
}

impl FromStr for Hash {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, digest) = split_sri(s)?;
        Hash::from_slice(algorithm, &digest).map_err(|_| {
            IntegrityError::malformed(
                s,
                MalformedReason::WrongLength {
                    expected: algorithm.size(),
                    actual: digest.len(),
                },
            )
        })
    }
}

/// A parsed integrity string to check digests against.
///
/// Keeps the caller's original text so mismatches can report it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    text: String,
    algorithm: Algorithm,
    digest: Vec<u8>,
}

impl ExpectedDigest {
    pub fn parse(s: &str) -> Result<Self, IntegrityError> {
        let (algorithm, digest) = split_sri(s)?;
        Ok(Self {
            text: s.to_owned(),
            algorithm,
            digest,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Compare against an already computed digest. A digest of the wrong
    /// length simply does not match.
    pub fn check(&self, actual: &Hash) -> Result<(), IntegrityError> {
        if actual.algorithm() != self.algorithm || actual.digest_bytes() != self.digest.as_slice() {
            return Err(IntegrityError::Mismatch {
                algorithm: self.algorithm,
                expected: self.text.clone(),
                provided: actual.as_sri().to_string(),
            });
        }
        Ok(())
    }

    /// Hash `data` with the expected algorithm and compare.
    pub fn verify<D: AsRef<[u8]>>(&self, data: D) -> Result<Hash, IntegrityError> {
        let actual = self.algorithm.digest(data);
        self.check(&actual)?;
        Ok(actual)
    }
}

impl FromStr for ExpectedDigest {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Check `data` against the integrity string `expected`.
///
/// Returns the freshly computed digest on success. On mismatch the error
/// carries `expected` verbatim next to the integrity string of what was
/// actually found, so both can be reported.
///
/// ```
/// use pkgstore_utils_hash::{Algorithm, verify_digest};
///
/// let sri = Algorithm::SHA512.digest("hello").as_sri().to_string();
/// assert!(verify_digest(&sri, "hello").is_ok());
/// assert!(verify_digest(&sri, "hellO").unwrap_err().is_mismatch());
/// ```
pub fn verify_digest<D: AsRef<[u8]>>(expected: &str, data: D) -> Result<Hash, IntegrityError> {
    ExpectedDigest::parse(expected)?.verify(data)
}
