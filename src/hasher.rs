//! Key hashing.
//!
//! Maps are generic over a [`BuildHasher`]; [`DefaultHashBuilder`] is the
//! one used when none is given. Its concrete type is picked by feature flag:
//!
//! | feature  | hasher                                 |
//! |----------|----------------------------------------|
//! | (none)   | `DefaultHasher` (SipHash, fixed keys)  |
//! | `fxhash` | `rustc_hash::FxBuildHasher`            |
//! | `ahash`  | `ahash::AHasher` with fixed keys       |
//!
//! All three are deterministic for the lifetime of the process, so two maps
//! built from the same entries agree on every key's position.
//!
//! # Contract
//!
//! Keys that compare equal must hash identically. The trie relies on this
//! without checking it; a key type that violates it makes lookups miss.

use std::hash::{BuildHasher, Hash};

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
use std::collections::hash_map::DefaultHasher;
#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
use std::hash::BuildHasherDefault;

/// The hash builder used by maps created with `new()`.
#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
pub type DefaultHashBuilder = BuildHasherDefault<DefaultHasher>;

/// The hash builder used by maps created with `new()`.
#[cfg(feature = "fxhash")]
pub type DefaultHashBuilder = rustc_hash::FxBuildHasher;

/// The hash builder used by maps created with `new()`.
#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
pub type DefaultHashBuilder = std::hash::BuildHasherDefault<ahash::AHasher>;

/// Computes the 64-bit trie hash of `key`.
#[inline]
pub fn hash_key<S, Q>(hash_builder: &S, key: &Q) -> u64
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    hash_builder.hash_one(key)
}
