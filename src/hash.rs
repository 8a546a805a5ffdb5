// MIT License
//
// Copyright (c) 2020 Gregory Meyer
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Key hashing.
//!
//! Every table in this crate hashes keys with the same fixed, seedless
//! algorithm, so a given key stream lands in the same buckets run after run.
//! Benchmark CSVs are only comparable across runs because of this; a
//! randomly-salted hasher would reshuffle bucket contention on every
//! execution.

use std::hash::{BuildHasher, Hash, Hasher};

/// The hasher used by every table unless one is supplied explicitly.
pub type DefaultHashBuilder = fxhash::FxBuildHasher;

/// Hashes `key` to its 64-bit fingerprint.
pub(crate) fn hash_key<Q, S>(build_hasher: &S, key: &Q) -> u64
where
    Q: ?Sized + Hash,
    S: BuildHasher,
{
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_are_stable() {
        let build_hasher = DefaultHashBuilder::default();

        for key in 0..1024u64 {
            assert_eq!(
                hash_key(&build_hasher, &key),
                hash_key(&build_hasher, &key)
            );
        }
    }

    #[test]
    fn fingerprints_are_identical_across_builders() {
        let first = DefaultHashBuilder::default();
        let second = DefaultHashBuilder::default();

        for key in 0..1024u64 {
            assert_eq!(hash_key(&first, &key), hash_key(&second, &key));
        }
    }
}
