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

//! Lock-free chained hash table.
//!
//! Each bucket is a singly linked list of heap-allocated nodes. New nodes
//! are published by compare-and-swap on the bucket head; removal first tags
//! the victim's `next` pointer (the logical delete, and the operation's
//! linearization point), then unlinks it from its predecessor with a second
//! compare-and-swap. A node whose `next` carries the tag is dead: every
//! traversal treats it as absent, and the walk inside `remove` unlinks any
//! it passes. Unlinked nodes are retired through the epoch collector and
//! freed once no thread can still be reading them, so readers, inserters,
//! and removers may all hit the same bucket at once.
//!
//! Values live in [`AtomicCell`] slots, so overwriting the value of an
//! existing key cannot tear a concurrent read; the value type must be
//! `Copy`. An overwrite that races a removal of the same key orders before
//! the removal.
//!
//! The effective bucket count always equals the construction-time hint.

use crate::hash::{hash_key, DefaultHashBuilder};
use crate::table::ConcurrentMap;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::atomic::AtomicCell;

/// Tag on a node's `next` pointer marking the node logically deleted.
const DELETED_TAG: usize = 1;

struct Node<K, V> {
    key: K,
    value: AtomicCell<V>,
    next: Atomic<Node<K, V>>,
}

pub struct HashMap<K, V, S = DefaultHashBuilder> {
    buckets: Box<[Atomic<Node<K, V>>]>,
    build_hasher: S,
    len: AtomicUsize,
}

impl<K: Hash + Eq, V: Copy> HashMap<K, V, DefaultHashBuilder> {
    /// Creates a table with `buckets` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is zero.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq, V: Copy, S: BuildHasher> HashMap<K, V, S> {
    pub fn with_buckets_and_hasher(buckets: usize, build_hasher: S) -> Self {
        assert!(buckets > 0, "bucket hint must be positive");

        let mut heads = Vec::with_capacity(buckets);
        heads.resize_with(buckets, Atomic::null);

        Self {
            buckets: heads.into_boxed_slice(),
            build_hasher,
            len: AtomicUsize::new(0),
        }
    }

    /// Stores `(key, value)`, overwriting any previous value for `key`.
    /// Returns whether `key` was previously absent.
    pub fn insert(&self, key: K, value: V) -> bool {
        let guard = &epoch::pin();
        let head = &self.buckets[self.index(&key)];
        let mut new_node = Owned::new(Node {
            key,
            value: AtomicCell::new(value),
            next: Atomic::null(),
        });

        loop {
            let snapshot = head.load(Ordering::Acquire, guard);

            // Walk the chain from this snapshot looking for a live
            // duplicate. The suffix of a chain only ever loses nodes, so
            // any duplicate present when the snapshot was taken is found.
            let mut current = snapshot;

            while let Some(node) = unsafe { current.as_ref() } {
                let next = node.next.load(Ordering::Acquire, guard);

                if next.tag() == 0 && node.key == new_node.key {
                    node.value.store(value);

                    return false;
                }

                current = next.with_tag(0);
            }

            new_node.next.store(snapshot, Ordering::Relaxed);

            match head.compare_exchange(
                snapshot,
                new_node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(_) => {
                    self.len.fetch_add(1, Ordering::Relaxed);

                    return true;
                }
                Err(error) => new_node = error.new,
            }
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = &epoch::pin();
        let mut current = self.buckets[self.index(key)].load(Ordering::Acquire, guard);

        while let Some(node) = unsafe { current.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);

            if next.tag() == 0 && node.key.borrow() == key {
                return Some(node.value.load());
            }

            current = next.with_tag(0);
        }

        None
    }

    /// Removes the entry for `key`; returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let guard = &epoch::pin();
        let head = &self.buckets[self.index(key)];

        'retry: loop {
            let mut prev_link = head;
            let mut current = prev_link.load(Ordering::Acquire, guard);

            while let Some(node) = unsafe { current.as_ref() } {
                let next = node.next.load(Ordering::Acquire, guard);

                if next.tag() != 0 {
                    // Dead node in the way; unlink it before going on. A
                    // failed unlink means the predecessor changed under us,
                    // so the walk restarts.
                    match prev_link.compare_exchange(
                        current,
                        next.with_tag(0),
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    ) {
                        Ok(_) => {
                            unsafe { guard.defer_destroy(current) };
                            current = next.with_tag(0);
                        }
                        Err(_) => continue 'retry,
                    }

                    continue;
                }

                if node.key.borrow() == key {
                    // Logical delete; this is the linearization point.
                    if node
                        .next
                        .compare_exchange(
                            next,
                            next.with_tag(DELETED_TAG),
                            Ordering::Release,
                            Ordering::Relaxed,
                            guard,
                        )
                        .is_err()
                    {
                        continue 'retry;
                    }

                    self.len.fetch_sub(1, Ordering::Relaxed);

                    // Best-effort physical unlink; if it races, a later
                    // walk finishes the job.
                    if prev_link
                        .compare_exchange(
                            current,
                            next,
                            Ordering::Release,
                            Ordering::Relaxed,
                            guard,
                        )
                        .is_ok()
                    {
                        unsafe { guard.defer_destroy(current) };
                    }

                    return true;
                }

                prev_link = &node.next;
                current = next;
            }

            return false;
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn index<Q>(&self, key: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (hash_key(&self.build_hasher, key) % self.buckets.len() as u64) as usize
    }
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        // &mut self: no other thread can hold a reference, so the chains
        // can be torn down without pinning.
        let guard = unsafe { epoch::unprotected() };

        for head in self.buckets.iter() {
            let mut current = head.load(Ordering::Relaxed, guard);

            while !current.is_null() {
                let next = unsafe { current.deref() }
                    .next
                    .load(Ordering::Relaxed, guard);

                drop(unsafe { current.into_owned() });
                current = next.with_tag(0);
            }
        }
    }
}

impl<K, V, S> ConcurrentMap<K, V> for HashMap<K, V, S>
where
    K: Hash + Eq + Send + Sync,
    V: Copy + Send + Sync,
    S: BuildHasher + Default + Send + Sync,
{
    const NAME: &'static str = "Lock-Free";

    fn with_buckets_for_threads(buckets: usize, _threads: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, S::default())
    }

    fn insert(&self, key: K, value: V) -> bool {
        HashMap::insert(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        HashMap::get(self, key)
    }

    fn remove(&self, key: &K) -> bool {
        HashMap::remove(self, key)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn bucket_count(&self) -> usize {
        HashMap::bucket_count(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn single_bucket_chain_operations() {
        // One bucket forces every key into the same chain, exercising
        // head, mid-chain, and tail positions.
        let map = HashMap::with_buckets(1);

        for key in 0..100u64 {
            assert!(map.insert(key, key));
        }

        assert_eq!(map.len(), 100);

        for key in (0..100u64).step_by(2) {
            assert!(map.remove(&key));
        }

        assert_eq!(map.len(), 50);

        for key in 0..100u64 {
            if key % 2 == 0 {
                assert_eq!(map.get(&key), None);
                assert!(!map.remove(&key));
            } else {
                assert_eq!(map.get(&key), Some(key));
            }
        }
    }

    #[test]
    fn overwrite_returns_false_and_is_visible() {
        let map = HashMap::with_buckets(16);

        assert!(map.insert(7, 1));
        assert!(!map.insert(7, 2));
        assert_eq!(map.get(&7), Some(2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn parallel_inserts_then_removing_half() {
        const THREADS: usize = 4;
        const PER_THREAD: u64 = 1000;

        let map = HashMap::with_buckets(1024);
        let barrier = Barrier::new(THREADS);

        thread::scope(|s| {
            for t in 0..THREADS as u64 {
                let map = &map;
                let barrier = &barrier;

                s.spawn(move || {
                    barrier.wait();

                    for i in 0..PER_THREAD {
                        let key = t * PER_THREAD + i;
                        assert!(map.insert(key, key));
                    }
                });
            }
        });

        assert_eq!(map.len(), THREADS * PER_THREAD as usize);

        let total = THREADS as u64 * PER_THREAD;
        let mut removed = 0;

        for key in 0..total / 2 {
            assert!(map.remove(&key));
            removed += 1;
        }

        assert_eq!(map.len(), (total - removed) as usize);
    }

    #[test]
    fn concurrent_removes_and_traversals_share_a_bucket() {
        // Readers, writers, and removers all hammer one chain. Safe here
        // because retired nodes are epoch-reclaimed, never freed in place.
        const KEYS: u64 = 128;

        let map = HashMap::with_buckets(1);

        for key in 0..KEYS {
            map.insert(key, key);
        }

        let barrier = Barrier::new(4);

        thread::scope(|s| {
            let map = &map;
            let barrier = &barrier;

            s.spawn(move || {
                barrier.wait();

                for key in (0..KEYS).step_by(2) {
                    assert!(map.remove(&key));
                }
            });

            s.spawn(move || {
                barrier.wait();

                for _ in 0..64 {
                    for key in 0..KEYS {
                        if let Some(value) = map.get(&key) {
                            assert!(value >= key && value < key + 64);
                        }
                    }
                }
            });

            s.spawn(move || {
                barrier.wait();

                for round in 1..64 {
                    for key in (1..KEYS).step_by(2) {
                        map.insert(key, key + round);
                    }
                }
            });

            s.spawn(move || {
                barrier.wait();

                for _ in 0..64 {
                    let len = map.len();
                    assert!(len <= KEYS as usize);
                }
            });
        });

        for key in (0..KEYS).step_by(2) {
            assert_eq!(map.get(&key), None);
        }

        for key in (1..KEYS).step_by(2) {
            assert!(map.get(&key).is_some());
        }

        assert_eq!(map.len(), KEYS as usize / 2);
    }

    #[test]
    fn dueling_removers_agree_on_a_winner() {
        const KEYS: u64 = 512;

        let map = HashMap::with_buckets(8);

        for key in 0..KEYS {
            map.insert(key, key);
        }

        let barrier = Barrier::new(2);
        let mut wins = [0usize; 2];

        thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let map = &map;
                    let barrier = &barrier;

                    s.spawn(move || {
                        barrier.wait();

                        let mut won = 0;

                        for key in 0..KEYS {
                            if map.remove(&key) {
                                won += 1;
                            }
                        }

                        won
                    })
                })
                .collect();

            for (i, handle) in handles.into_iter().enumerate() {
                wins[i] = handle.join().unwrap();
            }
        });

        // Every key was removed exactly once between the two threads.
        assert_eq!(wins[0] + wins[1], KEYS as usize);
        assert_eq!(map.len(), 0);

        for key in 0..KEYS {
            assert_eq!(map.get(&key), None);
        }
    }
}
