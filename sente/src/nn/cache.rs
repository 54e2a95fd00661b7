//! Fixed-size cache of evaluated positions, keyed by the 128-bit input
//! hash. Power-of-two entry count, sharded under a power-of-two lock pool;
//! each slot holds a short probe chain and evicts its oldest entry when
//! full, which approximates LRU closely enough for a search workload.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

use goban::core::hash::Hash128;
use rayon::prelude::*;

use crate::nn::output::NnOutput;

const CHAIN_LEN: usize = 2;

type Slot = [Option<(Hash128, Arc<NnOutput>)>; CHAIN_LEN];

struct Shard {
    slots: Vec<Slot>,
}

pub struct NnCache {
    shards: Vec<Mutex<Shard>>,
    shard_mask: u64,
    slot_mask: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NnCache {
    /// `size_pow_of_two` total entries spread over `mutex_pool_pow_of_two`
    /// independently locked shards.
    pub fn new(size_pow_of_two: u32, mutex_pool_pow_of_two: u32) -> Self {
        let mutex_pool_pow_of_two = mutex_pool_pow_of_two.min(size_pow_of_two);
        let num_shards = 1usize << mutex_pool_pow_of_two;
        let slots_per_shard = (1usize << size_pow_of_two) / num_shards / CHAIN_LEN;
        let slots_per_shard = slots_per_shard.max(1);
        let shards = (0..num_shards)
            .map(|_| Mutex::new(Shard { slots: vec![Slot::default(); slots_per_shard] }))
            .collect();
        NnCache {
            shards,
            shard_mask: (num_shards - 1) as u64,
            slot_mask: (slots_per_shard - 1) as u64,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn place(&self, hash: Hash128) -> (usize, usize) {
        let shard = (hash.hash0 & self.shard_mask) as usize;
        let slot = ((hash.hash0 >> 32) & self.slot_mask) as usize;
        (shard, slot)
    }

    pub fn get(&self, hash: Hash128) -> Option<Arc<NnOutput>> {
        let (shard_idx, slot_idx) = self.place(hash);
        let shard = self.shards[shard_idx].lock().unwrap();
        for entry in shard.slots[slot_idx].iter().flatten() {
            if entry.0 == hash {
                self.hits.fetch_add(1, Relaxed);
                return Some(entry.1.clone());
            }
        }
        self.misses.fetch_add(1, Relaxed);
        None
    }

    pub fn put(&self, hash: Hash128, output: Arc<NnOutput>) {
        let (shard_idx, slot_idx) = self.place(hash);
        let mut shard = self.shards[shard_idx].lock().unwrap();
        let chain = &mut shard.slots[slot_idx];
        // refresh an existing entry in place
        for entry in chain.iter_mut().flatten() {
            if entry.0 == hash {
                entry.1 = output;
                return;
            }
        }
        // shift towards the back, newest first; the last one falls out
        chain.rotate_right(1);
        chain[0] = Some((hash, output));
    }

    /// Wipes every shard. Safe concurrently with readers, which simply see
    /// either the old or the new (empty) slot.
    pub fn clear(&self) {
        self.shards.par_iter().for_each(|shard| {
            let mut shard = shard.lock().unwrap();
            for slot in &mut shard.slots {
                *slot = Slot::default();
            }
        });
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_output(hash: Hash128) -> Arc<NnOutput> {
        Arc::new(NnOutput {
            nn_hash: hash,
            win_prob: 0.5,
            loss_prob: 0.5,
            no_result_prob: 0.0,
            score_mean: 0.0,
            score_stdev: 0.0,
            lead: 0.0,
            policy: vec![],
            ownership: None,
            x_size: 15,
            y_size: 15,
        })
    }

    #[test]
    fn get_after_put_hits() {
        let cache = NnCache::new(10, 3);
        let hash = Hash128::new(123, 456);
        assert!(cache.get(hash).is_none());
        assert_eq!(cache.misses(), 1);
        cache.put(hash, dummy_output(hash));
        let out = cache.get(hash).unwrap();
        assert_eq!(out.nn_hash, hash);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let cache = NnCache::new(8, 2);
        for i in 0..100u64 {
            let hash = Hash128::new(i.wrapping_mul(0x9e37_79b9_7f4a_7c15), i);
            cache.put(hash, dummy_output(hash));
        }
        cache.clear();
        for i in 0..100u64 {
            let hash = Hash128::new(i.wrapping_mul(0x9e37_79b9_7f4a_7c15), i);
            assert!(cache.get(hash).is_none());
        }
    }

    #[test]
    fn eviction_keeps_the_newest() {
        let cache = NnCache::new(2, 0);
        // tiny cache: 4 entries in 2 chains of 2; slam one slot repeatedly
        let mk = |i: u64| Hash128::new(i << 33, i);
        for i in 0..10 {
            cache.put(mk(i), dummy_output(mk(i)));
        }
        // the most recent insert into its slot must be present
        assert!(cache.get(mk(9)).is_some());
    }
}
