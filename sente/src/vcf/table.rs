//! Process-lifetime transposition table for the threat solver.
//!
//! Entries are two atomics wide. The key slot stores `hash0 ^ data` so a
//! torn write from a racing thread can never validate; readers recompute
//! the xor and compare against the full position key. Writers simply win
//! in arrival order, there is no locking.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use goban::board::Loc;
use goban::core::hash::Hash128;
use static_assertions::const_assert_eq;

#[derive(Debug, Default)]
#[repr(C)]
struct AtomicEntry {
    key: AtomicU64,
    data: AtomicU64,
}

const_assert_eq!(std::mem::size_of::<AtomicEntry>(), 16);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CachedResult {
    Win { loc: Loc, plies: u32 },
    Disproven,
}

const STATUS_WIN: u64 = 1;
const STATUS_DISPROVEN: u64 = 2;

fn pack(hash: Hash128, result: CachedResult) -> u64 {
    let low = match result {
        CachedResult::Win { loc, plies } => {
            STATUS_WIN | ((loc.idx() as u64) << 2) | ((plies as u64 & 0x3fff) << 18)
        }
        CachedResult::Disproven => STATUS_DISPROVEN,
    };
    // keep half of the second hash word for extra validation
    (hash.hash1 & 0xffff_ffff_0000_0000) | (low & 0xffff_ffff)
}

fn unpack(hash: Hash128, data: u64) -> Option<CachedResult> {
    if data & 0xffff_ffff_0000_0000 != hash.hash1 & 0xffff_ffff_0000_0000 {
        return None;
    }
    match data & 0b11 {
        STATUS_WIN => {
            let loc = Loc::from_idx(((data >> 2) & 0xffff) as u16);
            let plies = ((data >> 18) & 0x3fff) as u32;
            Some(CachedResult::Win { loc, plies })
        }
        STATUS_DISPROVEN => Some(CachedResult::Disproven),
        _ => None,
    }
}

pub struct VcfTable {
    entries: Box<[AtomicEntry]>,
    mask: usize,
}

impl VcfTable {
    pub fn new(size_pow_of_two: u32) -> Self {
        let len = 1usize << size_pow_of_two;
        let entries = (0..len).map(|_| AtomicEntry::default()).collect();
        Self { entries, mask: len - 1 }
    }

    fn slot(&self, hash: Hash128) -> &AtomicEntry {
        &self.entries[(hash.hash0 as usize) & self.mask]
    }

    pub fn probe(&self, hash: Hash128) -> Option<CachedResult> {
        let entry = self.slot(hash);
        let key = entry.key.load(Acquire);
        let data = entry.data.load(Relaxed);
        if key ^ data != hash.hash0 {
            return None;
        }
        unpack(hash, data)
    }

    pub fn store(&self, hash: Hash128, result: CachedResult) {
        let entry = self.slot(hash);
        let data = pack(hash, result);
        entry.data.store(data, Relaxed);
        entry.key.store(hash.hash0 ^ data, Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_probes() {
        let table = VcfTable::new(10);
        let hash = Hash128::new(0xdead_beef_1234_5678, 0x9abc_def0_8765_4321);
        assert_eq!(table.probe(hash), None);
        let result = CachedResult::Win { loc: Loc::from_idx(123), plies: 5 };
        table.store(hash, result);
        assert_eq!(table.probe(hash), Some(result));
        // different key in the same slot does not validate
        let other = Hash128::new(hash.hash0 ^ 0xffff, hash.hash1);
        assert_eq!(table.probe(other), None);
    }

    #[test]
    fn later_write_wins() {
        let table = VcfTable::new(4);
        let hash = Hash128::new(42, 43);
        table.store(hash, CachedResult::Disproven);
        table.store(hash, CachedResult::Win { loc: Loc::from_idx(7), plies: 3 });
        assert_eq!(table.probe(hash), Some(CachedResult::Win { loc: Loc::from_idx(7), plies: 3 }));
    }
}
