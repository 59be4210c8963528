//! Estimation of dynamically allocated memory.
//!
//! The coin cache keeps an incremental count of the heap bytes its records
//! hold so that callers can decide when to flush. These helpers estimate
//! what the allocator actually hands out for a requested size, so the
//! numbers stay meaningful for eviction decisions rather than being raw
//! payload byte counts.

use bitcoin::Script;
use std::collections::HashMap;
use std::mem;

/// Bytes consumed by a heap allocation of the given size, assuming a
/// 64-bit allocator that pads to 16-byte boundaries and keeps one
/// bookkeeping word per allocation.
pub fn malloc_usage(bytes: usize) -> usize {
    if bytes == 0 {
        0
    } else {
        ((bytes + 31) >> 4) << 4
    }
}

/// Heap usage of a vector's backing buffer.
pub fn dynamic_usage_vec<T>(v: &Vec<T>) -> usize {
    malloc_usage(v.capacity() * mem::size_of::<T>())
}

/// Heap usage of a script's backing buffer.
pub fn dynamic_usage_script(script: &Script) -> usize {
    malloc_usage(script.len())
}

/// Heap usage of a hash map's table. The standard map stores its `(K, V)`
/// pairs inline with one control byte per slot and caps the load factor
/// at 7/8, so the slot count is derived from the reported capacity.
pub fn dynamic_usage_hash_map<K, V, S>(map: &HashMap<K, V, S>) -> usize {
    let slots = map.capacity() * 8 / 7;
    malloc_usage(slots * (mem::size_of::<(K, V)>() + 1))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rounds_up_to_allocator_granularity() {
        assert_eq!(malloc_usage(0), 0);
        assert_eq!(malloc_usage(1), 32);
        assert_eq!(malloc_usage(16), 32);
        assert_eq!(malloc_usage(17), 48);
        assert_eq!(malloc_usage(32), 48);
    }

    #[test]
    fn empty_collections_use_nothing() {
        let v: Vec<u64> = Vec::new();
        assert_eq!(dynamic_usage_vec(&v), 0);
        assert_eq!(dynamic_usage_script(&Script::new()), 0);
        let map: HashMap<u32, u32> = HashMap::new();
        assert_eq!(dynamic_usage_hash_map(&map), 0);
    }

    #[test]
    fn vec_usage_tracks_capacity_not_length() {
        let mut v: Vec<u64> = Vec::with_capacity(8);
        v.push(1);
        assert_eq!(dynamic_usage_vec(&v), malloc_usage(8 * 8));
    }
}
