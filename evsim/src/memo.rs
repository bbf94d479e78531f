use std::collections::HashMap;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a, used to fold canonical state fields into a memo key and to
/// pick the memo bucket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fnv1a(u64);

impl Fnv1a {
    pub(crate) fn new() -> Fnv1a {
        Fnv1a(FNV_OFFSET_BASIS)
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= *byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.write(&[value]);
    }

    pub(crate) fn write_u16(&mut self, value: u16) {
        self.write(&value.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub(crate) fn write_u128(&mut self, value: u128) {
        self.write(&value.to_le_bytes());
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}

/// Search resource knobs, passed explicitly into every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Global memo entry ceiling; reaching it clears the whole table.
    pub memo_capacity: usize,
    /// Number of memo buckets, rounded up to a power of two.
    pub bucket_count: usize,
    /// Ceiling for the cached dealer distributions used by settlement.
    pub dealer_cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            memo_capacity: 8_000_000,
            bucket_count: 4096,
            dealer_cache_capacity: 50_000,
        }
    }
}

/// Memo table for the player decision search, sharded into hash
/// buckets to bound per-bucket map size. Overflow is handled by
/// clearing the entire table; correctness is unaffected, only speed.
#[derive(Debug)]
pub struct EvMemo {
    buckets: Vec<HashMap<u64, f64>>,
    mask: usize,
    capacity: usize,
    entries: usize,
}

impl EvMemo {
    pub fn new(config: &SearchConfig) -> EvMemo {
        let bucket_count = config.bucket_count.max(1).next_power_of_two();
        let mut buckets = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            buckets.push(HashMap::new());
        }
        EvMemo {
            buckets,
            mask: bucket_count - 1,
            capacity: config.memo_capacity.max(1),
            entries: 0,
        }
    }

    pub fn get(&self, key: u64) -> Option<f64> {
        self.buckets[(key as usize) & self.mask].get(&key).copied()
    }

    pub fn insert(&mut self, key: u64, value: f64) {
        if self.entries >= self.capacity {
            tracing::debug!(entries = self.entries, "memo ceiling reached, clearing");
            self.clear();
        }
        if self.buckets[(key as usize) & self.mask]
            .insert(key, value)
            .is_none()
        {
            self.entries += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.entries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_across_buckets() {
        let mut memo = EvMemo::new(&SearchConfig::default());
        for key in 0..10_000u64 {
            memo.insert(key, key as f64);
        }
        assert_eq!(memo.len(), 10_000);
        assert_eq!(memo.get(137), Some(137.0));
        assert_eq!(memo.get(20_000), None);
    }

    #[test]
    fn reinserting_a_key_does_not_grow_the_table() {
        let mut memo = EvMemo::new(&SearchConfig::default());
        memo.insert(42, 1.0);
        memo.insert(42, 2.0);
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.get(42), Some(2.0));
    }

    #[test]
    fn overflow_clears_everything_and_keeps_working() {
        let config = SearchConfig {
            memo_capacity: 8,
            bucket_count: 2,
            ..Default::default()
        };
        let mut memo = EvMemo::new(&config);
        for key in 0..9u64 {
            memo.insert(key, 0.5);
        }
        // The 9th insert tripped the ceiling first, wiping the first 8.
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.get(0), None);
        assert_eq!(memo.get(8), Some(0.5));
    }

    #[test]
    fn bucket_count_rounds_up_to_a_power_of_two() {
        let config = SearchConfig {
            bucket_count: 5,
            ..Default::default()
        };
        let memo = EvMemo::new(&config);
        assert_eq!(memo.buckets.len(), 8);
    }

    #[test]
    fn fnv_is_order_sensitive() {
        let mut a = Fnv1a::new();
        a.write_u16(1);
        a.write_u16(2);
        let mut b = Fnv1a::new();
        b.write_u16(2);
        b.write_u16(1);
        assert_ne!(a.finish(), b.finish());
    }
}
