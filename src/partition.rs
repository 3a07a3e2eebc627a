//! Stable key partitioning for parallel reduction.
//!
//! The partition is derived from a SHA-256 digest of the encoded key rather
//! than the std hasher, whose output may change between Rust releases. Every
//! process that shards the same data agrees on which partition owns a key.

use sha2::{Digest, Sha256};

use crate::model::GroupKey;

/// The partition in `0..count` that owns `key`.
///
/// # Panics
///
/// Panics if `count` is zero.
pub fn partition_of(key: &GroupKey, count: usize) -> usize {
    assert!(count > 0, "partition count must be positive");

    let digest = Sha256::digest(key.encode().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bucket = u64::from_be_bytes(prefix) % count as u64;

    // `bucket < count`, so it always fits back into a usize.
    usize::try_from(bucket).unwrap_or_default()
}

/// File name for partition `index`, e.g. `part-00003`.
pub fn partition_file_name(index: usize) -> String {
    format!("part-{index:05}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_partition() {
        let key = GroupKey::new("Ferry1", "Mono");
        assert_eq!(partition_of(&key, 8), partition_of(&key.clone(), 8));
    }

    #[test]
    fn partition_is_in_range() {
        for i in 0..100 {
            let key = GroupKey::new(format!("Vessel{i}"), "Mono");
            assert!(partition_of(&key, 7) < 7);
        }
    }

    #[test]
    fn single_partition_owns_everything() {
        assert_eq!(partition_of(&GroupKey::new("x", "y"), 1), 0);
    }

    #[test]
    fn keys_spread_across_partitions() {
        let used: std::collections::HashSet<usize> = (0..64)
            .map(|i| partition_of(&GroupKey::new(format!("Vessel{i}"), "Mono"), 4))
            .collect();
        assert_eq!(used.len(), 4);
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(partition_file_name(3), "part-00003");
    }
}
