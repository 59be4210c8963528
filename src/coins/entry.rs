use super::CoinRecord;
use bitcoin::Txid;
use bitflags::bitflags;
use once_cell::sync::Lazy;
use siphasher::sip::SipHasher;
use std::collections::HashMap;
use std::hash::BuildHasher;

bitflags! {
    /// How a cache entry relates to the next layer up.
    pub struct EntryFlags: u8 {
        /// The entry differs from what the parent view holds and must be
        /// pushed up on flush.
        const DIRTY = 0b01;
        /// The parent has no live version of this entry, not even a
        /// pruned one, so an entry that prunes here can simply be
        /// forgotten instead of propagated.
        const FRESH = 0b10;
    }
}

impl Default for EntryFlags {
    fn default() -> Self {
        EntryFlags::empty()
    }
}

/// A cache slot holding one transaction's outputs.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub record: CoinRecord,
    pub flags: EntryFlags,
}

impl CacheEntry {
    pub fn new(record: CoinRecord, flags: EntryFlags) -> Self {
        Self { record, flags }
    }
}

/// One salt for the whole process, drawn at first use.
static TXID_SALT: Lazy<(u64, u64)> = Lazy::new(|| {
    use rand::prelude::*;
    let mut rng = rand::thread_rng();
    (rng.gen(), rng.gen())
});

/// Keyed hasher for txid-keyed maps.
///
/// Txids are already uniformly distributed, but hashing them through
/// SipHash under an unpredictable salt stops anyone who can get
/// transactions into the map from grinding collisions in the 64-bit
/// projection.
#[derive(Debug, Clone)]
pub struct SaltedTxidHasher {
    k0: u64,
    k1: u64,
}

impl Default for SaltedTxidHasher {
    fn default() -> Self {
        let (k0, k1) = *TXID_SALT;
        Self { k0, k1 }
    }
}

impl BuildHasher for SaltedTxidHasher {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> SipHasher {
        SipHasher::new_with_keys(self.k0, self.k1)
    }
}

/// The map underlying every cache layer.
pub type CoinsMap = HashMap<Txid, CacheEntry, SaltedTxidHasher>;

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::hashes::Hash;
    use std::hash::Hasher;

    #[test]
    fn salt_is_stable_within_the_process() {
        let txid = Txid::hash(&[7]);
        let mut a = SaltedTxidHasher::default().build_hasher();
        let mut b = SaltedTxidHasher::default().build_hasher();
        std::hash::Hash::hash(&txid, &mut a);
        std::hash::Hash::hash(&txid, &mut b);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn map_round_trips_entries() {
        let mut map = CoinsMap::default();
        let txid = Txid::hash(&[1]);
        map.insert(txid, CacheEntry::default());
        assert!(map.contains_key(&txid));
        assert!(!map.contains_key(&Txid::hash(&[2])));
    }
}
