use super::{CoinRecord, CoinsViewCache, EntryFlags};
use bitcoin::Txid;
use std::ops::{Deref, DerefMut};

/// Scoped mutable access to one record in a [`CoinsViewCache`], handed
/// out by [`modify_coins`](CoinsViewCache::modify_coins).
///
/// The modifier borrows the cache mutably, so there is exactly one
/// in-flight mutation per cache and nothing can flush underneath it.
/// When it goes out of scope the record is trimmed back to canonical
/// form, an entry that pruned while still unknown to the parent is
/// discarded, and the cache's memory accounting is refreshed.
pub struct CoinsModifier<'c, 'a> {
    cache: &'c mut CoinsViewCache<'a>,
    txid: Txid,
    /// Usage the entry contributed when the modifier was taken.
    prev_usage: usize,
}

impl<'c, 'a> CoinsModifier<'c, 'a> {
    pub(super) fn new(cache: &'c mut CoinsViewCache<'a>, txid: Txid, prev_usage: usize) -> Self {
        Self {
            cache,
            txid,
            prev_usage,
        }
    }
}

impl Deref for CoinsModifier<'_, '_> {
    type Target = CoinRecord;

    fn deref(&self) -> &CoinRecord {
        &self.cache.map[&self.txid].record
    }
}

impl DerefMut for CoinsModifier<'_, '_> {
    fn deref_mut(&mut self) -> &mut CoinRecord {
        &mut self
            .cache
            .map
            .get_mut(&self.txid)
            .expect("modified entry vanished from the cache")
            .record
    }
}

impl Drop for CoinsModifier<'_, '_> {
    fn drop(&mut self) {
        let entry = self
            .cache
            .map
            .get_mut(&self.txid)
            .expect("modified entry vanished from the cache");
        entry.record.cleanup();
        let new_usage = entry.record.dynamic_usage();
        let erase = entry.flags.contains(EntryFlags::FRESH) && entry.record.is_pruned();
        if erase {
            self.cache.map.remove(&self.txid);
            self.cache.cached_coins_usage -= self.prev_usage;
        } else {
            self.cache.cached_coins_usage =
                self.cache.cached_coins_usage - self.prev_usage + new_usage;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coins::{CoinsViewCache, EmptyView};
    use bitcoin::hashes::Hash;
    use bitcoin::{OutPoint, Script, TxOut};

    fn out(value: u64) -> Option<TxOut> {
        Some(TxOut {
            value,
            script_pubkey: Script::new(),
        })
    }

    #[test]
    fn released_records_are_trimmed() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        let txid = Txid::hash(&[1]);
        {
            let mut coins = cache.modify_coins(&txid);
            coins.outputs = vec![out(5), None, None];
            coins.height = 3;
        }
        let entry = cache.entry(&txid).unwrap();
        assert_eq!(entry.record.outputs.len(), 1);
        assert!(entry.flags.contains(EntryFlags::DIRTY));
        assert!(entry.flags.contains(EntryFlags::FRESH));
        assert_eq!(cache.access_coin(&OutPoint::new(txid, 0)).value(), 5);
    }

    #[test]
    fn records_unknown_to_the_parent_are_dropped_when_pruned() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        let txid = Txid::hash(&[2]);
        {
            let mut coins = cache.modify_coins(&txid);
            coins.outputs = vec![out(5)];
        }
        {
            let mut coins = cache.modify_coins(&txid);
            coins.spend(0);
        }
        assert!(cache.entry(&txid).is_none());
        assert_eq!(cache.cache_size(), 0);
        assert_eq!(cache.cached_coins_usage, 0);
    }

    #[test]
    fn modifying_nothing_leaves_no_entry() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        let txid = Txid::hash(&[3]);
        cache.modify_coins(&txid);
        assert!(cache.entry(&txid).is_none());
        assert_eq!(cache.cached_coins_usage, 0);
    }
}
