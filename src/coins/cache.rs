use super::{BackingView, CacheEntry, Coin, CoinRecord, CoinsMap, CoinsModifier, EntryFlags};
use crate::error::CoinsError;
use crate::memusage;
use crate::primitives::TransactionExt;
use bitcoin::{BlockHash, OutPoint, Transaction, TxIn, TxOut, Txid};
use log::debug;
use std::collections::hash_map::Entry;

/// A write-back cache of coins layered over a parent [`BackingView`].
///
/// Reads fall through to the parent on a miss and are memoized. Writes
/// touch only the local map, with per-entry flags recording how each
/// entry relates to the parent, and [`flush`](CoinsViewCache::flush)
/// pushes the accumulated modifications up as a single batch. Because a
/// cache is itself a [`BackingView`], caches stack: validation typically
/// works in a short-lived layer over the long-lived one that fronts the
/// store.
pub struct CoinsViewCache<'a> {
    pub(super) base: &'a mut dyn BackingView,
    pub(super) map: CoinsMap,
    /// Block the cache contents represent. Zero until set or first
    /// pulled from the parent.
    pub(super) best_block: BlockHash,
    /// Heap bytes held by the records in `map`, maintained incrementally
    /// around every mutation.
    pub(super) cached_coins_usage: usize,
}

impl<'a> CoinsViewCache<'a> {
    pub fn new(base: &'a mut dyn BackingView) -> Self {
        Self {
            base,
            map: CoinsMap::default(),
            best_block: BlockHash::default(),
            cached_coins_usage: 0,
        }
    }

    /// Local lookup, pulling the record from the parent and memoizing it
    /// on a miss. An absent key is never inserted.
    fn fetch_coin(&mut self, txid: &Txid) -> Option<&mut CacheEntry> {
        match self.map.entry(*txid) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) => {
                let record = self.base.get_coin(txid)?;
                let mut flags = EntryFlags::empty();
                if record.is_pruned() {
                    // The parent only has a tombstone, so our copy is as
                    // good as new.
                    flags |= EntryFlags::FRESH;
                }
                self.cached_coins_usage += record.dynamic_usage();
                Some(entry.insert(CacheEntry::new(record, flags)))
            }
        }
    }

    /// The full record for `txid`, borrowed from the cache.
    pub fn access_coins(&mut self, txid: &Txid) -> Option<&CoinRecord> {
        match self.fetch_coin(txid) {
            Some(entry) => Some(&entry.record),
            None => None,
        }
    }

    /// The coin at `outpoint`, or the empty coin if the record or the
    /// specific index is missing. An index miss never inserts anything;
    /// only the txid lookup may.
    pub fn access_coin(&mut self, outpoint: &OutPoint) -> Coin {
        let n = outpoint.vout as usize;
        match self.fetch_coin(&outpoint.txid) {
            Some(entry) => match entry.record.outputs.get(n) {
                Some(Some(out)) => {
                    Coin::new(out.clone(), entry.record.height, entry.record.is_coinbase)
                }
                _ => Coin::default(),
            },
            None => Coin::default(),
        }
    }

    /// Whether the exact output `outpoint` is unspent.
    pub fn have_coin_at(&mut self, outpoint: &OutPoint) -> bool {
        self.fetch_coin(&outpoint.txid)
            .map_or(false, |entry| entry.record.is_available(outpoint.vout))
    }

    /// Add an unspent coin at `outpoint`.
    ///
    /// Unless `possible_overwrite` is set, adding over a live output is a
    /// logic error and panics. Callers pass `possible_overwrite = true`
    /// for coinbase outputs to absorb the historical duplicate coinbase
    /// transactions that predate enforced txid uniqueness.
    ///
    /// Provably unspendable outputs are silently dropped; they can never
    /// be spent, so caching them only wastes memory.
    pub fn add_coin(&mut self, outpoint: OutPoint, coin: Coin, possible_overwrite: bool) {
        let out = match coin.out {
            Some(out) => out,
            None => panic!("cannot add a spent coin at {}", outpoint),
        };
        if out.script_pubkey.is_provably_unspendable() {
            return;
        }
        let entry = self.map.entry(outpoint.txid).or_default();
        let mut fresh = false;
        if !possible_overwrite {
            if entry.record.is_available(outpoint.vout) {
                panic!("adding a coin that replaces a live output at {}", outpoint);
            }
            // If all we hold is a pruned state the parent has not seen
            // yet, the parent cannot have this output live either, so the
            // insertion is fresh.
            fresh = entry.record.is_pruned() && !entry.flags.contains(EntryFlags::DIRTY);
        }
        self.cached_coins_usage -= entry.record.dynamic_usage();
        let n = outpoint.vout as usize;
        if entry.record.outputs.len() <= n {
            entry.record.outputs.resize(n + 1, None);
        }
        entry.record.outputs[n] = Some(out);
        entry.record.height = coin.height;
        entry.record.is_coinbase = coin.is_coinbase;
        entry.flags |= EntryFlags::DIRTY;
        if fresh {
            entry.flags |= EntryFlags::FRESH;
        }
        self.cached_coins_usage += entry.record.dynamic_usage();
    }

    /// Spend the output at `outpoint`, returning the coin it held.
    ///
    /// Spending something that does not exist is a no-op returning
    /// `None`: callers drive spends from transaction inputs and must
    /// tolerate entries that a reorganization already removed.
    pub fn spend_coin(&mut self, outpoint: &OutPoint) -> Option<Coin> {
        self.fetch_coin(&outpoint.txid)?;
        let entry = self.map.get_mut(&outpoint.txid).expect("entry fetched above");
        self.cached_coins_usage -= entry.record.dynamic_usage();
        let height = entry.record.height;
        let is_coinbase = entry.record.is_coinbase;
        let spent = entry
            .record
            .spend(outpoint.vout)
            .map(|out| Coin::new(out, height, is_coinbase));
        // A pruned entry the parent never knew about carries no
        // information; anything else stays as a pending modification.
        let erase = entry.record.is_pruned() && entry.flags.contains(EntryFlags::FRESH);
        if !erase {
            entry.flags |= EntryFlags::DIRTY;
            self.cached_coins_usage += entry.record.dynamic_usage();
        }
        if erase {
            self.map.remove(&outpoint.txid);
        }
        spent
    }

    /// Scoped mutable access to the record for `txid`, creating an empty
    /// one if neither this layer nor the parent knows it. The entry is
    /// marked modified up front; trimming, pruning and the memory
    /// bookkeeping happen when the modifier is dropped.
    pub fn modify_coins(&mut self, txid: &Txid) -> CoinsModifier<'_, 'a> {
        if self.fetch_coin(txid).is_none() {
            let entry = self.map.entry(*txid).or_default();
            // The parent has nothing, so a record that prunes under the
            // modifier can be dropped without telling it.
            if !entry.flags.contains(EntryFlags::DIRTY) {
                entry.flags |= EntryFlags::FRESH;
            }
        }
        let entry = self.map.get_mut(txid).expect("entry just ensured");
        entry.flags |= EntryFlags::DIRTY;
        let prev_usage = entry.record.dynamic_usage();
        CoinsModifier::new(self, *txid, prev_usage)
    }

    /// Declare the block the cache contents now represent.
    pub fn set_best_block(&mut self, hash: BlockHash) {
        self.best_block = hash;
    }

    /// Push every pending modification into the parent as one batch and
    /// start over empty. On failure nothing changes on either side, so
    /// the flush can be retried.
    pub fn flush(&mut self) -> Result<(), CoinsError> {
        debug!(
            "flushing {} cache entries ({} bytes of coin data)",
            self.map.len(),
            self.cached_coins_usage
        );
        self.base.batch_write(&mut self.map, self.best_block)?;
        self.map.clear();
        self.cached_coins_usage = 0;
        Ok(())
    }

    /// A cached entry, if this layer already holds one. Never consults
    /// the parent.
    pub fn entry(&self, txid: &Txid) -> Option<&CacheEntry> {
        self.map.get(txid)
    }

    /// Number of entries currently cached.
    pub fn cache_size(&self) -> usize {
        self.map.len()
    }

    /// Total heap bytes attributable to the cache: the records plus the
    /// table holding them.
    pub fn dynamic_memory_usage(&self) -> usize {
        memusage::dynamic_usage_hash_map(&self.map) + self.cached_coins_usage
    }

    /// The output a transaction input spends. The coin must be available;
    /// callers gate on [`have_inputs`](CoinsViewCache::have_inputs).
    pub fn output_for(&mut self, input: &TxIn) -> TxOut {
        let record = self
            .access_coins(&input.previous_output.txid)
            .expect("input spends a missing coin record");
        match record.outputs.get(input.previous_output.vout as usize) {
            Some(Some(out)) => out.clone(),
            _ => panic!("input spends an output that is not available"),
        }
    }

    /// Total value of the coins `tx` spends. Zero for a coinbase, which
    /// creates value instead of moving it.
    pub fn get_value_in(&mut self, tx: &Transaction) -> u64 {
        if tx.is_coin_base() {
            return 0;
        }
        let mut total = 0;
        for input in &tx.input {
            total += self.output_for(input).value;
        }
        total
    }

    /// Whether every input of `tx` refers to an unspent coin.
    pub fn have_inputs(&mut self, tx: &Transaction) -> bool {
        if tx.is_coin_base() {
            return true;
        }
        for input in &tx.input {
            if !self.have_coin_at(&input.previous_output) {
                return false;
            }
        }
        true
    }

    /// Coin-age priority of `tx` at `height`, along with the total value
    /// of its inputs that are already in the chain. Inputs that are spent
    /// or were created at `height` or later contribute nothing.
    pub fn get_priority(&mut self, tx: &Transaction, height: u32) -> (f64, u64) {
        if tx.is_coin_base() {
            return (0.0, 0);
        }
        let mut age_sum = 0.0;
        let mut in_chain_input_value = 0;
        for input in &tx.input {
            let record = self
                .access_coins(&input.previous_output.txid)
                .expect("priority of a transaction with missing inputs");
            let out = match record.outputs.get(input.previous_output.vout as usize) {
                Some(Some(out)) => out,
                _ => continue,
            };
            if record.height < height {
                age_sum += out.value as f64 * (height - record.height) as f64;
                in_chain_input_value += out.value;
            }
        }
        (tx.compute_priority(age_sum), in_chain_input_value)
    }
}

impl<'a> BackingView for CoinsViewCache<'a> {
    fn get_coin(&mut self, txid: &Txid) -> Option<CoinRecord> {
        self.fetch_coin(txid).map(|entry| entry.record.clone())
    }

    fn have_coin(&mut self, txid: &Txid) -> bool {
        // Testing the vector instead of is_pruned: trailing slots are
        // trimmed on every spend, so a non-empty vector always ends in a
        // live output, and a record wiped by a reorg shows up as empty.
        self.fetch_coin(txid)
            .map_or(false, |entry| !entry.record.outputs.is_empty())
    }

    fn get_best_block(&mut self) -> BlockHash {
        if self.best_block == BlockHash::default() {
            self.best_block = self.base.get_best_block();
        }
        self.best_block
    }

    fn batch_write(
        &mut self,
        coins: &mut CoinsMap,
        best_block: BlockHash,
    ) -> Result<(), CoinsError> {
        for (txid, child) in coins.drain() {
            // Entries the child never modified carry nothing for us.
            if !child.flags.contains(EntryFlags::DIRTY) {
                continue;
            }
            match self.map.entry(txid) {
                Entry::Vacant(entry) => {
                    if !child.record.is_pruned() {
                        // We have no entry while the child has a live
                        // one. Had the grandparent known this key, the
                        // child would have pulled it through us on its
                        // first fetch.
                        assert!(
                            child.flags.contains(EntryFlags::FRESH),
                            "non-fresh child entry written into an absent parent slot"
                        );
                        self.cached_coins_usage += child.record.dynamic_usage();
                        entry.insert(CacheEntry::new(
                            child.record,
                            EntryFlags::DIRTY | EntryFlags::FRESH,
                        ));
                    }
                    // A pruned entry for a key we never knew carries no
                    // information; the tombstone stops here.
                }
                Entry::Occupied(mut entry) => {
                    if entry.get().flags.contains(EntryFlags::FRESH) && child.record.is_pruned() {
                        // The grandparent has no version either, so the
                        // prune deletes the key outright.
                        self.cached_coins_usage -= entry.get().record.dynamic_usage();
                        entry.remove();
                    } else {
                        let ours = entry.into_mut();
                        self.cached_coins_usage -= ours.record.dynamic_usage();
                        ours.record = child.record;
                        // Our relationship to our own parent is unchanged
                        // by the child's update, so FRESH is preserved.
                        ours.flags |= EntryFlags::DIRTY;
                        self.cached_coins_usage += ours.record.dynamic_usage();
                    }
                }
            }
        }
        self.best_block = best_block;
        Ok(())
    }
}

/// Add every output of `tx` to the cache. The coinbase flag doubles as
/// `possible_overwrite`, tolerating the historical duplicate coinbase
/// txids.
pub fn add_coins_from_tx(cache: &mut CoinsViewCache, tx: &Transaction, height: u32) {
    let is_coinbase = tx.is_coin_base();
    let txid = tx.txid();
    for (i, out) in tx.output.iter().enumerate() {
        cache.add_coin(
            OutPoint::new(txid, i as u32),
            Coin::new(out.clone(), height, is_coinbase),
            is_coinbase,
        );
    }
}

/// Any unspent output of `txid`, preferring the lowest index, or the
/// empty coin. Useful for callers that hold only a txid and need any
/// surviving output, such as script retrieval during block-template
/// assembly.
///
/// `max_outputs` bounds the index scan; callers usually pass
/// [`MAX_OUTPUTS_PER_BLOCK`](crate::protocol::MAX_OUTPUTS_PER_BLOCK).
pub fn access_by_txid(cache: &mut CoinsViewCache, txid: &Txid, max_outputs: u32) -> Coin {
    for n in 0..max_outputs {
        let coin = cache.access_coin(&OutPoint::new(*txid, n));
        if !coin.is_spent() {
            return coin;
        }
    }
    Coin::default()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coins::EmptyView;
    use bitcoin::hashes::Hash;
    use bitcoin::Script;

    fn outpoint(n: u8, vout: u32) -> OutPoint {
        OutPoint::new(Txid::hash(&[n]), vout)
    }

    fn coin(value: u64, height: u32) -> Coin {
        Coin::new(
            TxOut {
                value,
                script_pubkey: Script::new(),
            },
            height,
            false,
        )
    }

    #[test]
    fn added_entries_over_an_empty_parent_are_fresh() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        cache.add_coin(outpoint(1, 0), coin(50, 10), false);

        let entry = cache.entry(&Txid::hash(&[1])).unwrap();
        assert!(entry.flags.contains(EntryFlags::DIRTY));
        assert!(entry.flags.contains(EntryFlags::FRESH));
    }

    #[test]
    #[should_panic(expected = "replaces a live output")]
    fn overwrite_guard_panics() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        cache.add_coin(outpoint(1, 0), coin(50, 10), false);
        cache.add_coin(outpoint(1, 0), coin(99, 11), false);
    }

    #[test]
    fn spend_of_missing_coin_is_a_no_op() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        assert!(cache.spend_coin(&outpoint(1, 0)).is_none());
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn usage_matches_a_recomputation() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        for i in 0..8u8 {
            let out = TxOut {
                value: i as u64 * 100,
                script_pubkey: Script::from(vec![0x51; 10 + i as usize * 7]),
            };
            cache.add_coin(outpoint(i, i as u32 % 3), Coin::new(out, 1, false), false);
        }
        cache.spend_coin(&outpoint(3, 0));
        cache.spend_coin(&outpoint(4, 1));

        let recomputed: usize = cache.map.values().map(|e| e.record.dynamic_usage()).sum();
        assert_eq!(cache.cached_coins_usage, recomputed);
        assert_eq!(
            cache.dynamic_memory_usage(),
            recomputed + memusage::dynamic_usage_hash_map(&cache.map)
        );
    }

    #[test]
    fn flushing_into_an_empty_view_fails() {
        let mut base = EmptyView;
        let mut cache = CoinsViewCache::new(&mut base);
        cache.add_coin(outpoint(1, 0), coin(50, 10), false);
        assert!(matches!(cache.flush(), Err(CoinsError::ReadOnlyBacking)));
        // nothing was lost
        assert_eq!(cache.access_coin(&outpoint(1, 0)).value(), 50);
    }
}
