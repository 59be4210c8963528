use super::{CoinRecord, CoinsMap};
use crate::error::CoinsError;
use bitcoin::{BlockHash, Txid};

/// Aggregate statistics over a view's unspent outputs.
#[derive(Debug, Clone, Default)]
pub struct CoinsStats {
    /// The block the snapshot corresponds to
    pub best_block: BlockHash,
    /// Transactions with at least one unspent output
    pub transactions: u64,
    /// Unspent outputs
    pub outputs: u64,
    /// Total value of unspent outputs
    pub total_value: u64,
}

/// Anything coins can be read from and flushed into: the durable store at
/// the bottom of the stack, a cache layered over it, or [`EmptyView`].
///
/// Lookups take `&mut self` because layered implementations memoize:
/// a cache pulls missing records from its parent and keeps them.
pub trait BackingView {
    /// The record for `txid` if this view knows it, including as a
    /// pruned tombstone.
    fn get_coin(&mut self, txid: &Txid) -> Option<CoinRecord>;

    /// Whether this view knows `txid` at all.
    fn have_coin(&mut self, txid: &Txid) -> bool {
        self.get_coin(txid).is_some()
    }

    /// The block hash this view's contents correspond to. The zero hash
    /// means "unknown"; layered views fall through to their parent.
    fn get_best_block(&mut self) -> BlockHash;

    /// Merge a child cache's modified entries into this view and adopt
    /// its best block. On success the map has been drained; on failure it
    /// must be left untouched so the caller can retry.
    fn batch_write(
        &mut self,
        coins: &mut CoinsMap,
        best_block: BlockHash,
    ) -> Result<(), CoinsError>;

    /// Statistics over the whole unspent set, for views that can afford
    /// to compute them.
    fn get_stats(&mut self) -> Option<CoinsStats> {
        None
    }
}

/// The view at the bottom of a stack with no store behind it: it knows
/// nothing and accepts nothing.
#[derive(Debug, Default)]
pub struct EmptyView;

impl BackingView for EmptyView {
    fn get_coin(&mut self, _txid: &Txid) -> Option<CoinRecord> {
        None
    }

    fn get_best_block(&mut self) -> BlockHash {
        BlockHash::default()
    }

    fn batch_write(
        &mut self,
        _coins: &mut CoinsMap,
        _best_block: BlockHash,
    ) -> Result<(), CoinsError> {
        Err(CoinsError::ReadOnlyBacking)
    }
}
