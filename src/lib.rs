//! Layered write-back cache for a Bitcoin-style UTXO set
//!
//! A [`CoinsViewCache`] sits between validation code and whatever durable
//! store holds the unspent set, answering lookups out of memory and
//! accumulating modifications until they are flushed up in a single
//! batch. Caches implement the same [`BackingView`] capability as the
//! store, so layers stack arbitrarily deep.

/// The coin cache and its backing-view abstraction
pub mod coins;
/// Custom errors
pub mod error;
/// Estimation of dynamically allocated memory
pub mod memusage;
/// Extensions to rust-bitcoin primitives
pub mod primitives;
/// Consensus-derived constants
pub mod protocol;

pub use coins::{
    access_by_txid, add_coins_from_tx, BackingView, CacheEntry, Coin, CoinRecord, CoinsMap,
    CoinsModifier, CoinsStats, CoinsViewCache, EmptyView, EntryFlags, SaltedTxidHasher,
};
pub use error::CoinsError;
pub use primitives::TransactionExt;
