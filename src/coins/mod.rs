mod cache;
mod coin;
mod entry;
mod modifier;
mod record;
mod view;

pub use cache::{access_by_txid, add_coins_from_tx, CoinsViewCache};
pub use coin::Coin;
pub use entry::{CacheEntry, CoinsMap, EntryFlags, SaltedTxidHasher};
pub use modifier::CoinsModifier;
pub use record::CoinRecord;
pub use view::{BackingView, CoinsStats, EmptyView};
