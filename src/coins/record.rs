use crate::memusage;
use bitcoin::TxOut;

/// The outputs a single transaction still has unspent, along with the
/// height of the block that confirmed it.
///
/// A slot becomes `None` once spent, and trailing `None`s are trimmed by
/// [`cleanup`](CoinRecord::cleanup) so the vector always ends in a live
/// output or is empty. An empty record is *pruned*: it means "no coin
/// exists for this transaction", but as a cache entry it is an explicit
/// tombstone, distinct from the key being absent altogether.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinRecord {
    /// Outputs indexed by their position within the transaction
    pub outputs: Vec<Option<TxOut>>,
    /// The height of the block this transaction was confirmed in
    pub height: u32,
    /// Whether this record came from a coinbase transaction
    pub is_coinbase: bool,
}

impl CoinRecord {
    /// Whether every output has been spent.
    pub fn is_pruned(&self) -> bool {
        self.outputs.iter().all(|out| out.is_none())
    }

    /// Whether output `n` exists and is unspent.
    pub fn is_available(&self, n: u32) -> bool {
        self.outputs
            .get(n as usize)
            .map_or(false, |out| out.is_some())
    }

    /// Spend output `n`, returning it if it was unspent.
    pub fn spend(&mut self, n: u32) -> Option<TxOut> {
        let out = self.outputs.get_mut(n as usize)?.take()?;
        self.cleanup();
        Some(out)
    }

    /// Trim trailing spent slots. Once the record is fully spent the
    /// backing allocation is released as well.
    pub fn cleanup(&mut self) {
        while self.outputs.last().map_or(false, |out| out.is_none()) {
            self.outputs.pop();
        }
        if self.outputs.is_empty() {
            self.outputs = Vec::new();
        }
    }

    /// Size of the bitmask that summarizes outputs at index 2 and up for
    /// compact storage, returned as `(mask_bytes, nonzero_bytes)`.
    ///
    /// The storage layer encodes the first two outputs out of band, so
    /// the nth mask bit (n >= 2) covers output n. `mask_bytes` runs up to
    /// the last byte with any bit set; `nonzero_bytes` counts the bytes
    /// that have one.
    pub fn calc_mask_size(&self) -> (usize, usize) {
        let mut mask_bytes = 0;
        let mut nonzero_bytes = 0;
        let mut b = 0;
        while 2 + b * 8 < self.outputs.len() {
            let mut zero = true;
            let mut i = 0;
            while i < 8 && 2 + b * 8 + i < self.outputs.len() {
                if self.outputs[2 + b * 8 + i].is_some() {
                    zero = false;
                }
                i += 1;
            }
            if !zero {
                mask_bytes = b + 1;
                nonzero_bytes += 1;
            }
            b += 1;
        }
        (mask_bytes, nonzero_bytes)
    }

    /// Heap bytes held by this record.
    pub fn dynamic_usage(&self) -> usize {
        let mut usage = memusage::dynamic_usage_vec(&self.outputs);
        for out in self.outputs.iter().flatten() {
            usage += memusage::dynamic_usage_script(&out.script_pubkey);
        }
        usage
    }
}
