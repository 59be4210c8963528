use bitcoin::TxOut;

/// A single unspent transaction output, materialized with the height of
/// the block that created it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coin {
    /// The output itself. `None` is the empty coin, which lookups return
    /// when nothing matches.
    pub out: Option<TxOut>,
    /// The height of the block this output was created in
    pub height: u32,
    /// Whether this coin originated from a coinbase transaction.
    /// Used to check that a coinbase is not spent until after 100 blocks
    /// have been mined.
    pub is_coinbase: bool,
}

impl Coin {
    pub fn new(out: TxOut, height: u32, is_coinbase: bool) -> Self {
        Self {
            out: Some(out),
            height,
            is_coinbase,
        }
    }

    /// The empty coin carries no output.
    pub fn is_spent(&self) -> bool {
        self.out.is_none()
    }

    /// Value of the output, or zero for the empty coin.
    pub fn value(&self) -> u64 {
        self.out.as_ref().map_or(0, |out| out.value)
    }
}
