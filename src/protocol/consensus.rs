/// Maximum serialized size of a block, excluding witness data
pub const MAX_BLOCK_BASE_SIZE: u32 = 1_000_000;

/// Serialized size of the smallest possible transaction output:
/// an 8 byte value plus a single length byte for an empty script
pub const MIN_TRANSACTION_OUTPUT_SIZE: u32 = 9;

/// No block can create more outputs than this, which bounds how far a
/// by-txid scan over output indexes ever needs to go
pub const MAX_OUTPUTS_PER_BLOCK: u32 = MAX_BLOCK_BASE_SIZE / MIN_TRANSACTION_OUTPUT_SIZE;

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::consensus::serialize;
    use bitcoin::{Script, TxOut};

    #[test]
    fn min_output_size_matches_encoding() {
        let out = TxOut {
            value: 0,
            script_pubkey: Script::new(),
        };
        assert_eq!(serialize(&out).len(), MIN_TRANSACTION_OUTPUT_SIZE as usize);
    }

    #[test]
    fn output_bound() {
        assert_eq!(MAX_OUTPUTS_PER_BLOCK, 111_111);
    }
}
