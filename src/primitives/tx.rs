use bitcoin::Transaction;

pub trait TransactionExt {
    /// Transaction size for priority purposes. Each input is granted a
    /// 41 byte allowance plus up to 110 bytes of script_sig (enough for
    /// a compressed pubkey p2sh redemption), so consuming coins does not
    /// count against a transaction's priority.
    fn modified_size(&self) -> usize;
    /// Convert a coin-age sum over the inputs into a priority.
    fn compute_priority(&self, input_priority_sum: f64) -> f64;
}

impl TransactionExt for Transaction {
    fn modified_size(&self) -> usize {
        let mut size = self.get_size();
        for input in &self.input {
            let offset = 41 + input.script_sig.len().min(110);
            if size > offset {
                size -= offset;
            }
        }
        size
    }

    fn compute_priority(&self, input_priority_sum: f64) -> f64 {
        let size = self.modified_size();
        if size == 0 {
            return 0.0;
        }
        input_priority_sum / size as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bitcoin::{OutPoint, Script, TxIn, TxOut};

    fn one_in_one_out() -> Transaction {
        Transaction {
            version: 1,
            lock_time: 0,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: Script::new(),
                sequence: 0xffff_ffff,
                witness: vec![],
            }],
            output: vec![TxOut {
                value: 0,
                script_pubkey: Script::new(),
            }],
        }
    }

    #[test]
    fn modified_size_discounts_inputs() {
        let tx = one_in_one_out();
        // 4 version + 1 input count + 41 input + 1 output count
        // + 9 output + 4 lock time
        assert_eq!(tx.get_size(), 60);
        assert_eq!(tx.modified_size(), 60 - 41);
    }

    #[test]
    fn priority_divides_by_modified_size() {
        let tx = one_in_one_out();
        assert_eq!(tx.compute_priority(800.0), 800.0 / 19.0);
    }

    #[test]
    fn large_script_sig_discount_is_capped() {
        let mut tx = one_in_one_out();
        tx.input[0].script_sig = Script::from(vec![0u8; 200]);
        let size = tx.get_size();
        assert_eq!(size, 60 + 200);
        assert_eq!(tx.modified_size(), size - (41 + 110));
    }
}
