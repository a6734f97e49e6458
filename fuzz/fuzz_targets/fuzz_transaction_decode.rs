//! Fuzz target: Transaction and script decoding
//!
//! Feeds arbitrary bytes to the bincode and JSON transaction decoders, then
//! runs every derived computation (tx id, fee, script decode) on whatever
//! decodes. None of them may panic.
//!
//! Run: cargo +nightly fuzz run fuzz_transaction_decode -- -max_len=4096

#![no_main]
use libfuzzer_sys::fuzz_target;
use ubic_core::{InputScript, OutputScript, Transaction};

fn exercise(tx: &Transaction) {
    let id = tx.tx_id();
    assert_eq!(id, tx.tx_id(), "tx id must be deterministic");
    let _ = tx.fee();
    let _ = tx.script_type();
    for txin in &tx.tx_ins {
        let _ = InputScript::decode(&txin.script);
    }
    for txout in &tx.tx_outs {
        let _ = OutputScript::decode(&txout.script);
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(tx) = bincode::deserialize::<Transaction>(data) {
        exercise(&tx);
    }
    if let Ok(tx) = serde_json::from_slice::<Transaction>(data) {
        exercise(&tx);
    }
});
