//! Fuzz target: Ledger::apply robustness
//!
//! Applies random transfer effects to a seeded ledger. Apply must never
//! panic, and a rejected effect must leave the ledger untouched.
//!
//! Run: cargo +nightly fuzz run fuzz_ledger_apply

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ubic_core::{Amount, Credit, Debit, Effects, Ledger};

#[derive(Arbitrary, Debug)]
struct FuzzTransfer {
    debits: Vec<(u8, u8, u64, u64, u64)>,
    credits: Vec<(u8, u8, u64)>,
}

#[derive(Arbitrary, Debug)]
struct FuzzLedgerInput {
    // Pre-seed some accounts: (key tag, currency, amount)
    seed_accounts: Vec<(u8, u8, u64)>,
    transfers: Vec<FuzzTransfer>,
}

fn key(tag: u8) -> Vec<u8> {
    vec![tag; 32]
}

fuzz_target!(|input: FuzzLedgerInput| {
    let mut ledger = Ledger::new();

    // Seed up to 8 accounts (prevent OOM from huge vectors)
    for (tag, currency, amount) in input.seed_accounts.iter().take(8) {
        let _ = ledger.credit_genesis(&key(*tag % 8), &Amount::single(*currency, *amount));
    }

    for transfer in input.transfers.iter().take(16) {
        let effects = Effects::Transfer {
            debits: transfer
                .debits
                .iter()
                .take(4)
                .map(|(tag, currency, amount, nonce, settle)| Debit {
                    link: ubic_crypto::address_link(&key(*tag % 8)),
                    amount: Amount::single(*currency, *amount),
                    expected_nonce: *nonce % 4,
                    ubi_settlement: Amount::single(*currency, *settle % 1_000),
                })
                .collect(),
            credits: transfer
                .credits
                .iter()
                .take(4)
                .map(|(tag, currency, amount)| Credit {
                    link: ubic_crypto::address_link(&key(*tag % 8)),
                    spending_key: key(*tag % 8),
                    amount: Amount::single(*currency, *amount),
                })
                .collect(),
            fee: Amount::new(),
        };

        let before = ledger.clone();
        if ledger.apply(&effects).is_err() {
            assert_eq!(ledger, before, "rejected effect modified the ledger");
        }
    }
});
