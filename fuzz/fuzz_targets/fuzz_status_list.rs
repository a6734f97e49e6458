//! Fuzz target: certificate status history and UBI block counting
//!
//! Random status transitions; the binary-search lookups must agree with a
//! linear scan, and the active block count never exceeds the interval.
//!
//! Run: cargo +nightly fuzz run fuzz_status_list

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ubic_core::ubi::active_blocks;
use ubic_core::{Certificate, TrustChain};

#[derive(Arbitrary, Debug)]
struct FuzzStatus {
    transitions: Vec<(u16, bool)>,
    from: u16,
    to: u16,
}

fuzz_target!(|input: FuzzStatus| {
    let mut cert = Certificate::root(vec![1; 32], 0, 0);
    for (height, active) in input.transitions.iter().take(32) {
        cert.push_status(u64::from(*height), *active);
    }

    let (from, to) = (u64::from(input.from), u64::from(input.to));
    for h in [from, to] {
        let linear = cert
            .status_list
            .iter()
            .filter(|e| e.block_height <= h)
            .last()
            .map(|e| e.active)
            .unwrap_or(true);
        assert_eq!(cert.is_active_at(h), linear);
    }

    let blocks = active_blocks(&TrustChain::standalone(&cert), from, to);
    assert!(blocks <= to.saturating_sub(from));

    // A second revocable issuer can only take blocks away
    let mut issuer = Certificate::root(vec![2; 32], 0, 0);
    for (height, active) in input.transitions.iter().rev().take(32) {
        issuer.push_status(u64::from(*height), !*active);
    }
    let chained = active_blocks(&TrustChain::new(&cert, &issuer, &issuer), from, to);
    assert!(chained <= blocks);
});
