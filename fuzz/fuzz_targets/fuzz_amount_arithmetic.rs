//! Fuzz target: multi-currency Amount arithmetic
//!
//! Checked add/sub never wrap: they either succeed with the exact per-currency
//! result or report an error.
//!
//! Run: cargo +nightly fuzz run fuzz_amount_arithmetic

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ubic_core::Amount;

#[derive(Arbitrary, Debug)]
struct FuzzAmounts {
    left: Vec<(u8, u64)>,
    right: Vec<(u8, u64)>,
}

fuzz_target!(|input: FuzzAmounts| {
    let (a, b) = match (
        Amount::from_pairs(input.left.into_iter().take(16)),
        Amount::from_pairs(input.right.into_iter().take(16)),
    ) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return,
    };

    if let Ok(sum) = a.checked_add(&b) {
        for (currency, quantity) in sum.iter() {
            assert_eq!(Some(quantity), a.get(currency).checked_add(b.get(currency)));
        }
        assert_eq!(sum.checked_sub(&b).ok(), Some(a.clone()));
    }

    match a.checked_sub(&b) {
        Ok(diff) => assert!(a.dominates(&b) && diff.checked_add(&b).ok() == Some(a.clone())),
        Err(_) => assert!(!a.dominates(&b)),
    }

    let floor = a.saturating_sub(&b);
    assert!(a.dominates(&floor));
    assert!(a.dominates(&a.min_per_currency(&b)));
});
