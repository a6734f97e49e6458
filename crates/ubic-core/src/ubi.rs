// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - UBI ACCRUAL
//
// settled_ubi(account, H) = rate[dsc.currency] * |{ h in [linked_at, H) :
//                                                   chain active at h }|
//
// The chain is the DSC plus its issuing CSCA and root; revoking any of them
// stops accrual for every account bound under it. Computed from the merged
// status-list runs, never by stepping block by block, so the result is the
// same whether evaluated from scratch or extended from a cached height.
// Payable = settled - ubi_debit.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::account::Account;
use crate::amount::{Amount, AmountError, CurrencyId};
use crate::certificate::TrustChain;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-block UBI rate for each currency
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UbiRates {
    pub per_block: BTreeMap<CurrencyId, u64>,
}

impl UbiRates {
    pub fn new<I: IntoIterator<Item = (CurrencyId, u64)>>(rates: I) -> Self {
        Self {
            per_block: rates.into_iter().collect(),
        }
    }

    pub fn rate(&self, currency: CurrencyId) -> u64 {
        self.per_block.get(&currency).copied().unwrap_or(0)
    }
}

/// Number of heights in `[from, to)` at which every link of `chain` was active
pub fn active_blocks(chain: &TrustChain<'_>, from: u64, to: u64) -> u64 {
    if to <= from {
        return 0;
    }
    let mut boundaries: Vec<u64> = chain
        .links()
        .flat_map(|c| {
            let start = c.status_list.partition_point(|e| e.block_height <= from);
            c.status_list[start..]
                .iter()
                .map(|e| e.block_height)
                .take_while(move |h| *h < to)
        })
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    // Status is constant between consecutive boundaries
    let mut total = 0u64;
    let mut cursor = from;
    for next in boundaries.into_iter().chain(std::iter::once(to)) {
        if chain.is_active_at(cursor) {
            total += next - cursor;
        }
        cursor = next;
    }
    total
}

fn amount_for_blocks(blocks: u64, currency: CurrencyId, rates: &UbiRates) -> Result<Amount, AmountError> {
    let quantity = blocks
        .checked_mul(rates.rate(currency))
        .ok_or(AmountError::Overflow)?;
    Ok(Amount::single(currency, quantity))
}

/// Total UBI accrued by `account` up to (excluding) `current_height`.
///
/// `chain` is the trust chain of the certificate the account is bound to;
/// zero if the account is not identity-bound or the chain is unknown.
pub fn settled_ubi(
    account: &Account,
    current_height: u64,
    chain: Option<&TrustChain<'_>>,
    rates: &UbiRates,
) -> Result<Amount, AmountError> {
    match (&account.identity_link, chain) {
        (Some(link), Some(chain)) if *link == chain.dsc.id => {
            let blocks = active_blocks(chain, account.identity_linked_at_height, current_height);
            amount_for_blocks(blocks, chain.dsc.currency, rates)
        }
        _ => Ok(Amount::new()),
    }
}

/// Accrued UBI not yet settled into the balance
pub fn payable_ubi(
    account: &Account,
    current_height: u64,
    chain: Option<&TrustChain<'_>>,
    rates: &UbiRates,
) -> Result<Amount, AmountError> {
    Ok(settled_ubi(account, current_height, chain, rates)?.saturating_sub(&account.ubi_debit))
}

/// Spendable funds: explicit balance plus payable UBI
pub fn amount_with_ubi(
    account: &Account,
    current_height: u64,
    chain: Option<&TrustChain<'_>>,
    rates: &UbiRates,
) -> Result<Amount, AmountError> {
    account
        .balance
        .checked_add(&payable_ubi(account, current_height, chain, rates)?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// INCREMENTAL CACHE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    cert_id: Vec<u8>,
    linked_at: u64,
    status_lens: [usize; 3],
    height: u64,
    blocks: u64,
}

/// Remembers the active-block count per account so repeated queries at a
/// growing height only scan the new range. An entry is reused only while the
/// binding and the status lists of the whole chain are unchanged and the query
/// height has not moved backwards; otherwise it is recomputed from scratch.
#[derive(Debug, Clone, Default)]
pub struct UbiCache {
    entries: HashMap<Vec<u8>, CacheEntry>,
}

impl UbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn settled_ubi(
        &mut self,
        link: &[u8],
        account: &Account,
        current_height: u64,
        chain: Option<&TrustChain<'_>>,
        rates: &UbiRates,
    ) -> Result<Amount, AmountError> {
        let chain = match (&account.identity_link, chain) {
            (Some(id), Some(chain)) if *id == chain.dsc.id => chain,
            _ => {
                self.entries.remove(link);
                return Ok(Amount::new());
            }
        };
        let linked_at = account.identity_linked_at_height;

        let blocks = match self.entries.get(link) {
            Some(e)
                if e.cert_id == chain.dsc.id
                    && e.linked_at == linked_at
                    && e.status_lens == chain.status_lens()
                    && e.height <= current_height =>
            {
                e.blocks + active_blocks(chain, e.height.max(linked_at), current_height)
            }
            _ => active_blocks(chain, linked_at, current_height),
        };

        self.entries.insert(
            link.to_vec(),
            CacheEntry {
                cert_id: chain.dsc.id.clone(),
                linked_at,
                status_lens: chain.status_lens(),
                height: current_height.max(linked_at),
                blocks,
            },
        );
        amount_for_blocks(blocks, chain.dsc.currency, rates)
    }
}
