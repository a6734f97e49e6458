// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - DELEGATE RANKING & ISSUER SCHEDULE
//
// Pure functions. Ranking: (total_vote desc, public_key asc), only delegates
// with positive weight, truncated to N seats. Schedule: round-robin over the
// ranked set, slot = timestamp / slot_duration, index = slot mod |set|.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::delegate::Delegate;

/// Top-`seats` delegates in deterministic rank order
pub fn rank_delegates<'a, I>(delegates: I, seats: usize) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = &'a Delegate>,
{
    let mut ranked: Vec<&Delegate> = delegates
        .into_iter()
        .filter(|d| d.total_vote > 0)
        .collect();
    ranked.sort_by(|a, b| {
        b.total_vote
            .cmp(&a.total_vote)
            .then_with(|| a.public_key.cmp(&b.public_key))
    });
    ranked
        .into_iter()
        .take(seats)
        .map(|d| d.public_key.clone())
        .collect()
}

/// Slot number containing `timestamp`
pub fn slot_for_timestamp(timestamp: u64, slot_duration_secs: u64) -> u64 {
    timestamp / slot_duration_secs.max(1)
}

/// Position in the active set allowed to issue at `timestamp`
pub fn issuer_index(timestamp: u64, slot_duration_secs: u64, set_len: usize) -> Option<usize> {
    if set_len == 0 {
        return None;
    }
    let slot = slot_for_timestamp(timestamp, slot_duration_secs);
    Some((slot % set_len as u64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegate(key: u8, weight: u64) -> Delegate {
        let mut d = Delegate::new(vec![key; 32]);
        d.total_vote = weight;
        d
    }

    #[test]
    fn test_rank_by_weight_then_key() {
        let ds = vec![delegate(3, 5), delegate(1, 5), delegate(2, 9), delegate(4, 0)];
        let ranked = rank_delegates(&ds, 10);
        assert_eq!(ranked, vec![vec![2; 32], vec![1; 32], vec![3; 32]]);
    }

    #[test]
    fn test_rank_truncates_to_seats() {
        let ds: Vec<Delegate> = (1..=5).map(|k| delegate(k, k as u64)).collect();
        let ranked = rank_delegates(&ds, 2);
        assert_eq!(ranked, vec![vec![5; 32], vec![4; 32]]);
    }

    #[test]
    fn test_issuer_index_round_robin() {
        assert_eq!(issuer_index(0, 10, 3), Some(0));
        assert_eq!(issuer_index(9, 10, 3), Some(0));
        assert_eq!(issuer_index(10, 10, 3), Some(1));
        assert_eq!(issuer_index(25, 10, 3), Some(2));
        assert_eq!(issuer_index(30, 10, 3), Some(0));
        assert_eq!(issuer_index(30, 10, 0), None);
    }
}
