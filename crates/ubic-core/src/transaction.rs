// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - TRANSACTION MODEL
//
// Transaction = network id + ordered TxIns + ordered TxOuts.
// The transaction id is SHA3-256 over a canonical, length-prefixed encoding of
// every field EXCEPT input script payloads (those hold the signatures over the
// id itself). It is both the signing message and the pool dedup key.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::{Amount, AmountError};
use crate::error::ValidationError;
use crate::script::{RawScript, ScriptType};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

pub type TxId = Vec<u8>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Source reference: address link, delegate public key or certificate id
    /// depending on the script type
    pub in_address: Vec<u8>,
    pub script: RawScript,
    pub amount: Amount,
    pub nonce: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub script: RawScript,
    pub amount: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub network: u8,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
}

fn hash_bytes(hasher: &mut Sha3_256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_amount(hasher: &mut Sha3_256, amount: &Amount) {
    hasher.update((amount.iter().count() as u64).to_le_bytes());
    for (currency, quantity) in amount.iter() {
        hasher.update([currency]);
        hasher.update(quantity.to_le_bytes());
    }
}

impl Transaction {
    /// Transaction id: covers everything but the input script payloads
    pub fn tx_id(&self) -> TxId {
        let mut hasher = Sha3_256::new();
        hasher.update([self.network]);

        hasher.update((self.tx_ins.len() as u64).to_le_bytes());
        for txin in &self.tx_ins {
            hash_bytes(&mut hasher, &txin.in_address);
            // Script type IS covered, its payload is not
            hasher.update([txin.script.script_type]);
            hash_amount(&mut hasher, &txin.amount);
            hasher.update(txin.nonce.to_le_bytes());
        }

        hasher.update((self.tx_outs.len() as u64).to_le_bytes());
        for txout in &self.tx_outs {
            hasher.update([txout.script.script_type]);
            hash_bytes(&mut hasher, &txout.script.payload);
            hash_amount(&mut hasher, &txout.amount);
        }

        hasher.finalize().to_vec()
    }

    pub fn tx_id_hex(&self) -> String {
        hex::encode(self.tx_id())
    }

    pub fn input_sum(&self) -> Result<Amount, AmountError> {
        Amount::sum(self.tx_ins.iter().map(|i| &i.amount))
    }

    pub fn output_sum(&self) -> Result<Amount, AmountError> {
        Amount::sum(self.tx_outs.iter().map(|o| &o.amount))
    }

    /// Σ inputs − Σ outputs per currency. `InsufficientFunds` when the inputs
    /// do not dominate the outputs in every currency.
    pub fn fee(&self) -> Result<Amount, ValidationError> {
        let inputs = self.input_sum()?;
        let outputs = self.output_sum()?;
        inputs
            .checked_sub(&outputs)
            .map_err(|_| ValidationError::InsufficientFunds)
    }

    /// The single script type shared by all inputs.
    /// Mixed-type or input-less transactions are malformed.
    pub fn script_type(&self) -> Result<ScriptType, ValidationError> {
        let first = self
            .tx_ins
            .first()
            .ok_or_else(|| ValidationError::malformed("transaction has no inputs"))?;
        let script_type = ScriptType::from_tag(first.script.script_type)?;
        for txin in &self.tx_ins[1..] {
            if txin.script.script_type != first.script.script_type {
                ScriptType::from_tag(txin.script.script_type)?;
                return Err(ValidationError::malformed("mixed input script types"));
            }
        }
        Ok(script_type)
    }

    /// True if any input or output carries a non-zero amount
    pub fn carries_value(&self) -> bool {
        self.tx_ins.iter().any(|i| i.amount.is_positive())
            || self.tx_outs.iter().any(|o| o.amount.is_positive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::pay_to_key;

    fn sample() -> Transaction {
        Transaction {
            network: 1,
            tx_ins: vec![TxIn {
                in_address: vec![0xaa; 20],
                script: RawScript::new(ScriptType::PayToKeyHash, vec![]),
                amount: Amount::single(0, 60),
                nonce: 5,
            }],
            tx_outs: vec![TxOut {
                script: pay_to_key(&[0xbb; 32]),
                amount: Amount::single(0, 55),
            }],
        }
    }

    #[test]
    fn test_tx_id_ignores_input_payload() {
        let unsigned = sample();
        let mut signed = unsigned.clone();
        signed.tx_ins[0].script.payload = vec![9; 64];
        assert_eq!(unsigned.tx_id(), signed.tx_id());
        assert_eq!(unsigned.tx_id().len(), 32);
    }

    #[test]
    fn test_tx_id_covers_nonce_amount_and_outputs() {
        let base = sample().tx_id();

        let mut t = sample();
        t.tx_ins[0].nonce = 6;
        assert_ne!(t.tx_id(), base);

        let mut t = sample();
        t.tx_ins[0].amount = Amount::single(0, 61);
        assert_ne!(t.tx_id(), base);

        let mut t = sample();
        t.tx_outs[0].script = pay_to_key(&[0xcc; 32]);
        assert_ne!(t.tx_id(), base);

        let mut t = sample();
        t.network = 2;
        assert_ne!(t.tx_id(), base);
    }

    #[test]
    fn test_fee_is_difference() {
        assert_eq!(sample().fee().unwrap(), Amount::single(0, 5));
    }

    #[test]
    fn test_fee_requires_domination() {
        let mut t = sample();
        t.tx_outs[0].amount = Amount::single(1, 1);
        assert_eq!(t.fee().unwrap_err(), ValidationError::InsufficientFunds);
    }

    #[test]
    fn test_script_type_homogeneous() {
        let mut t = sample();
        assert_eq!(t.script_type().unwrap(), ScriptType::PayToKeyHash);

        let mut second = t.tx_ins[0].clone();
        second.script = RawScript::new(ScriptType::Vote, vec![]);
        t.tx_ins.push(second);
        assert!(matches!(
            t.script_type(),
            Err(ValidationError::MalformedPayload(_))
        ));

        t.tx_ins.clear();
        assert!(t.script_type().is_err());
    }
}
