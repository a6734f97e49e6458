// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - TRANSACTION VALIDATOR
//
// validate(tx, snapshot, header) -> Effects
//
// Pure: reads the Ledger, CertStore and VoteStore, never mutates them. Raw
// scripts are decoded once here and the four script types are matched
// exhaustively. The returned Effects carry the nonces they were computed
// against so each store can refuse them if the snapshot went stale.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::collections::BTreeSet;
use ubic_consensus::VoteStore;
use ubic_core::ubi::payable_ubi;
use ubic_core::{
    CertStore, CertType, Credit, Debit, DeactivateCertificateScript, Effects, HeaderContext,
    InputScript, Ledger, OutputScript, ProtocolParams, ScriptType, Transaction, TxId,
    ValidationError,
};
use ubic_crypto::{address_link, verify_signature};

/// Message the root authority signs to revoke `cert_id` in transaction `tx_id`
pub fn deactivation_message(tx_id: &[u8], cert_id: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(tx_id.len() + cert_id.len());
    msg.extend_from_slice(tx_id);
    msg.extend_from_slice(cert_id);
    msg
}

fn check_nonce(expected: u64, got: u64) -> Result<(), ValidationError> {
    if expected != got {
        return Err(ValidationError::StaleNonce { expected, got });
    }
    Ok(())
}

/// Validate `tx` against the given state as of `header`.
pub fn validate(
    tx: &Transaction,
    ledger: &Ledger,
    certs: &CertStore,
    votes: &VoteStore,
    header: &HeaderContext,
    params: &ProtocolParams,
) -> Result<Effects, ValidationError> {
    if tx.network != params.network_id {
        return Err(ValidationError::malformed(format!(
            "network {} (expected {})",
            tx.network, params.network_id
        )));
    }
    let script_type = tx.script_type()?;

    let inputs = tx
        .tx_ins
        .iter()
        .map(|txin| InputScript::decode(&txin.script))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = tx
        .tx_outs
        .iter()
        .map(|txout| OutputScript::decode(&txout.script))
        .collect::<Result<Vec<_>, _>>()?;
    let tx_id = tx.tx_id();

    match script_type {
        ScriptType::PayToKeyHash => {
            validate_transfer(tx, &tx_id, &inputs, &outputs, ledger, certs, header, params)
        }
        ScriptType::Vote => validate_vote(tx, &tx_id, &inputs, &outputs, votes),
        ScriptType::RegisterPassport => {
            validate_register_passport(tx, &tx_id, &inputs, &outputs, ledger, certs, header)
        }
        ScriptType::DeactivateCertificate => {
            validate_deactivation(tx, &tx_id, &inputs, &outputs, certs, header, params)
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// PAY-TO-KEY-HASH
// ─────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn validate_transfer(
    tx: &Transaction,
    tx_id: &TxId,
    inputs: &[InputScript],
    outputs: &[OutputScript],
    ledger: &Ledger,
    certs: &CertStore,
    header: &HeaderContext,
    params: &ProtocolParams,
) -> Result<Effects, ValidationError> {
    let mut seen = BTreeSet::new();
    let mut debits = Vec::with_capacity(tx.tx_ins.len());

    for (txin, script) in tx.tx_ins.iter().zip(inputs) {
        let signature = match script {
            InputScript::PayToKeyHash { signature } => signature,
            _ => return Err(ValidationError::malformed("mixed input script types")),
        };
        if !seen.insert(txin.in_address.as_slice()) {
            return Err(ValidationError::malformed("account spent twice in one transaction"));
        }

        // An account that was never credited has no key to verify against
        let account = ledger
            .get_account(&txin.in_address)
            .ok_or(ValidationError::BadSignature)?;
        check_nonce(account.nonce, txin.nonce)?;

        let spending_key = account
            .spending_key
            .as_deref()
            .ok_or(ValidationError::BadSignature)?;
        if address_link(spending_key) != txin.in_address
            || !verify_signature(tx_id, signature, spending_key)
        {
            return Err(ValidationError::BadSignature);
        }

        let chain = account
            .identity_link
            .as_deref()
            .and_then(|id| certs.trust_chain(id));
        let settlement = payable_ubi(&account, header.height, chain.as_ref(), &params.ubi_rates)?;
        let available = account.balance.checked_add(&settlement)?;
        if !available.dominates(&txin.amount) {
            return Err(ValidationError::InsufficientFunds);
        }

        debits.push(Debit {
            link: txin.in_address.clone(),
            amount: txin.amount.clone(),
            expected_nonce: account.nonce,
            ubi_settlement: settlement,
        });
    }

    let mut credits = Vec::with_capacity(tx.tx_outs.len());
    for (txout, script) in tx.tx_outs.iter().zip(outputs) {
        let public_key = match script {
            OutputScript::PayToKeyHash { public_key } => public_key,
            OutputScript::Vote(_) => {
                return Err(ValidationError::malformed("vote output in a transfer"))
            }
        };
        credits.push(Credit {
            link: address_link(public_key),
            spending_key: public_key.clone(),
            amount: txout.amount.clone(),
        });
    }

    let fee = tx.fee()?;
    Ok(Effects::Transfer {
        debits,
        credits,
        fee,
    })
}

// ─────────────────────────────────────────────────────────────────
// VOTE
// ─────────────────────────────────────────────────────────────────

fn validate_vote(
    tx: &Transaction,
    tx_id: &TxId,
    inputs: &[InputScript],
    outputs: &[OutputScript],
    votes: &VoteStore,
) -> Result<Effects, ValidationError> {
    let (txin, signature, vote) = match (tx.tx_ins.as_slice(), inputs, outputs) {
        ([txin], [InputScript::Vote { signature }], [OutputScript::Vote(vote)]) => {
            (txin, signature, vote)
        }
        _ => {
            return Err(ValidationError::malformed(
                "vote needs exactly one vote input and one vote output",
            ))
        }
    };
    if tx.carries_value() {
        return Err(ValidationError::malformed("vote carries value"));
    }
    if vote.from_pub_key != txin.in_address {
        return Err(ValidationError::BadSignature);
    }

    let delegate = votes
        .delegate(&txin.in_address)
        .ok_or(ValidationError::NotEligibleValidator)?;
    check_nonce(delegate.nonce, txin.nonce)?;
    check_nonce(delegate.nonce, vote.nonce)?;

    if !verify_signature(tx_id, signature, &txin.in_address) {
        return Err(ValidationError::BadSignature);
    }
    votes.check_vote(&txin.in_address, vote)?;

    Ok(Effects::Vote {
        voter: txin.in_address.clone(),
        expected_nonce: delegate.nonce,
        vote: vote.clone(),
    })
}

// ─────────────────────────────────────────────────────────────────
// REGISTER PASSPORT
// ─────────────────────────────────────────────────────────────────

fn validate_register_passport(
    tx: &Transaction,
    tx_id: &TxId,
    inputs: &[InputScript],
    outputs: &[OutputScript],
    ledger: &Ledger,
    certs: &CertStore,
    header: &HeaderContext,
) -> Result<Effects, ValidationError> {
    let (txin, chip_signature, receiver_key) = match (tx.tx_ins.as_slice(), inputs, outputs) {
        (
            [txin],
            [InputScript::RegisterPassport { chip_signature }],
            [OutputScript::PayToKeyHash { public_key }],
        ) => (txin, chip_signature, public_key),
        _ => {
            return Err(ValidationError::malformed(
                "passport registration needs one passport input and one receiver output",
            ))
        }
    };
    if tx.carries_value() {
        return Err(ValidationError::malformed("passport registration carries value"));
    }

    let cert_id = &txin.in_address;
    let nonce = certs
        .dsc(cert_id)
        .ok_or(ValidationError::CertificateNotFound)?
        .nonce;
    check_nonce(nonce, txin.nonce)?;

    let dsc = certs.verify_chain(cert_id, header.height, header.timestamp)?;
    if !verify_signature(tx_id, chip_signature, &dsc.public_key) {
        return Err(ValidationError::BadSignature);
    }

    let receiver = address_link(receiver_key);
    if ledger.linked_account(cert_id).is_some() {
        return Err(ValidationError::CertificateAlreadyLinked);
    }
    if ledger
        .get_account(&receiver)
        .map(|a| a.is_identity_bound())
        .unwrap_or(false)
    {
        return Err(ValidationError::CertificateAlreadyLinked);
    }

    Ok(Effects::BindIdentity {
        cert_id: cert_id.clone(),
        receiver,
        spending_key: receiver_key.clone(),
        height: header.height,
    })
}

// ─────────────────────────────────────────────────────────────────
// DEACTIVATE CERTIFICATE
// ─────────────────────────────────────────────────────────────────

fn validate_deactivation(
    tx: &Transaction,
    tx_id: &TxId,
    inputs: &[InputScript],
    outputs: &[OutputScript],
    certs: &CertStore,
    header: &HeaderContext,
    params: &ProtocolParams,
) -> Result<Effects, ValidationError> {
    let (txin, script) = match (tx.tx_ins.as_slice(), inputs) {
        ([txin], [InputScript::DeactivateCertificate(script)]) if outputs.is_empty() => {
            (txin, script)
        }
        _ => {
            return Err(ValidationError::malformed(
                "deactivation needs one deactivation input and no outputs",
            ))
        }
    };
    if tx.carries_value() {
        return Err(ValidationError::malformed("deactivation carries value"));
    }

    let DeactivateCertificateScript {
        cert_type,
        root_signature,
    } = script;
    if *cert_type == CertType::Root {
        return Err(ValidationError::malformed("root certificates cannot be deactivated"));
    }

    let cert_id = &txin.in_address;
    let cert = certs
        .get(*cert_type, cert_id)
        .ok_or(ValidationError::CertificateNotFound)?;
    check_nonce(cert.nonce, txin.nonce)?;

    let msg = deactivation_message(tx_id, cert_id);
    if !verify_signature(&msg, root_signature, &params.root_authority_public_key) {
        return Err(ValidationError::BadSignature);
    }
    if !cert.is_active_at(header.height) {
        return Err(ValidationError::CertificateNotTrusted);
    }

    Ok(Effects::DeactivateCertificate {
        cert_type: *cert_type,
        cert_id: cert_id.clone(),
        expected_nonce: cert.nonce,
        height: header.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubic_core::script::{pay_to_key, VOTE_VERSION};
    use ubic_core::{
        Amount, Certificate, ConsensusParams, RawScript, TxIn, TxOut, UbiRates, Vote, VoteAction,
    };
    use ubic_crypto::{generate_keypair_from_seed, KeyPair};

    const NET: u8 = 3;

    fn keys(tag: u8) -> KeyPair {
        generate_keypair_from_seed(&[tag; 32]).unwrap()
    }

    struct Fixture {
        ledger: Ledger,
        certs: CertStore,
        votes: VoteStore,
        params: ProtocolParams,
        root_authority: KeyPair,
        alice: KeyPair,
        bob: KeyPair,
        delegate: KeyPair,
        dsc_keys: KeyPair,
        dsc_id: Vec<u8>,
        csca_id: Vec<u8>,
    }

    fn fixture() -> Fixture {
        let root_authority = keys(1);
        let root_keys = keys(2);
        let csca_keys = keys(3);
        let dsc_keys = keys(4);
        let alice = keys(10);
        let bob = keys(11);
        let delegate = keys(20);

        let mut certs = CertStore::new();
        let root = Certificate::root(root_keys.public_key.clone(), 0, 0);
        certs.add_root(root.clone()).unwrap();
        let csca =
            Certificate::issue(CertType::Csca, csca_keys.public_key.clone(), &root, &root_keys, 0, 0)
                .unwrap();
        let csca_id = csca.id.clone();
        certs.trust_csca(csca.clone(), 0).unwrap();
        let dsc =
            Certificate::issue(CertType::Dsc, dsc_keys.public_key.clone(), &csca, &csca_keys, 0, 0)
                .unwrap();
        let dsc_id = dsc.id.clone();
        certs.trust_dsc(dsc, 0).unwrap();

        let mut ledger = Ledger::new();
        ledger
            .credit_genesis(&alice.public_key, &Amount::single(0, 100))
            .unwrap();

        let mut votes = VoteStore::new(ConsensusParams {
            active_delegate_count: 5,
            slot_duration_secs: 10,
        });
        votes.register_genesis_delegate(delegate.public_key.clone());

        let params = ProtocolParams {
            network_id: NET,
            root_authority_public_key: root_authority.public_key.clone(),
            ubi_rates: UbiRates::new([(0, 2)]),
            consensus: votes.params().clone(),
        };

        Fixture {
            ledger,
            certs,
            votes,
            params,
            root_authority,
            alice,
            bob,
            delegate,
            dsc_keys,
            dsc_id,
            csca_id,
        }
    }

    fn at(height: u64) -> HeaderContext {
        HeaderContext {
            height,
            timestamp: 1_000,
        }
    }

    fn run(f: &Fixture, tx: &Transaction, height: u64) -> Result<Effects, ValidationError> {
        validate(tx, &f.ledger, &f.certs, &f.votes, &at(height), &f.params)
    }

    fn payment(from: &KeyPair, to: &KeyPair, spend: u64, send: u64, nonce: u64) -> Transaction {
        let mut tx = Transaction {
            network: NET,
            tx_ins: vec![TxIn {
                in_address: from.address_link(),
                script: RawScript::new(ScriptType::PayToKeyHash, Vec::new()),
                amount: Amount::single(0, spend),
                nonce,
            }],
            tx_outs: vec![TxOut {
                script: pay_to_key(&to.public_key),
                amount: Amount::single(0, send),
            }],
        };
        let sig = from.sign(&tx.tx_id()).unwrap();
        tx.tx_ins[0].script.payload = sig;
        tx
    }

    fn vote_tx(voter: &KeyPair, target: &[u8], action: VoteAction, nonce: u64) -> Transaction {
        let vote = Vote {
            action,
            target_pub_key: target.to_vec(),
            from_pub_key: voter.public_key.clone(),
            nonce,
            version: VOTE_VERSION,
        };
        let mut tx = Transaction {
            network: NET,
            tx_ins: vec![TxIn {
                in_address: voter.public_key.clone(),
                script: RawScript::new(ScriptType::Vote, Vec::new()),
                amount: Amount::new(),
                nonce,
            }],
            tx_outs: vec![TxOut {
                script: OutputScript::Vote(vote).encode().unwrap(),
                amount: Amount::new(),
            }],
        };
        tx.tx_ins[0].script.payload = voter.sign(&tx.tx_id()).unwrap();
        tx
    }

    fn passport_tx(f: &Fixture, receiver: &KeyPair, chip: &KeyPair) -> Transaction {
        let mut tx = Transaction {
            network: NET,
            tx_ins: vec![TxIn {
                in_address: f.dsc_id.clone(),
                script: RawScript::new(ScriptType::RegisterPassport, Vec::new()),
                amount: Amount::new(),
                nonce: 0,
            }],
            tx_outs: vec![TxOut {
                script: pay_to_key(&receiver.public_key),
                amount: Amount::new(),
            }],
        };
        tx.tx_ins[0].script.payload = chip.sign(&tx.tx_id()).unwrap();
        tx
    }

    fn deactivation_tx(cert_type: CertType, cert_id: &[u8], signer: &KeyPair) -> Transaction {
        let mut tx = Transaction {
            network: NET,
            tx_ins: vec![TxIn {
                in_address: cert_id.to_vec(),
                script: RawScript::new(ScriptType::DeactivateCertificate, Vec::new()),
                amount: Amount::new(),
                nonce: 0,
            }],
            tx_outs: vec![],
        };
        let root_signature = signer
            .sign(&deactivation_message(&tx.tx_id(), cert_id))
            .unwrap();
        tx.tx_ins[0].script = InputScript::DeactivateCertificate(DeactivateCertificateScript {
            cert_type,
            root_signature,
        })
        .encode()
        .unwrap();
        tx
    }

    #[test]
    fn test_payment_produces_transfer_with_fee() {
        let f = fixture();
        let tx = payment(&f.alice, &f.bob, 60, 55, 0);
        match run(&f, &tx, 1).unwrap() {
            Effects::Transfer { debits, credits, fee } => {
                assert_eq!(debits[0].amount, Amount::single(0, 60));
                assert_eq!(debits[0].expected_nonce, 0);
                assert_eq!(credits[0].link, f.bob.address_link());
                assert_eq!(fee, Amount::single(0, 5));
            }
            other => panic!("unexpected effects {:?}", other),
        }
    }

    #[test]
    fn test_payment_stale_nonce() {
        let f = fixture();
        let tx = payment(&f.alice, &f.bob, 10, 10, 5);
        assert_eq!(
            run(&f, &tx, 1).unwrap_err(),
            ValidationError::StaleNonce {
                expected: 0,
                got: 5
            }
        );
    }

    #[test]
    fn test_payment_bad_signature() {
        let f = fixture();
        let mut tx = payment(&f.alice, &f.bob, 10, 10, 0);
        tx.tx_ins[0].script.payload = f.bob.sign(&tx.tx_id()).unwrap();
        assert_eq!(run(&f, &tx, 1).unwrap_err(), ValidationError::BadSignature);
    }

    #[test]
    fn test_payment_overspend_rejected() {
        let f = fixture();
        let tx = payment(&f.alice, &f.bob, 101, 101, 0);
        assert_eq!(run(&f, &tx, 1).unwrap_err(), ValidationError::InsufficientFunds);

        let tx = payment(&f.alice, &f.bob, 50, 60, 0);
        assert_eq!(run(&f, &tx, 1).unwrap_err(), ValidationError::InsufficientFunds);
    }

    #[test]
    fn test_payment_from_unknown_account_rejected() {
        let f = fixture();
        let tx = payment(&f.bob, &f.alice, 0, 0, 0);
        assert_eq!(run(&f, &tx, 1).unwrap_err(), ValidationError::BadSignature);
    }

    #[test]
    fn test_wrong_network_rejected() {
        let f = fixture();
        let mut tx = payment(&f.alice, &f.bob, 10, 10, 0);
        tx.network = NET + 1;
        assert!(matches!(
            run(&f, &tx, 1).unwrap_err(),
            ValidationError::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_unknown_script_type_rejected() {
        let f = fixture();
        let mut tx = payment(&f.alice, &f.bob, 10, 10, 0);
        tx.tx_ins[0].script.script_type = 9;
        assert_eq!(
            run(&f, &tx, 1).unwrap_err(),
            ValidationError::UnknownScriptType(9)
        );
    }

    #[test]
    fn test_vote_from_active_delegate() {
        let f = fixture();
        let tx = vote_tx(&f.delegate, &[7; 32], VoteAction::Vote, 0);
        match run(&f, &tx, 1).unwrap() {
            Effects::Vote {
                voter,
                expected_nonce,
                vote,
            } => {
                assert_eq!(voter, f.delegate.public_key);
                assert_eq!(expected_nonce, 0);
                assert_eq!(vote.target_pub_key, vec![7; 32]);
            }
            other => panic!("unexpected effects {:?}", other),
        }
    }

    #[test]
    fn test_vote_from_unknown_delegate_rejected() {
        let f = fixture();
        let tx = vote_tx(&f.alice, &[7; 32], VoteAction::Vote, 0);
        assert_eq!(
            run(&f, &tx, 1).unwrap_err(),
            ValidationError::NotEligibleValidator
        );
    }

    #[test]
    fn test_vote_with_value_rejected() {
        let f = fixture();
        let mut tx = vote_tx(&f.delegate, &[7; 32], VoteAction::Vote, 0);
        tx.tx_outs[0].amount = Amount::single(0, 1);
        assert!(matches!(
            run(&f, &tx, 1).unwrap_err(),
            ValidationError::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_register_passport_binds_identity() {
        let f = fixture();
        let tx = passport_tx(&f, &f.bob, &f.dsc_keys);
        match run(&f, &tx, 4).unwrap() {
            Effects::BindIdentity {
                cert_id,
                receiver,
                height,
                ..
            } => {
                assert_eq!(cert_id, f.dsc_id);
                assert_eq!(receiver, f.bob.address_link());
                assert_eq!(height, 4);
            }
            other => panic!("unexpected effects {:?}", other),
        }
    }

    #[test]
    fn test_register_passport_wrong_chip_key() {
        let f = fixture();
        let tx = passport_tx(&f, &f.bob, &f.alice);
        assert_eq!(run(&f, &tx, 4).unwrap_err(), ValidationError::BadSignature);
    }

    #[test]
    fn test_register_passport_already_linked() {
        let mut f = fixture();
        let tx = passport_tx(&f, &f.bob, &f.dsc_keys);
        let effects = run(&f, &tx, 4).unwrap();
        f.ledger.apply(&effects).unwrap();

        let again = passport_tx(&f, &f.alice, &f.dsc_keys);
        assert_eq!(
            run(&f, &again, 5).unwrap_err(),
            ValidationError::CertificateAlreadyLinked
        );
    }

    #[test]
    fn test_register_passport_revoked_chain() {
        let mut f = fixture();
        let csca_id = f.csca_id.clone();
        f.certs.deactivate(CertType::Csca, &csca_id, 3).unwrap();
        let tx = passport_tx(&f, &f.bob, &f.dsc_keys);
        assert_eq!(
            run(&f, &tx, 4).unwrap_err(),
            ValidationError::CertificateNotTrusted
        );
    }

    #[test]
    fn test_deactivation_requires_root_authority() {
        let f = fixture();
        let tx = deactivation_tx(CertType::Dsc, &f.dsc_id, &f.root_authority);
        assert!(matches!(
            run(&f, &tx, 8).unwrap(),
            Effects::DeactivateCertificate { height: 8, .. }
        ));

        let forged = deactivation_tx(CertType::Dsc, &f.dsc_id, &f.alice);
        assert_eq!(run(&f, &forged, 8).unwrap_err(), ValidationError::BadSignature);
    }

    #[test]
    fn test_deactivation_without_script_rejected() {
        let f = fixture();
        let mut tx = deactivation_tx(CertType::Dsc, &f.dsc_id, &f.root_authority);
        tx.tx_ins[0].script.payload.clear();
        assert!(matches!(
            run(&f, &tx, 8).unwrap_err(),
            ValidationError::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_deactivation_of_unknown_certificate() {
        let f = fixture();
        let tx = deactivation_tx(CertType::Dsc, &[9; 32], &f.root_authority);
        assert_eq!(
            run(&f, &tx, 8).unwrap_err(),
            ValidationError::CertificateNotFound
        );
    }
}
