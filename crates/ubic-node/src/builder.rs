// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - TRANSACTION BUILDERS
//
// Assemble and sign transactions for external collaborators. Keys never enter
// the node: signatures come from a Wallet, chip signatures from a
// PassportReader, root signatures from the root authority's key pair.
//
// Every builder fills inputs and outputs first, computes the tx id, then
// attaches the authorising scripts to the SAME transaction it returns.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::validator::deactivation_message;
use ubic_consensus::VoteStore;
use ubic_core::script::{pay_to_key, VOTE_VERSION};
use ubic_core::ubi::amount_with_ubi;
use ubic_core::{
    Amount, CertStore, CertType, DeactivateCertificateScript, InputScript, Ledger, OutputScript,
    ProtocolParams, RawScript, ScriptType, Transaction, TxIn, TxOut, ValidationError, Vote,
    VoteAction,
};
use ubic_crypto::{address_link, CryptoError, KeyPair};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Wallet holds no key for the requested public key
    NotMine,
    /// Wallet controls no active delegate
    NoDelegateKeys,
    InsufficientFunds,
    Signing(CryptoError),
    Script(ValidationError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BuildError::NotMine => write!(f, "Key not held by this wallet"),
            BuildError::NoDelegateKeys => write!(f, "Wallet controls no active delegate"),
            BuildError::InsufficientFunds => write!(f, "Wallet accounts cannot cover the payment"),
            BuildError::Signing(e) => write!(f, "Signing failed: {}", e),
            BuildError::Script(e) => write!(f, "Script: {}", e),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<ValidationError> for BuildError {
    fn from(e: ValidationError) -> Self {
        BuildError::Script(e)
    }
}

/// Signing side of a wallet
pub trait Wallet {
    /// Public keys of every key pair held
    fn public_keys(&self) -> Vec<Vec<u8>>;

    /// True if `script` pays to one of this wallet's keys
    fn is_mine(&self, script: &RawScript) -> bool;

    fn sign(&self, public_key: &[u8], message: &[u8]) -> Result<Vec<u8>, BuildError>;
}

/// A passport whose chip has already been read: the id of its
/// document-signing certificate and a chip signing oracle.
pub trait PassportReader {
    fn document_signing_certificate_id(&self) -> Vec<u8>;

    /// Active-authentication signature over `challenge` (the tx id)
    fn sign_challenge(&self, challenge: &[u8]) -> Result<Vec<u8>, BuildError>;
}

fn unsigned_input(script_type: ScriptType, in_address: Vec<u8>, amount: Amount, nonce: u64) -> TxIn {
    TxIn {
        in_address,
        script: RawScript::new(script_type, Vec::new()),
        amount,
        nonce,
    }
}

/// One vote (or unvote) transaction per active delegate the wallet controls
pub fn build_vote_transactions<W: Wallet>(
    wallet: &W,
    votes: &VoteStore,
    params: &ProtocolParams,
    action: VoteAction,
    target_pub_key: &[u8],
) -> Result<Vec<Transaction>, BuildError> {
    let mut out = Vec::new();
    for public_key in wallet.public_keys() {
        if !votes.is_active(&public_key) {
            continue;
        }
        let nonce = match votes.delegate(&public_key) {
            Some(d) => d.nonce,
            None => continue,
        };
        let vote = Vote {
            action,
            target_pub_key: target_pub_key.to_vec(),
            from_pub_key: public_key.clone(),
            nonce,
            version: VOTE_VERSION,
        };
        let mut tx = Transaction {
            network: params.network_id,
            tx_ins: vec![unsigned_input(
                ScriptType::Vote,
                public_key.clone(),
                Amount::new(),
                nonce,
            )],
            tx_outs: vec![TxOut {
                script: OutputScript::Vote(vote).encode()?,
                amount: Amount::new(),
            }],
        };
        let signature = wallet.sign(&public_key, &tx.tx_id())?;
        tx.tx_ins[0].script = InputScript::Vote { signature }.encode()?;
        out.push(tx);
    }
    if out.is_empty() {
        return Err(BuildError::NoDelegateKeys);
    }
    Ok(out)
}

/// Bind the passport's document-signing certificate to `receiver_public_key`
pub fn build_register_passport<P: PassportReader>(
    reader: &P,
    certs: &CertStore,
    params: &ProtocolParams,
    receiver_public_key: &[u8],
) -> Result<Transaction, BuildError> {
    let dsc_id = reader.document_signing_certificate_id();
    let nonce = certs
        .dsc(&dsc_id)
        .ok_or(ValidationError::CertificateNotFound)?
        .nonce;

    let mut tx = Transaction {
        network: params.network_id,
        tx_ins: vec![unsigned_input(
            ScriptType::RegisterPassport,
            dsc_id,
            Amount::new(),
            nonce,
        )],
        tx_outs: vec![TxOut {
            script: pay_to_key(receiver_public_key),
            amount: Amount::new(),
        }],
    };
    let chip_signature = reader.sign_challenge(&tx.tx_id())?;
    tx.tx_ins[0].script = InputScript::RegisterPassport { chip_signature }.encode()?;
    Ok(tx)
}

/// Revoke a CSCA or DSC, signed by the root authority
pub fn build_deactivate_certificate(
    root_authority: &KeyPair,
    certs: &CertStore,
    params: &ProtocolParams,
    cert_type: CertType,
    cert_id: &[u8],
) -> Result<Transaction, BuildError> {
    let nonce = certs
        .get(cert_type, cert_id)
        .ok_or(ValidationError::CertificateNotFound)?
        .nonce;

    let mut tx = Transaction {
        network: params.network_id,
        tx_ins: vec![unsigned_input(
            ScriptType::DeactivateCertificate,
            cert_id.to_vec(),
            Amount::new(),
            nonce,
        )],
        tx_outs: Vec::new(),
    };
    let root_signature = root_authority
        .sign(&deactivation_message(&tx.tx_id(), cert_id))
        .map_err(BuildError::Signing)?;
    tx.tx_ins[0].script = InputScript::DeactivateCertificate(DeactivateCertificateScript {
        cert_type,
        root_signature,
    })
    .encode()?;
    Ok(tx)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// (receiver public key, amount)
    pub outputs: Vec<(Vec<u8>, Amount)>,
    pub fee: Amount,
}

/// Cover `request` from the wallet's accounts (balance plus payable UBI),
/// taking from accounts in key order until every currency is covered.
pub fn build_payment<W: Wallet>(
    wallet: &W,
    ledger: &Ledger,
    certs: &CertStore,
    params: &ProtocolParams,
    height: u64,
    request: &PaymentRequest,
) -> Result<Transaction, BuildError> {
    let mut remaining = Amount::sum(request.outputs.iter().map(|(_, a)| a))
        .and_then(|a| a.checked_add(&request.fee))
        .map_err(ValidationError::from)?;

    let mut tx_ins = Vec::new();
    let mut signers = Vec::new();
    for public_key in wallet.public_keys() {
        if remaining.is_zero() {
            break;
        }
        let link = address_link(&public_key);
        let account = match ledger.get_account(&link) {
            Some(a) => a,
            None => continue,
        };
        let chain = account
            .identity_link
            .as_deref()
            .and_then(|id| certs.trust_chain(id));
        let available = amount_with_ubi(&account, height, chain.as_ref(), &params.ubi_rates)
            .map_err(ValidationError::from)?;
        let take = available.min_per_currency(&remaining);
        if take.is_zero() {
            continue;
        }
        remaining = remaining.saturating_sub(&take);
        tx_ins.push(unsigned_input(ScriptType::PayToKeyHash, link, take, account.nonce));
        signers.push(public_key);
    }
    if !remaining.is_zero() || tx_ins.is_empty() {
        return Err(BuildError::InsufficientFunds);
    }

    let mut tx = Transaction {
        network: params.network_id,
        tx_ins,
        tx_outs: request
            .outputs
            .iter()
            .map(|(public_key, amount)| TxOut {
                script: pay_to_key(public_key),
                amount: amount.clone(),
            })
            .collect(),
    };
    let tx_id = tx.tx_id();
    for (txin, public_key) in tx.tx_ins.iter_mut().zip(&signers) {
        let signature = wallet.sign(public_key, &tx_id)?;
        txin.script = InputScript::PayToKeyHash { signature }.encode()?;
    }
    Ok(tx)
}
