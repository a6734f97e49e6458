// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - SCRIPT MODEL
//
// On the wire every input/output carries a RawScript: a one-byte type tag plus
// an opaque payload. At the validation boundary the raw form is decoded ONCE
// into InputScript / OutputScript, closed sum types the validator matches on
// exhaustively.
//
//   tag | input payload                     | output payload
//   ----+-----------------------------------+---------------------------
//    1  | signature over tx id              | receiver public key
//    2  | delegate signature over tx id     | bincode(Vote)
//    3  | chip signature over tx id         | (not an output type)
//    4  | bincode(DeactivateCertificateScript) | (not an output type)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::ValidationError;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ubic_crypto::{PUBLIC_KEY_LEN, SIGNATURE_LEN};

/// Upper bound on any decoded payload (guards bincode length prefixes)
pub const MAX_PAYLOAD_LEN: u64 = 4096;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScriptType {
    PayToKeyHash,
    Vote,
    RegisterPassport,
    DeactivateCertificate,
}

impl ScriptType {
    pub fn tag(self) -> u8 {
        match self {
            ScriptType::PayToKeyHash => 1,
            ScriptType::Vote => 2,
            ScriptType::RegisterPassport => 3,
            ScriptType::DeactivateCertificate => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ValidationError> {
        match tag {
            1 => Ok(ScriptType::PayToKeyHash),
            2 => Ok(ScriptType::Vote),
            3 => Ok(ScriptType::RegisterPassport),
            4 => Ok(ScriptType::DeactivateCertificate),
            other => Err(ValidationError::UnknownScriptType(other)),
        }
    }
}

/// Undecoded script as carried by a transaction
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawScript {
    pub script_type: u8,
    pub payload: Vec<u8>,
}

impl RawScript {
    pub fn new(script_type: ScriptType, payload: Vec<u8>) -> Self {
        Self {
            script_type: script_type.tag(),
            payload,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteAction {
    Vote,
    Unvote,
}

/// Ballot cast by one delegate for (or against) another
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Vote {
    pub action: VoteAction,
    pub target_pub_key: Vec<u8>,
    pub from_pub_key: Vec<u8>,
    pub nonce: u64,
    pub version: u8,
}

pub const VOTE_VERSION: u8 = 1;

/// Certificate tier in the root -> CSCA -> DSC trust chain
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CertType {
    Root,
    Csca,
    Dsc,
}

impl CertType {
    pub fn tag(self) -> u8 {
        match self {
            CertType::Root => 0,
            CertType::Csca => 1,
            CertType::Dsc => 2,
        }
    }
}

impl std::fmt::Display for CertType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CertType::Root => write!(f, "root"),
            CertType::Csca => write!(f, "csca"),
            CertType::Dsc => write!(f, "dsc"),
        }
    }
}

/// Authorisation for revoking a certificate, signed by the network root key
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeactivateCertificateScript {
    pub cert_type: CertType,
    pub root_signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputScript {
    PayToKeyHash { signature: Vec<u8> },
    Vote { signature: Vec<u8> },
    RegisterPassport { chip_signature: Vec<u8> },
    DeactivateCertificate(DeactivateCertificateScript),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputScript {
    PayToKeyHash { public_key: Vec<u8> },
    Vote(Vote),
}

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_PAYLOAD_LEN)
}

/// Decode a structured payload, rejecting oversize and trailing bytes
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ValidationError> {
    payload_options()
        .deserialize(payload)
        .map_err(|e| ValidationError::malformed(format!("payload decode: {}", e)))
}

pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ValidationError> {
    payload_options()
        .serialize(value)
        .map_err(|e| ValidationError::malformed(format!("payload encode: {}", e)))
}

fn expect_signature(payload: &[u8]) -> Result<Vec<u8>, ValidationError> {
    if payload.len() != SIGNATURE_LEN {
        return Err(ValidationError::malformed(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LEN,
            payload.len()
        )));
    }
    Ok(payload.to_vec())
}

impl InputScript {
    pub fn decode(raw: &RawScript) -> Result<Self, ValidationError> {
        match ScriptType::from_tag(raw.script_type)? {
            ScriptType::PayToKeyHash => Ok(InputScript::PayToKeyHash {
                signature: expect_signature(&raw.payload)?,
            }),
            ScriptType::Vote => Ok(InputScript::Vote {
                signature: expect_signature(&raw.payload)?,
            }),
            ScriptType::RegisterPassport => Ok(InputScript::RegisterPassport {
                chip_signature: expect_signature(&raw.payload)?,
            }),
            ScriptType::DeactivateCertificate => {
                let script: DeactivateCertificateScript = decode_payload(&raw.payload)?;
                Ok(InputScript::DeactivateCertificate(script))
            }
        }
    }

    pub fn encode(&self) -> Result<RawScript, ValidationError> {
        Ok(match self {
            InputScript::PayToKeyHash { signature } => {
                RawScript::new(ScriptType::PayToKeyHash, signature.clone())
            }
            InputScript::Vote { signature } => RawScript::new(ScriptType::Vote, signature.clone()),
            InputScript::RegisterPassport { chip_signature } => {
                RawScript::new(ScriptType::RegisterPassport, chip_signature.clone())
            }
            InputScript::DeactivateCertificate(script) => {
                RawScript::new(ScriptType::DeactivateCertificate, encode_payload(script)?)
            }
        })
    }

    pub fn script_type(&self) -> ScriptType {
        match self {
            InputScript::PayToKeyHash { .. } => ScriptType::PayToKeyHash,
            InputScript::Vote { .. } => ScriptType::Vote,
            InputScript::RegisterPassport { .. } => ScriptType::RegisterPassport,
            InputScript::DeactivateCertificate(_) => ScriptType::DeactivateCertificate,
        }
    }
}

impl OutputScript {
    pub fn decode(raw: &RawScript) -> Result<Self, ValidationError> {
        match ScriptType::from_tag(raw.script_type)? {
            ScriptType::PayToKeyHash => {
                if raw.payload.len() != PUBLIC_KEY_LEN {
                    return Err(ValidationError::malformed("receiver public key length"));
                }
                Ok(OutputScript::PayToKeyHash {
                    public_key: raw.payload.clone(),
                })
            }
            ScriptType::Vote => Ok(OutputScript::Vote(decode_payload(&raw.payload)?)),
            other => Err(ValidationError::malformed(format!(
                "script type {} cannot appear on an output",
                other.tag()
            ))),
        }
    }

    pub fn encode(&self) -> Result<RawScript, ValidationError> {
        Ok(match self {
            OutputScript::PayToKeyHash { public_key } => {
                RawScript::new(ScriptType::PayToKeyHash, public_key.clone())
            }
            OutputScript::Vote(vote) => RawScript::new(ScriptType::Vote, encode_payload(vote)?),
        })
    }
}

/// Pay-to-key-hash output script for a receiver key
pub fn pay_to_key(public_key: &[u8]) -> RawScript {
    RawScript::new(ScriptType::PayToKeyHash, public_key.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_rejected() {
        let raw = RawScript {
            script_type: 9,
            payload: vec![],
        };
        assert_eq!(
            InputScript::decode(&raw).unwrap_err(),
            ValidationError::UnknownScriptType(9)
        );
        assert_eq!(
            OutputScript::decode(&raw).unwrap_err(),
            ValidationError::UnknownScriptType(9)
        );
    }

    #[test]
    fn test_short_signature_is_malformed() {
        let raw = RawScript::new(ScriptType::PayToKeyHash, vec![1, 2, 3]);
        assert!(matches!(
            InputScript::decode(&raw),
            Err(ValidationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_vote_output_decodes() {
        let vote = Vote {
            action: VoteAction::Unvote,
            target_pub_key: vec![1; 32],
            from_pub_key: vec![2; 32],
            nonce: 4,
            version: VOTE_VERSION,
        };
        let raw = OutputScript::Vote(vote.clone()).encode().unwrap();
        assert_eq!(raw.script_type, 2);
        assert_eq!(OutputScript::decode(&raw).unwrap(), OutputScript::Vote(vote));
    }

    #[test]
    fn test_passport_type_is_not_an_output() {
        let raw = RawScript::new(ScriptType::RegisterPassport, vec![0; 64]);
        assert!(matches!(
            OutputScript::decode(&raw),
            Err(ValidationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let script = DeactivateCertificateScript {
            cert_type: CertType::Dsc,
            root_signature: vec![7; 64],
        };
        let mut raw = InputScript::DeactivateCertificate(script).encode().unwrap();
        raw.payload.push(0);
        assert!(InputScript::decode(&raw).is_err());
    }

    #[test]
    fn test_oversize_length_prefix_rejected() {
        // Vec length prefix claiming u64::MAX elements must not allocate
        let mut payload = vec![1u8, 0, 0, 0];
        payload.extend_from_slice(&u64::MAX.to_le_bytes());
        let raw = RawScript::new(ScriptType::DeactivateCertificate, payload);
        assert!(InputScript::decode(&raw).is_err());
    }
}
