// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - CERTIFICATE TRUST STORE
//
// Three-tier chain of trust: root -> CSCA (country signing) -> DSC (document
// signing). A DSC is trusted at a height only if it and both issuers are
// active at that height, unexpired, and every issuer signature verifies.
//
// Deactivation appends a status transition; history is never deleted.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::certificate::{Certificate, TrustChain};
use crate::effects::Effects;
use crate::error::ValidationError;
use crate::script::CertType;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CertStore {
    roots: BTreeMap<Vec<u8>, Certificate>,
    cscas: BTreeMap<Vec<u8>, Certificate>,
    dscs: BTreeMap<Vec<u8>, Certificate>,
}

impl CertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records (any tier, any order)
    pub fn from_certificates<I: IntoIterator<Item = Certificate>>(certs: I) -> Self {
        let mut store = Self::new();
        for cert in certs {
            store.tier_mut(cert.cert_type).insert(cert.id.clone(), cert);
        }
        store
    }

    fn tier(&self, cert_type: CertType) -> &BTreeMap<Vec<u8>, Certificate> {
        match cert_type {
            CertType::Root => &self.roots,
            CertType::Csca => &self.cscas,
            CertType::Dsc => &self.dscs,
        }
    }

    fn tier_mut(&mut self, cert_type: CertType) -> &mut BTreeMap<Vec<u8>, Certificate> {
        match cert_type {
            CertType::Root => &mut self.roots,
            CertType::Csca => &mut self.cscas,
            CertType::Dsc => &mut self.dscs,
        }
    }

    pub fn root(&self, id: &[u8]) -> Option<&Certificate> {
        self.roots.get(id)
    }

    pub fn csca(&self, id: &[u8]) -> Option<&Certificate> {
        self.cscas.get(id)
    }

    pub fn dsc(&self, id: &[u8]) -> Option<&Certificate> {
        self.dscs.get(id)
    }

    pub fn get(&self, cert_type: CertType, id: &[u8]) -> Option<&Certificate> {
        self.tier(cert_type).get(id)
    }

    /// All records of one tier in id order
    pub fn list(&self, cert_type: CertType) -> impl Iterator<Item = &Certificate> {
        self.tier(cert_type).values()
    }

    /// Every record, roots first
    pub fn all(&self) -> impl Iterator<Item = &Certificate> {
        self.roots
            .values()
            .chain(self.cscas.values())
            .chain(self.dscs.values())
    }

    /// Install a pre-trusted root anchor
    pub fn add_root(&mut self, cert: Certificate) -> Result<(), ValidationError> {
        if cert.cert_type != CertType::Root {
            return Err(ValidationError::malformed("not a root certificate"));
        }
        if !cert.id_is_consistent() {
            return Err(ValidationError::malformed("root certificate id mismatch"));
        }
        info!("Trusting root certificate {}", ubic_crypto::short_hex(&cert.id, 16));
        self.roots.insert(cert.id.clone(), cert);
        Ok(())
    }

    /// Admit a CSCA signed by a known, active root
    pub fn trust_csca(&mut self, cert: Certificate, height: u64) -> Result<(), ValidationError> {
        self.trust_issued(cert, CertType::Csca, CertType::Root, height)
    }

    /// Admit a DSC signed by a known, active CSCA
    pub fn trust_dsc(&mut self, cert: Certificate, height: u64) -> Result<(), ValidationError> {
        self.trust_issued(cert, CertType::Dsc, CertType::Csca, height)
    }

    fn trust_issued(
        &mut self,
        cert: Certificate,
        expected: CertType,
        issuer_type: CertType,
        height: u64,
    ) -> Result<(), ValidationError> {
        if cert.cert_type != expected {
            return Err(ValidationError::malformed(format!(
                "expected {} certificate, got {}",
                expected, cert.cert_type
            )));
        }
        if !cert.id_is_consistent() {
            return Err(ValidationError::malformed("certificate id mismatch"));
        }

        let issuer = self
            .get(issuer_type, &cert.issuer_id)
            .ok_or(ValidationError::CertificateNotTrusted)?;
        if !issuer.is_active_at(height) || !cert.verify_issued_by(&issuer.public_key) {
            return Err(ValidationError::CertificateNotTrusted);
        }

        // Explicit re-trust of a known certificate reactivates it, keeping
        // its nonce and history
        if let Some(existing) = self.tier_mut(expected).get_mut(&cert.id) {
            if !existing.active {
                existing.push_status(height, true);
                info!(
                    "Re-trusted {} certificate {} at height {}",
                    expected,
                    ubic_crypto::short_hex(&cert.id, 16),
                    height
                );
            }
            return Ok(());
        }

        debug!(
            "Trusting {} certificate {}",
            expected,
            ubic_crypto::short_hex(&cert.id, 16)
        );
        self.tier_mut(expected).insert(cert.id.clone(), cert);
        Ok(())
    }

    /// The DSC with its issuing CSCA and root; `None` if any link is unknown
    pub fn trust_chain(&self, dsc_id: &[u8]) -> Option<TrustChain<'_>> {
        let dsc = self.dsc(dsc_id)?;
        let csca = self.csca(&dsc.issuer_id)?;
        let root = self.root(&csca.issuer_id)?;
        Some(TrustChain::new(dsc, csca, root))
    }

    /// Full chain check for a DSC at `height` / `timestamp`.
    ///
    /// `CertificateNotFound` if the DSC is unknown; `CertificateNotTrusted` if
    /// any link is inactive, expired, missing or carries a bad signature.
    pub fn verify_chain(
        &self,
        dsc_id: &[u8],
        height: u64,
        timestamp: u64,
    ) -> Result<&Certificate, ValidationError> {
        let dsc = self.dsc(dsc_id).ok_or(ValidationError::CertificateNotFound)?;
        let usable = |c: &Certificate| c.is_active_at(height) && !c.is_expired(timestamp);

        if !usable(dsc) {
            return Err(ValidationError::CertificateNotTrusted);
        }
        let csca = self
            .csca(&dsc.issuer_id)
            .ok_or(ValidationError::CertificateNotTrusted)?;
        if !usable(csca) || !dsc.verify_issued_by(&csca.public_key) {
            return Err(ValidationError::CertificateNotTrusted);
        }
        let root = self
            .root(&csca.issuer_id)
            .ok_or(ValidationError::CertificateNotTrusted)?;
        if !usable(root) || !csca.verify_issued_by(&root.public_key) {
            return Err(ValidationError::CertificateNotTrusted);
        }
        Ok(dsc)
    }

    /// Append an inactive transition at `height` and bump the nonce
    pub fn deactivate(
        &mut self,
        cert_type: CertType,
        id: &[u8],
        height: u64,
    ) -> Result<(), ValidationError> {
        let cert = self
            .tier_mut(cert_type)
            .get_mut(id)
            .ok_or(ValidationError::CertificateNotFound)?;
        cert.push_status(height, false);
        cert.nonce += 1;
        info!(
            "Deactivated {} certificate {} at height {}",
            cert_type,
            ubic_crypto::short_hex(id, 16),
            height
        );
        Ok(())
    }

    /// Apply the certificate part of a validated effect. The nonce is
    /// re-checked so effects computed against a stale snapshot are refused.
    pub fn apply(&mut self, effects: &Effects) -> Result<(), ValidationError> {
        if let Effects::DeactivateCertificate {
            cert_type,
            cert_id,
            expected_nonce,
            height,
        } = effects
        {
            let cert = self
                .get(*cert_type, cert_id)
                .ok_or(ValidationError::CertificateNotFound)?;
            if cert.nonce != *expected_nonce {
                return Err(ValidationError::StaleNonce {
                    expected: cert.nonce,
                    got: *expected_nonce,
                });
            }
            self.deactivate(*cert_type, cert_id, *height)?;
        }
        Ok(())
    }
}
