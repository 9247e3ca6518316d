// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Query abstraction over previously extracted certificate and CRL records.
//!
//! Persistence mechanics live behind these traits; the in-memory
//! implementations here back the test suites and small deployments.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use thiserror::Error;

use crate::{
    certificate::{Certificate, CertificateStatus, DistinguishedName},
    crl::CertificateRevocationList,
};

/// Describes infrastructure-level store failures.
///
/// A `StoreError` aborts the operation that encountered it; it is never
/// attributed to a single object.
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unreachable: {0}")]
    Unavailable(String),
}

/// Read/update access to extracted certificate records.
pub trait CertificateStore: Send + Sync {
    /// Returns the certificate with this id, if present.
    fn certificate(&self, id: &str) -> Result<Option<Certificate>, StoreError>;

    /// Returns every certificate belonging to an upload.
    fn certificates_for_upload(&self, upload_id: &str) -> Result<Vec<Certificate>, StoreError>;

    /// Returns all certificates whose subject DN equals `subject` under the
    /// canonical comparison rule.
    ///
    /// Candidates are returned in deterministic issuer-selection order:
    /// CA-capable first, then latest `not_before`, then smallest id. Chain
    /// building takes the first entry.
    fn find_by_subject(&self, subject: &DistinguishedName)
        -> Result<Vec<Certificate>, StoreError>;

    /// Persists a new validation status for the certificate with this id.
    fn update_status(&self, id: &str, status: CertificateStatus) -> Result<(), StoreError>;
}

/// Read access to extracted CRL records.
pub trait CrlStore: Send + Sync {
    /// Returns every CRL belonging to an upload.
    fn crls_for_upload(
        &self,
        upload_id: &str,
    ) -> Result<Vec<CertificateRevocationList>, StoreError>;

    /// Returns the CRL issued by `issuer`, if one is stored.
    ///
    /// When several CRLs share an issuer, the one with the latest
    /// `this_update` wins.
    fn crl_for_issuer(
        &self,
        issuer: &DistinguishedName,
    ) -> Result<Option<CertificateRevocationList>, StoreError>;
}

/// Orders issuer candidates deterministically: CA-capable first, then latest
/// `not_before`, then smallest id.
pub(crate) fn issuer_candidate_order(a: &Certificate, b: &Certificate) -> std::cmp::Ordering {
    b.basic_constraints_ca
        .cmp(&a.basic_constraints_ca)
        .then(b.not_before.cmp(&a.not_before))
        .then(a.id.cmp(&b.id))
}

/// `HashMap`-backed [`CertificateStore`].
///
/// `set_available(false)` makes every call fail with
/// [`StoreError::Unavailable`], which the test suites use to exercise the
/// abort path.
#[derive(Debug)]
pub struct MemoryCertificateStore {
    certificates: Mutex<HashMap<String, Certificate>>,
    available: AtomicBool,
}

impl Default for MemoryCertificateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCertificateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            certificates: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Adds or replaces a certificate record.
    pub fn insert(&self, certificate: Certificate) {
        self.locked().insert(certificate.id.clone(), certificate);
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, Certificate>> {
        self.certificates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates the store going down (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "memory certificate store marked unavailable".to_string(),
            ))
        }
    }
}

impl CertificateStore for MemoryCertificateStore {
    fn certificate(&self, id: &str) -> Result<Option<Certificate>, StoreError> {
        self.check_available()?;
        Ok(self.locked().get(id).cloned())
    }

    fn certificates_for_upload(&self, upload_id: &str) -> Result<Vec<Certificate>, StoreError> {
        self.check_available()?;

        let mut certs: Vec<Certificate> = self
            .locked()
            .values()
            .filter(|cert| cert.upload_id == upload_id)
            .cloned()
            .collect();

        certs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(certs)
    }

    fn find_by_subject(
        &self,
        subject: &DistinguishedName,
    ) -> Result<Vec<Certificate>, StoreError> {
        self.check_available()?;

        let mut candidates: Vec<Certificate> = self
            .locked()
            .values()
            .filter(|cert| &cert.subject == subject)
            .cloned()
            .collect();

        candidates.sort_by(issuer_candidate_order);
        Ok(candidates)
    }

    fn update_status(&self, id: &str, status: CertificateStatus) -> Result<(), StoreError> {
        self.check_available()?;

        if let Some(cert) = self.locked().get_mut(id) {
            cert.status = status;
        }
        Ok(())
    }
}

/// `HashMap`-backed [`CrlStore`].
#[derive(Debug)]
pub struct MemoryCrlStore {
    crls: Mutex<HashMap<String, CertificateRevocationList>>,
    available: AtomicBool,
}

impl Default for MemoryCrlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCrlStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            crls: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Adds or replaces a CRL record.
    pub fn insert(&self, crl: CertificateRevocationList) {
        self.locked().insert(crl.id.clone(), crl);
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<String, CertificateRevocationList>> {
        self.crls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates the store going down (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(
                "memory CRL store marked unavailable".to_string(),
            ))
        }
    }
}

impl CrlStore for MemoryCrlStore {
    fn crls_for_upload(
        &self,
        upload_id: &str,
    ) -> Result<Vec<CertificateRevocationList>, StoreError> {
        self.check_available()?;

        let mut crls: Vec<CertificateRevocationList> = self
            .locked()
            .values()
            .filter(|crl| crl.upload_id == upload_id)
            .cloned()
            .collect();

        crls.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(crls)
    }

    fn crl_for_issuer(
        &self,
        issuer: &DistinguishedName,
    ) -> Result<Option<CertificateRevocationList>, StoreError> {
        self.check_available()?;

        Ok(self
            .locked()
            .values()
            .filter(|crl| &crl.issuer == issuer)
            .max_by_key(|crl| crl.this_update)
            .cloned())
    }
}
