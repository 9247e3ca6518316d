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

//! Directory store collaborator.
//!
//! The directory wire protocol itself is downstream; this crate computes
//! where an object belongs and hands it over, one attempt per object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    certificate::{Certificate, CertificateType},
    crl::CertificateRevocationList,
};

/// Where a published object is filed in the directory tree.
///
/// CSCA and DSC certificates are placed differently on purpose: passport
/// verification clients search anchors and document signers separately.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntryLocation {
    /// Base location supplied by the caller (deployment-specific suffix).
    pub base: String,

    /// Organizational unit under the base, derived from the object type.
    pub unit: String,

    /// Country under the unit (ISO 3166-1 alpha-2).
    pub country: String,
}

impl EntryLocation {
    /// Computes the location for a certificate.
    pub fn for_certificate(base: &str, cert: &Certificate) -> Self {
        let unit = match cert.certificate_type {
            CertificateType::Csca => "o=csca",
            CertificateType::Dsc | CertificateType::DscNc => "o=dsc",
        };

        Self {
            base: base.to_string(),
            unit: unit.to_string(),
            country: cert.subject_country.clone(),
        }
    }

    /// Computes the location for a CRL.
    pub fn for_crl(base: &str, crl: &CertificateRevocationList) -> Self {
        Self {
            base: base.to_string(),
            unit: "o=crl".to_string(),
            country: crl.issuer_country.clone(),
        }
    }
}

impl std::fmt::Display for EntryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},c={},{}", self.unit, self.country, self.base)
    }
}

/// Result of publishing one object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PublishOutcome {
    /// The object was stored.
    Stored,

    /// An identical entry already existed; nothing was written.
    DuplicateSkipped,
}

/// Describes errors returned by a directory store.
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum DirectoryError {
    /// The store rejected this object.
    #[error("directory rejected the object: {0}")]
    Rejected(String),

    /// The store could not be reached at all. Unlike [`Rejected`], this is
    /// an infrastructure failure and fails the chunk submission rather than
    /// the single object.
    ///
    /// [`Rejected`]: Self::Rejected
    #[error("directory unreachable: {0}")]
    Unavailable(String),
}

/// Accepts validated objects for publication.
///
/// One call per object, one attempt per call; retry policy (if any) is the
/// caller's business and this crate performs none.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Publishes one certificate at the computed location.
    async fn publish_certificate(
        &self,
        cert: &Certificate,
        location: &EntryLocation,
    ) -> Result<PublishOutcome, DirectoryError>;

    /// Publishes one CRL at the computed location.
    async fn publish_crl(
        &self,
        crl: &CertificateRevocationList,
        location: &EntryLocation,
    ) -> Result<PublishOutcome, DirectoryError>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;

    use super::*;
    use crate::{
        certificate::{
            CertificateOrigin, CertificateStatus, DistinguishedName, KeyUsage,
        },
        raw_signature::SigningAlg,
    };

    fn cert_of_type(certificate_type: CertificateType) -> Certificate {
        let dn = DistinguishedName::new("CN=X, C=UT");
        Certificate {
            id: "cert-1".to_string(),
            upload_id: "upload-1".to_string(),
            der: vec![],
            tbs_der: vec![],
            signature: vec![],
            signature_alg: SigningAlg::Es256,
            public_key_der: vec![],
            serial_number: vec![1],
            fingerprint: vec![],
            subject: dn.clone(),
            subject_country: "UT".to_string(),
            issuer: dn,
            issuer_country: "UT".to_string(),
            not_before: Utc::now(),
            not_after: Utc::now(),
            certificate_type,
            status: CertificateStatus::Valid,
            origin: CertificateOrigin::MasterList,
            basic_constraints_ca: false,
            path_len_constraint: None,
            key_usage: KeyUsage::default(),
        }
    }

    #[test]
    fn csca_and_dsc_are_placed_differently() {
        let base = "dc=data,dc=pkd";

        let csca = EntryLocation::for_certificate(base, &cert_of_type(CertificateType::Csca));
        let dsc = EntryLocation::for_certificate(base, &cert_of_type(CertificateType::Dsc));
        let dsc_nc = EntryLocation::for_certificate(base, &cert_of_type(CertificateType::DscNc));

        assert_eq!(csca.to_string(), "o=csca,c=UT,dc=data,dc=pkd");
        assert_eq!(dsc.to_string(), "o=dsc,c=UT,dc=data,dc=pkd");
        assert_eq!(dsc.unit, dsc_nc.unit);
        assert_ne!(csca.unit, dsc.unit);
    }
}
