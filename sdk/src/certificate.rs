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

//! Extracted certificate records.
//!
//! Parsing of raw LDIF/CMS material into these records happens upstream;
//! this crate receives the already-extracted form and never re-parses the
//! DER bytes it carries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::raw_signature::SigningAlg;

/// Identifies a certificate record. Assigned upstream during extraction.
pub type CertificateId = String;

/// Identifies the upload (bulk master list or incremental feed submission)
/// an object was extracted from.
pub type UploadId = String;

/// The role a certificate plays in the ePassport PKI.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CertificateType {
    /// Country Signing Certificate Authority: the self-signed trust anchor
    /// for a country.
    Csca,

    /// Document Signer Certificate: signs travel-document data; issued by a
    /// CSCA.
    Dsc,

    /// Document Signer Certificate from a non-conformant source.
    DscNc,
}

impl CertificateType {
    /// Returns `true` for the DSC variants.
    pub fn is_document_signer(&self) -> bool {
        matches!(self, Self::Dsc | Self::DscNc)
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csca => write!(f, "CSCA"),
            Self::Dsc => write!(f, "DSC"),
            Self::DscNc => write!(f, "DSC_NC"),
        }
    }
}

/// Validation status of a certificate record.
///
/// Every record starts as `Extracted`; only validation mutates the status,
/// and nothing in this crate deletes a record.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CertificateStatus {
    /// Extracted upstream, not yet validated.
    Extracted,

    /// All enabled checks passed.
    Valid,

    /// A signature or constraints check failed.
    Invalid,

    /// The certificate's notAfter time is in the past.
    Expired,

    /// The certificate's notBefore time is in the future.
    NotYetValid,

    /// The issuer's CRL lists this certificate's serial number.
    Revoked,
}

/// Where a certificate record came from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CertificateOrigin {
    /// Extracted from a bulk ICAO master list.
    MasterList,

    /// Extracted from an incremental feed submission.
    IncrementalFeed,
}

/// An X.509 distinguished name as received from an upstream producer.
///
/// Different producers (bulk master lists vs. incremental feeds) format the
/// same DN with drifting whitespace and attribute-type casing, so equality
/// and hashing use a canonical comparison key: attribute types are
/// uppercased and whitespace around the `=` and `,` separators is trimmed.
/// Attribute *values* keep their case. The original string is retained for
/// display and directory-entry naming.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub struct DistinguishedName {
    raw: String,
    key: String,
}

impl DistinguishedName {
    /// Wraps a DN string, computing its comparison key.
    pub fn new<S: Into<String>>(raw: S) -> Self {
        let raw = raw.into();
        let key = canonical_dn_key(&raw);
        Self { raw, key }
    }

    /// Returns the DN exactly as the producer formatted it.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the canonical comparison key.
    pub fn comparison_key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DistinguishedName {}

impl std::hash::Hash for DistinguishedName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for DistinguishedName {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<DistinguishedName> for String {
    fn from(dn: DistinguishedName) -> Self {
        dn.raw
    }
}

impl From<&str> for DistinguishedName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

fn canonical_dn_key(raw: &str) -> String {
    raw.split(',')
        .map(|rdn| match rdn.split_once('=') {
            Some((attr, value)) => {
                format!("{}={}", attr.trim().to_ascii_uppercase(), value.trim())
            }
            None => rdn.trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Key-usage flags extracted from the certificate's keyUsage extension.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyUsage {
    /// digitalSignature bit.
    pub digital_signature: bool,

    /// keyCertSign bit.
    pub key_cert_sign: bool,

    /// cRLSign bit.
    pub crl_sign: bool,
}

/// An extracted certificate record.
///
/// All byte fields are carried opaquely: `tbs_der` and `signature` exist so
/// that signature verification can delegate to a raw-signature validator
/// without this crate parsing `der`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Certificate {
    /// Record id.
    pub id: CertificateId,

    /// Upload this record was extracted from.
    pub upload_id: UploadId,

    /// Complete certificate in DER format.
    pub der: Vec<u8>,

    /// To-be-signed portion of the certificate in DER format.
    pub tbs_der: Vec<u8>,

    /// Raw signature bytes over `tbs_der`.
    pub signature: Vec<u8>,

    /// Algorithm used to produce `signature`.
    pub signature_alg: SigningAlg,

    /// Subject public key info in DER format.
    pub public_key_der: Vec<u8>,

    /// Serial number, big-endian.
    pub serial_number: Vec<u8>,

    /// SHA-256 fingerprint of `der`.
    pub fingerprint: Vec<u8>,

    /// Subject distinguished name.
    pub subject: DistinguishedName,

    /// Subject country code (ISO 3166-1 alpha-2).
    pub subject_country: String,

    /// Issuer distinguished name.
    pub issuer: DistinguishedName,

    /// Issuer country code (ISO 3166-1 alpha-2).
    pub issuer_country: String,

    /// Start of the validity window.
    pub not_before: DateTime<Utc>,

    /// End of the validity window.
    pub not_after: DateTime<Utc>,

    /// Declared certificate type.
    pub certificate_type: CertificateType,

    /// Current validation status.
    pub status: CertificateStatus,

    /// Which kind of submission produced this record.
    pub origin: CertificateOrigin,

    /// `true` if the basicConstraints extension asserts CA.
    pub basic_constraints_ca: bool,

    /// pathLenConstraint from the basicConstraints extension, if present.
    pub path_len_constraint: Option<u32>,

    /// Key-usage flags.
    pub key_usage: KeyUsage,
}

impl Certificate {
    /// Returns `true` if subject and issuer DN are equal under the canonical
    /// comparison rule.
    ///
    /// This is the trust-anchor criterion: a certificate is a trust-anchor
    /// candidate iff it is self-signed in this sense.
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }

    /// Serial number as lowercase hex, for display and CRL matching logs.
    pub fn serial_hex(&self) -> String {
        hex::encode(&self.serial_number)
    }

    /// Fingerprint as lowercase hex.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(&self.fingerprint)
    }

    /// Returns `true` if `at` falls within the validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn dn_comparison_survives_producer_drift() {
        let bulk = DistinguishedName::new("CN=CSCA Utopia, O=Ministry of Interior, C=UT");
        let feed = DistinguishedName::new("cn=CSCA Utopia,o=Ministry of Interior,c=UT");

        assert_eq!(bulk, feed);
        assert_ne!(bulk.as_str(), feed.as_str());
    }

    #[test]
    fn dn_value_case_is_significant() {
        let a = DistinguishedName::new("CN=CSCA Utopia, C=UT");
        let b = DistinguishedName::new("CN=csca utopia, C=UT");

        assert_ne!(a, b);
    }

    #[test]
    fn serial_hex_display() {
        let dn = DistinguishedName::new("CN=X, C=UT");
        let cert = Certificate {
            id: "cert-1".to_string(),
            upload_id: "upload-1".to_string(),
            der: vec![],
            tbs_der: vec![],
            signature: vec![],
            signature_alg: SigningAlg::Es256,
            public_key_der: vec![],
            serial_number: vec![0x0a, 0xff],
            fingerprint: vec![],
            subject: dn.clone(),
            subject_country: "UT".to_string(),
            issuer: dn,
            issuer_country: "UT".to_string(),
            not_before: Utc::now(),
            not_after: Utc::now(),
            certificate_type: CertificateType::Csca,
            status: CertificateStatus::Extracted,
            origin: CertificateOrigin::MasterList,
            basic_constraints_ca: true,
            path_len_constraint: None,
            key_usage: KeyUsage::default(),
        };

        assert_eq!(cert.serial_hex(), "0aff");
        assert!(cert.is_self_signed());
    }
}
