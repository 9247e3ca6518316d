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

//! Extracted certificate revocation list records.
//!
//! Like certificates, CRLs are parsed upstream; this crate reads them and
//! never modifies them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certificate::{DistinguishedName, UploadId};

/// Identifies a CRL record. Assigned upstream during extraction.
pub type CrlId = String;

/// Reason a certificate was revoked, per RFC 5280 §5.3.1.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CrlReasonCode {
    /// No reason given.
    Unspecified,

    /// The subject's private key is suspected compromised.
    KeyCompromise,

    /// The issuing CA's private key is suspected compromised.
    CaCompromise,

    /// The subject's affiliation has changed.
    AffiliationChanged,

    /// The certificate has been superseded.
    Superseded,

    /// The certificate is no longer needed.
    CessationOfOperation,

    /// The certificate is on hold.
    CertificateHold,

    /// The certificate was removed from a CRL it appeared on.
    RemoveFromCrl,

    /// A privilege contained in the certificate was withdrawn.
    PrivilegeWithdrawn,

    /// The attribute authority's key is suspected compromised.
    AaCompromise,
}

impl CrlReasonCode {
    /// Maps an RFC 5280 reason-code integer to a `CrlReasonCode`.
    ///
    /// Unknown values fall back to `Unspecified`.
    pub fn from_rfc5280(code: u8) -> Self {
        match code {
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => Self::Unspecified,
        }
    }
}

/// One revoked-serial entry in a CRL.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RevokedEntry {
    /// Serial number of the revoked certificate, big-endian.
    pub serial_number: Vec<u8>,

    /// When the certificate was revoked.
    pub revocation_date: DateTime<Utc>,

    /// Why the certificate was revoked.
    pub reason: CrlReasonCode,
}

/// An extracted certificate revocation list record.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CertificateRevocationList {
    /// Record id.
    pub id: CrlId,

    /// Upload this record was extracted from.
    pub upload_id: UploadId,

    /// Issuer distinguished name.
    pub issuer: DistinguishedName,

    /// Issuer country code (ISO 3166-1 alpha-2).
    pub issuer_country: String,

    /// When this CRL was issued.
    pub this_update: DateTime<Utc>,

    /// When the next CRL is expected, if the issuer declared one.
    pub next_update: Option<DateTime<Utc>>,

    /// Revoked-serial entries.
    pub entries: Vec<RevokedEntry>,
}

impl CertificateRevocationList {
    /// Returns the entry for `serial_number`, if this CRL lists it.
    pub fn entry_for_serial(&self, serial_number: &[u8]) -> Option<&RevokedEntry> {
        self.entries
            .iter()
            .find(|entry| entry.serial_number == serial_number)
    }

    /// Returns `true` if the declared nextUpdate time has elapsed.
    pub fn is_stale_at(&self, at: DateTime<Utc>) -> bool {
        match self.next_update {
            Some(next_update) => next_update < at,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use chrono::TimeDelta;

    use super::*;

    fn crl_with_serial(serial: Vec<u8>) -> CertificateRevocationList {
        CertificateRevocationList {
            id: "crl-1".to_string(),
            upload_id: "upload-1".to_string(),
            issuer: DistinguishedName::new("CN=CSCA Utopia, C=UT"),
            issuer_country: "UT".to_string(),
            this_update: Utc::now() - TimeDelta::days(1),
            next_update: Some(Utc::now() + TimeDelta::days(13)),
            entries: vec![RevokedEntry {
                serial_number: serial,
                revocation_date: Utc::now() - TimeDelta::hours(6),
                reason: CrlReasonCode::KeyCompromise,
            }],
        }
    }

    #[test]
    fn entry_lookup_by_serial() {
        let crl = crl_with_serial(vec![1, 2, 3]);

        assert!(crl.entry_for_serial(&[1, 2, 3]).is_some());
        assert!(crl.entry_for_serial(&[9, 9]).is_none());
    }

    #[test]
    fn staleness_requires_declared_next_update() {
        let mut crl = crl_with_serial(vec![1]);
        assert!(!crl.is_stale_at(Utc::now()));

        crl.next_update = Some(Utc::now() - TimeDelta::days(1));
        assert!(crl.is_stale_at(Utc::now()));

        crl.next_update = None;
        assert!(!crl.is_stale_at(Utc::now()));
    }

    #[test]
    fn unknown_reason_codes_fall_back() {
        assert_eq!(CrlReasonCode::from_rfc5280(7), CrlReasonCode::Unspecified);
        assert_eq!(CrlReasonCode::from_rfc5280(1), CrlReasonCode::KeyCompromise);
    }
}
