// Copyright 2022 Adobe. All rights reserved.
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

//! Status codes for conditions identified while validating and distributing
//! ePassport PKI objects (CSCA/DSC certificates and CRLs).
//!
//! Every code used by the `pkd` crate is defined here so that callers can
//! match on stable strings rather than on message text.

use crate::LogKind;

// -- success codes --

/// The certificate's signature verified against its issuer's public key.
pub const CERTIFICATE_SIGNATURE_VALIDATED: &str = "certificate.signature.validated";

/// The certificate is inside its validity window.
pub const CERTIFICATE_INSIDE_VALIDITY: &str = "certificate.insideValidity";

/// The certificate's basic-constraints and key-usage extensions match its
/// declared type (CSCA or DSC).
pub const CERTIFICATE_CONSTRAINTS_SATISFIED: &str = "certificate.constraints.satisfied";

/// A complete trust chain was built from the certificate to a self-signed
/// trust anchor.
pub const TRUST_CHAIN_COMPLETE: &str = "trustChain.complete";

/// The issuer's CRL was consulted and the certificate's serial number was not
/// listed.
pub const CRL_NOT_REVOKED: &str = "certificate.crl.notRevoked";

/// The CRL's own validity window (thisUpdate/nextUpdate) covers the current
/// time.
pub const CRL_INSIDE_VALIDITY: &str = "crl.insideValidity";

/// A distribution batch was stored in the directory.
pub const DISTRIBUTION_BATCH_STORED: &str = "distribution.batch.stored";

// -- informational codes --

/// The issuer's CRL could not be found or fetched.
///
/// Under the fail-open revocation policy the certificate is treated as not
/// revoked, but this code keeps "assumed clean" distinct from "confirmed
/// clean".
pub const CRL_UNAVAILABLE: &str = "certificate.crl.unavailable";

/// Fetching the issuer's CRL exceeded the configured timeout.
///
/// Treated like [`CRL_UNAVAILABLE`] under the fail-open revocation policy.
pub const CRL_FETCH_TIMEOUT: &str = "certificate.crl.fetchTimeout";

/// The CRL's nextUpdate time has elapsed; the list may be stale.
pub const CRL_STALE: &str = "crl.nextUpdateElapsed";

/// The terminal certificate of a chain is not CA-capable
/// (basic constraints CA is not asserted).
pub const TRUST_ANCHOR_NOT_CA_CAPABLE: &str = "trustChain.anchor.notCaCapable";

/// The terminal certificate of a chain is not self-signed.
pub const TRUST_ANCHOR_NOT_SELF_SIGNED: &str = "trustChain.anchor.notSelfSigned";

/// A distribution batch id had already been processed; the redelivery was a
/// recorded no-op.
pub const DISTRIBUTION_BATCH_DUPLICATE: &str = "distribution.batch.duplicate";

// -- failure codes --

/// The certificate's signature did not verify against its issuer's public
/// key.
pub const SIGNATURE_INVALID: &str = "certificate.signature.mismatch";

/// The certificate's notAfter time is in the past.
pub const CERTIFICATE_EXPIRED: &str = "certificate.expired";

/// The certificate's notBefore time is in the future.
pub const CERTIFICATE_NOT_YET_VALID: &str = "certificate.notYetValid";

/// The certificate's basic-constraints or key-usage extensions do not match
/// its declared type.
pub const CONSTRAINTS_VIOLATED: &str = "certificate.constraints.violated";

/// The issuer's CRL lists the certificate's serial number.
pub const CERTIFICATE_REVOKED: &str = "certificate.revoked";

/// No stored certificate has a subject DN equal to the current issuer DN;
/// the chain is incomplete.
pub const ISSUER_NOT_FOUND: &str = "trustChain.issuerNotFound";

/// Chain building stopped because the configured maximum depth was reached
/// before a self-signed certificate was found.
pub const MAX_DEPTH_EXCEEDED: &str = "trustChain.maxDepthExceeded";

/// A structurally valid chain terminated in an anchor from a different
/// country than the one required by the caller.
pub const TRUST_ANCHOR_NOT_FOUND: &str = "trustChain.anchorNotFound";

/// Chain building produced no links; the starting certificate could not be
/// loaded.
pub const EMPTY_CHAIN: &str = "trustChain.empty";

/// A CRL's issuer is not known to the certificate store.
pub const CRL_ISSUER_UNKNOWN: &str = "crl.issuerUnknown";

/// A single object failed to upload to the directory store.
pub const DISTRIBUTION_ITEM_FAILED: &str = "distribution.item.failed";

/// The certificate or CRL store was unreachable; the surrounding operation
/// was aborted.
pub const STORE_UNAVAILABLE: &str = "store.unavailable";

/// Returns the [`LogKind`] conventionally associated with a status code from
/// this module.
pub fn log_kind(code: &str) -> LogKind {
    match code {
        CERTIFICATE_SIGNATURE_VALIDATED
        | CERTIFICATE_INSIDE_VALIDITY
        | CERTIFICATE_CONSTRAINTS_SATISFIED
        | TRUST_CHAIN_COMPLETE
        | CRL_NOT_REVOKED
        | CRL_INSIDE_VALIDITY
        | DISTRIBUTION_BATCH_STORED => LogKind::Success,

        CRL_UNAVAILABLE
        | CRL_FETCH_TIMEOUT
        | CRL_STALE
        | TRUST_ANCHOR_NOT_CA_CAPABLE
        | TRUST_ANCHOR_NOT_SELF_SIGNED
        | DISTRIBUTION_BATCH_DUPLICATE => LogKind::Informational,

        _ => LogKind::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_kind_classification() {
        assert_eq!(log_kind(CERTIFICATE_SIGNATURE_VALIDATED), LogKind::Success);
        assert_eq!(log_kind(CRL_UNAVAILABLE), LogKind::Informational);
        assert_eq!(log_kind(SIGNATURE_INVALID), LogKind::Failure);
        assert_eq!(log_kind("no.such.code"), LogKind::Failure);
    }
}
