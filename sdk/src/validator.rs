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

//! Per-certificate checks.
//!
//! Verifies an individual certificate against the profile expected of its
//! declared type: signature over the to-be-signed bytes, validity window,
//! and basic-constraints/key-usage rules. Chain construction and revocation
//! are separate concerns (see [`trust_chain`] and [`revocation`]).
//!
//! [`trust_chain`]: crate::trust_chain
//! [`revocation`]: crate::revocation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pkd_status_tracker::{log_item, validation_codes::*, StatusTracker};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    certificate::{Certificate, CertificateStatus, CertificateType},
    raw_signature,
    store::CertificateStore,
    Error, Result,
};

/// Selects which checks [`CertificateValidator::validate`] runs.
///
/// At least one flag must be set; an all-false value is malformed input.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CheckFlags {
    /// Verify the signature against the issuer's public key.
    pub signature: bool,

    /// Check `notBefore <= now <= notAfter`.
    pub validity_period: bool,

    /// Check basic-constraints and key-usage against the declared type.
    pub constraints: bool,
}

impl CheckFlags {
    /// All checks enabled.
    pub fn all() -> Self {
        Self {
            signature: true,
            validity_period: true,
            constraints: true,
        }
    }

    /// Returns `true` if no check is enabled.
    pub fn is_empty(&self) -> bool {
        !(self.signature || self.validity_period || self.constraints)
    }
}

impl Default for CheckFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Describes errors identified while checking a single certificate.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// The signature did not verify against the issuer's public key.
    #[error("the certificate signature did not verify")]
    SignatureInvalid,

    /// The certificate's notAfter time is in the past.
    #[error("the certificate has expired")]
    Expired,

    /// The certificate's notBefore time is in the future.
    #[error("the certificate is not yet valid")]
    NotYetValid,

    /// Basic-constraints or key-usage do not match the declared type.
    #[error("the certificate violates constraints for its type: {0}")]
    ConstraintsViolated(String),

    /// The certificate's serial number appears on the issuer's CRL.
    #[error("the certificate has been revoked by its issuer")]
    Revoked,
}

/// Outcome of checking one certificate.
///
/// Each enabled check reports `Some(passed)`; disabled checks stay `None`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CertificateCheckOutcome {
    /// Signature check result, if enabled.
    pub signature_valid: Option<bool>,

    /// Validity-window check result, if enabled.
    pub validity_period_valid: Option<bool>,

    /// Constraints check result, if enabled.
    pub constraints_valid: Option<bool>,

    /// Overall classification: [`CertificateStatus::Valid`] when every
    /// enabled check passed, otherwise driven by the first failing check.
    pub status: CertificateStatus,
}

impl CertificateCheckOutcome {
    /// Returns `true` when every enabled check passed.
    pub fn all_passed(&self) -> bool {
        self.status == CertificateStatus::Valid
    }
}

/// Runs per-certificate checks against a certificate store.
pub struct CertificateValidator {
    store: Arc<dyn CertificateStore>,
}

impl CertificateValidator {
    /// Creates a validator backed by `store`.
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self { store }
    }

    /// Checks the certificate with id `certificate_id`.
    ///
    /// Returns `Err` only for malformed input (unknown id, empty check set)
    /// or store-level failures. Check findings land in `validation_log` and
    /// in the returned outcome; callers persist any status change.
    pub fn validate(
        &self,
        certificate_id: &str,
        checks: CheckFlags,
        validation_log: &mut StatusTracker,
    ) -> Result<CertificateCheckOutcome> {
        if checks.is_empty() {
            return Err(Error::BadParam(
                "at least one check must be enabled".to_string(),
            ));
        }

        let Some(cert) = self.store.certificate(certificate_id)? else {
            return Err(Error::CertificateMissing {
                id: certificate_id.to_string(),
            });
        };

        self.validate_record(&cert, checks, Utc::now(), validation_log)
    }

    /// Checks an already-loaded certificate record at a given instant.
    ///
    /// Returns `Err` only for store-level failures during the issuer
    /// lookup; an absent issuer is a finding against the certificate, an
    /// unreachable store is not.
    pub(crate) fn validate_record(
        &self,
        cert: &Certificate,
        checks: CheckFlags,
        now: DateTime<Utc>,
        validation_log: &mut StatusTracker,
    ) -> Result<CertificateCheckOutcome> {
        let signature_valid = if checks.signature {
            Some(self.check_signature(cert, validation_log)?)
        } else {
            None
        };

        let validity_period_valid = if checks.validity_period {
            Some(check_validity_period(cert, now, validation_log))
        } else {
            None
        };

        let constraints_valid = if checks.constraints {
            Some(check_constraints(cert, validation_log))
        } else {
            None
        };

        // First failing check drives the classification.
        let status = if signature_valid == Some(false) {
            CertificateStatus::Invalid
        } else if validity_period_valid == Some(false) {
            if cert.not_before > now {
                CertificateStatus::NotYetValid
            } else {
                CertificateStatus::Expired
            }
        } else if constraints_valid == Some(false) {
            CertificateStatus::Invalid
        } else {
            CertificateStatus::Valid
        };

        Ok(CertificateCheckOutcome {
            signature_valid,
            validity_period_valid,
            constraints_valid,
            status,
        })
    }

    fn check_signature(
        &self,
        cert: &Certificate,
        validation_log: &mut StatusTracker,
    ) -> Result<bool> {
        // Self-signed certificates verify against their own key; everything
        // else needs its issuer present in the store. A store failure here is
        // an infrastructure problem and must not be mistaken for a missing
        // issuer.
        let issuer_key = if cert.is_self_signed() {
            Some(cert.public_key_der.clone())
        } else {
            self.store
                .find_by_subject(&cert.issuer)?
                .into_iter()
                .next()
                .map(|c| c.public_key_der)
        };

        let Some(issuer_key) = issuer_key else {
            log_item!(
                cert.id.clone(),
                format!("issuer not available to verify signature: {}", cert.issuer),
                "check_signature"
            )
            .validation_status(SIGNATURE_INVALID)
            .failure_no_throw(validation_log, ValidationError::SignatureInvalid);

            return Ok(false);
        };

        Ok(match raw_signature::validate_with_alg(
            cert.signature_alg,
            &cert.signature,
            &cert.tbs_der,
            &issuer_key,
        ) {
            Ok(()) => {
                log_item!(cert.id.clone(), "signature validated", "check_signature")
                    .validation_status(CERTIFICATE_SIGNATURE_VALIDATED)
                    .success(validation_log);
                true
            }
            Err(_) => {
                log_item!(
                    cert.id.clone(),
                    "signature did not verify",
                    "check_signature"
                )
                .validation_status(SIGNATURE_INVALID)
                .failure_no_throw(validation_log, ValidationError::SignatureInvalid);
                false
            }
        })
    }
}

fn check_validity_period(
    cert: &Certificate,
    now: DateTime<Utc>,
    validation_log: &mut StatusTracker,
) -> bool {
    if cert.is_valid_at(now) {
        log_item!(
            cert.id.clone(),
            "certificate inside validity window",
            "check_validity_period"
        )
        .validation_status(CERTIFICATE_INSIDE_VALIDITY)
        .success(validation_log);

        return true;
    }

    if cert.not_before > now {
        log_item!(
            cert.id.clone(),
            "certificate not yet valid",
            "check_validity_period"
        )
        .validation_status(CERTIFICATE_NOT_YET_VALID)
        .failure_no_throw(validation_log, ValidationError::NotYetValid);
    } else {
        log_item!(cert.id.clone(), "certificate expired", "check_validity_period")
            .validation_status(CERTIFICATE_EXPIRED)
            .failure_no_throw(validation_log, ValidationError::Expired);
    }

    false
}

fn check_constraints(cert: &Certificate, validation_log: &mut StatusTracker) -> bool {
    // ICAO Doc 9303 profile, reduced to what extraction preserves: a CSCA
    // is a CA that can sign certificates; a DSC is a non-CA that signs
    // document data.
    let violation = match cert.certificate_type {
        CertificateType::Csca => {
            if !cert.basic_constraints_ca {
                Some("CSCA must assert basic constraints CA".to_string())
            } else if !cert.key_usage.key_cert_sign {
                Some("CSCA must assert keyCertSign".to_string())
            } else {
                None
            }
        }
        CertificateType::Dsc | CertificateType::DscNc => {
            if cert.basic_constraints_ca {
                Some("DSC must not assert basic constraints CA".to_string())
            } else if !cert.key_usage.digital_signature {
                Some("DSC must assert digitalSignature".to_string())
            } else {
                None
            }
        }
    };

    match violation {
        None => {
            log_item!(
                cert.id.clone(),
                "constraints match declared type",
                "check_constraints"
            )
            .validation_status(CERTIFICATE_CONSTRAINTS_SATISFIED)
            .success(validation_log);
            true
        }
        Some(reason) => {
            log_item!(cert.id.clone(), reason.clone(), "check_constraints")
                .validation_status(CONSTRAINTS_VIOLATED)
                .failure_no_throw(validation_log, ValidationError::ConstraintsViolated(reason));
            false
        }
    }
}
