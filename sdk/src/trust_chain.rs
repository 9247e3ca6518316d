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

//! Trust-chain construction.
//!
//! Resolves the chain from an end-entity certificate up to a self-signed
//! trust anchor by repeatedly looking up the current issuer's subject DN in
//! the certificate store. The walk is an explicit worklist bounded by
//! `max_depth`; issuer graphs produced by malformed or hostile uploads can
//! contain cycles, and the depth bound is what contains them.

use std::sync::Arc;

use pkd_status_tracker::{log_item, validation_codes::*, StatusTracker};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    certificate::{Certificate, CertificateId, DistinguishedName},
    raw_signature,
    store::CertificateStore,
    Error, Result,
};

/// Range of depths [`TrustChainBuilder`] accepts.
pub const CHAIN_DEPTH_RANGE: std::ops::RangeInclusive<usize> = 1..=16;

/// One link in a trust chain, ordered leaf → root.
///
/// Links are ephemeral: they are reported to the caller and never
/// persisted.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TrustChainLink {
    /// Position in the chain; the leaf is level 1.
    pub level: usize,

    /// Certificate at this level.
    pub certificate_id: CertificateId,

    /// Certificate that signed this level, if resolved. The terminal anchor
    /// references itself.
    pub issuer_id: Option<CertificateId>,

    /// Whether this level's signature verified against the issuer's public
    /// key. `None` when no issuer was available to check against.
    pub signature_valid: Option<bool>,
}

/// Identifies the trust anchor a chain terminated in.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TrustAnchor {
    /// Certificate id of the anchor.
    pub certificate_id: CertificateId,

    /// Anchor subject DN.
    pub subject: DistinguishedName,

    /// Anchor country code.
    pub country: String,
}

/// How a chain walk ended.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ChainOutcome {
    /// The chain reached a self-signed terminal certificate.
    Complete,

    /// No stored certificate has a subject DN equal to this issuer DN.
    IssuerNotFound {
        /// The issuer DN that could not be resolved.
        missing_issuer: DistinguishedName,
    },

    /// The depth bound was reached before a self-signed certificate.
    MaxDepthExceeded,

    /// A structurally complete chain terminated in an anchor from a country
    /// other than the one the caller required.
    AnchorCountryMismatch {
        /// Country the caller required.
        required: String,

        /// Country the terminal anchor actually carries.
        found: String,
    },
}

/// Result of building a trust chain.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TrustChainReport {
    /// Links ordered leaf → root.
    pub links: Vec<TrustChainLink>,

    /// `true` when the chain is structurally complete and every link
    /// signature verified.
    pub chain_valid: bool,

    /// Number of links.
    pub chain_depth: usize,

    /// Terminal anchor, when the walk reached one.
    pub trust_anchor: Option<TrustAnchor>,

    /// How the walk ended.
    pub outcome: ChainOutcome,
}

/// Describes errors identified while building a trust chain.
///
/// These are recorded as log items on the chain report; they do not abort
/// the walk.
#[derive(Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ChainError {
    /// No stored certificate has a subject DN equal to the issuer DN.
    #[error("no stored certificate matches issuer: {0}")]
    IssuerNotFound(String),

    /// The depth bound was reached before a self-signed certificate.
    #[error("chain exceeded the maximum depth of {0}")]
    MaxDepthExceeded(usize),

    /// The terminal anchor's country does not satisfy the caller's
    /// requirement.
    #[error("trust anchor country {found} does not match required {required}")]
    AnchorCountryMismatch {
        /// Country the caller required.
        required: String,
        /// Country found on the anchor.
        found: String,
    },

    /// A link signature did not verify.
    #[error("link signature did not verify for certificate {0}")]
    LinkSignatureInvalid(String),
}

/// Builds trust chains against a certificate store.
pub struct TrustChainBuilder {
    store: Arc<dyn CertificateStore>,
    max_depth: usize,
}

impl TrustChainBuilder {
    /// Creates a builder with the given depth bound.
    ///
    /// Returns [`Error::BadParam`] if `max_depth` is outside
    /// [`CHAIN_DEPTH_RANGE`].
    pub fn new(store: Arc<dyn CertificateStore>, max_depth: usize) -> Result<Self> {
        if !CHAIN_DEPTH_RANGE.contains(&max_depth) {
            return Err(Error::BadParam(format!(
                "max chain depth must be in {:?}, got {max_depth}",
                CHAIN_DEPTH_RANGE
            )));
        }

        Ok(Self { store, max_depth })
    }

    /// Builds the chain from `certificate_id` toward a self-signed trust
    /// anchor.
    ///
    /// `required_anchor_country`, when given, must match the terminal
    /// anchor's country code for the chain to be accepted.
    ///
    /// Returns `Err` only for malformed input (unknown certificate id) or
    /// store-level failures; every per-link finding is recorded in
    /// `validation_log` and reflected in the report.
    pub fn build_chain(
        &self,
        certificate_id: &str,
        required_anchor_country: Option<&str>,
        validation_log: &mut StatusTracker,
    ) -> Result<TrustChainReport> {
        let Some(start) = self.store.certificate(certificate_id)? else {
            log_item!(
                certificate_id.to_string(),
                "certificate not found; no chain was built",
                "build_chain"
            )
            .validation_status(EMPTY_CHAIN)
            .failure_no_throw(validation_log, Error::CertificateMissing {
                id: certificate_id.to_string(),
            });

            return Err(Error::CertificateMissing {
                id: certificate_id.to_string(),
            });
        };

        let mut links: Vec<TrustChainLink> = Vec::new();
        let mut signatures_valid = true;
        let mut current = start;

        let (terminal, outcome) = loop {
            let level = links.len() + 1;

            // The depth bound counts the link the current certificate would
            // occupy, so a self-signed terminal past the bound still exceeds
            // the depth.
            if links.len() >= self.max_depth {
                log_item!(
                    current.id.clone(),
                    "maximum chain depth reached before completing the chain",
                    "build_chain"
                )
                .validation_status(MAX_DEPTH_EXCEEDED)
                .failure_no_throw(validation_log, ChainError::MaxDepthExceeded(self.max_depth));

                if !current.is_self_signed() {
                    log_item!(
                        current.id.clone(),
                        "chain walk ended on a certificate that is not self-signed",
                        "build_chain"
                    )
                    .validation_status(TRUST_ANCHOR_NOT_SELF_SIGNED)
                    .informational(validation_log);
                }

                break (None, ChainOutcome::MaxDepthExceeded);
            }

            if current.is_self_signed() {
                let signature_valid = self.verify_link(&current, &current, validation_log);
                signatures_valid &= signature_valid;

                links.push(TrustChainLink {
                    level,
                    certificate_id: current.id.clone(),
                    issuer_id: Some(current.id.clone()),
                    signature_valid: Some(signature_valid),
                });

                break (Some(current), ChainOutcome::Complete);
            }

            let candidates = self.store.find_by_subject(&current.issuer)?;
            let Some(issuer) = candidates.into_iter().next() else {
                log_item!(
                    current.id.clone(),
                    format!("issuer not found: {}", current.issuer),
                    "build_chain"
                )
                .validation_status(ISSUER_NOT_FOUND)
                .failure_no_throw(
                    validation_log,
                    ChainError::IssuerNotFound(current.issuer.to_string()),
                );

                log_item!(
                    current.id.clone(),
                    "chain walk ended on a certificate that is not self-signed",
                    "build_chain"
                )
                .validation_status(TRUST_ANCHOR_NOT_SELF_SIGNED)
                .informational(validation_log);

                links.push(TrustChainLink {
                    level,
                    certificate_id: current.id.clone(),
                    issuer_id: None,
                    signature_valid: None,
                });

                break (
                    None,
                    ChainOutcome::IssuerNotFound {
                        missing_issuer: current.issuer.clone(),
                    },
                );
            };

            let signature_valid = self.verify_link(&current, &issuer, validation_log);
            signatures_valid &= signature_valid;

            links.push(TrustChainLink {
                level,
                certificate_id: current.id.clone(),
                issuer_id: Some(issuer.id.clone()),
                signature_valid: Some(signature_valid),
            });

            current = issuer;
        };

        let chain_depth = links.len();
        let structurally_complete = matches!(outcome, ChainOutcome::Complete);

        let (trust_anchor, outcome) = match terminal {
            Some(terminal) => {
                // Soft checks: a terminal that is not CA-capable is suspect
                // but national practice varies, so these only warn.
                if !terminal.basic_constraints_ca {
                    log_item!(
                        terminal.id.clone(),
                        "terminal certificate does not assert basic constraints CA",
                        "build_chain"
                    )
                    .validation_status(TRUST_ANCHOR_NOT_CA_CAPABLE)
                    .informational(validation_log);
                }

                let anchor = TrustAnchor {
                    certificate_id: terminal.id.clone(),
                    subject: terminal.subject.clone(),
                    country: terminal.subject_country.clone(),
                };

                let outcome = match required_anchor_country {
                    Some(required) if !required.eq_ignore_ascii_case(&anchor.country) => {
                        log_item!(
                            terminal.id.clone(),
                            format!(
                                "trust anchor country {} does not match required {required}",
                                anchor.country
                            ),
                            "build_chain"
                        )
                        .validation_status(TRUST_ANCHOR_NOT_FOUND)
                        .failure_no_throw(
                            validation_log,
                            ChainError::AnchorCountryMismatch {
                                required: required.to_string(),
                                found: anchor.country.clone(),
                            },
                        );

                        ChainOutcome::AnchorCountryMismatch {
                            required: required.to_string(),
                            found: anchor.country.clone(),
                        }
                    }
                    _ => ChainOutcome::Complete,
                };

                (Some(anchor), outcome)
            }
            None => (None, outcome),
        };

        let chain_valid = structurally_complete
            && signatures_valid
            && matches!(outcome, ChainOutcome::Complete);

        if chain_valid {
            log_item!(
                links[0].certificate_id.clone(),
                format!("trust chain complete with {chain_depth} links"),
                "build_chain"
            )
            .validation_status(TRUST_CHAIN_COMPLETE)
            .success(validation_log);
        }

        Ok(TrustChainReport {
            links,
            chain_valid,
            chain_depth,
            trust_anchor,
            outcome,
        })
    }

    fn verify_link(
        &self,
        subject: &Certificate,
        issuer: &Certificate,
        validation_log: &mut StatusTracker,
    ) -> bool {
        match raw_signature::validate_with_alg(
            subject.signature_alg,
            &subject.signature,
            &subject.tbs_der,
            &issuer.public_key_der,
        ) {
            Ok(()) => true,
            Err(err) => {
                log_item!(
                    subject.id.clone(),
                    format!("signature did not verify against issuer {}", issuer.id),
                    "verify_link"
                )
                .validation_status(SIGNATURE_INVALID)
                .failure_no_throw(
                    validation_log,
                    ChainError::LinkSignatureInvalid(subject.id.clone()),
                );

                log::debug!(
                    "link signature failure for {}: {err}",
                    subject.id
                );
                false
            }
        }
    }
}
