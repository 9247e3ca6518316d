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

//! High-level command API.
//!
//! [`PkdEngine`] wires the stores, the validator, the chain builder, the
//! orchestrator, and the distribution pipeline together behind four
//! operations. Every response is a tagged enum naming its outcome; there
//! are no nullable-field result structs to probe.

use std::{
    sync::Arc,
    time::Instant,
};

use chrono::Utc;
use pkd_status_tracker::StatusTracker;
use serde::{Deserialize, Serialize};

use crate::{
    directory::DirectoryStore,
    distribution::{BatchDistributionPipeline, DistributionReport, Outbox, ProcessedBatchRegistry},
    orchestrator::{UploadOrchestrator, UploadValidationReport},
    progress::ProgressReporter,
    revocation::{CrlFetcher, RevocationChecker, RevocationStatus, StoreCrlFetcher},
    settings::Settings,
    store::{CertificateStore, CrlStore},
    trust_chain::{ChainOutcome, TrustChainBuilder, TrustChainReport},
    validator::{CertificateCheckOutcome, CertificateValidator, CheckFlags},
    Error, Result,
};

/// Response of [`PkdEngine::validate_certificate`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ValidateCertificateResponse {
    /// Every enabled check passed.
    Validated {
        /// Certificate that was checked.
        certificate_id: String,

        /// Per-check results.
        outcome: CertificateCheckOutcome,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },

    /// At least one enabled check failed.
    Rejected {
        /// Certificate that was checked.
        certificate_id: String,

        /// Per-check results; `status` names the failing classification.
        outcome: CertificateCheckOutcome,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },
}

/// Response of [`PkdEngine::verify_trust_chain`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum TrustChainResponse {
    /// The chain reached a trust anchor and every link signature verified.
    Complete {
        /// Links and anchor.
        report: TrustChainReport,

        /// Leaf revocation status, when revocation checking was requested.
        revocation: Option<RevocationStatus>,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },

    /// The chain could not be completed, or a link signature failed.
    Incomplete {
        /// Partial links and the terminating condition.
        report: TrustChainReport,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },

    /// A structurally complete chain ended in an anchor from the wrong
    /// country.
    AnchorCountryMismatch {
        /// Links and anchor.
        report: TrustChainReport,

        /// Country the caller required.
        required: String,

        /// Country the anchor actually carries.
        found: String,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },
}

/// Response of [`PkdEngine::validate_certificates_batch`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum BatchValidationResponse {
    /// Every item was processed; the valid set was committed for
    /// distribution.
    Completed {
        /// Per-type tallies.
        report: UploadValidationReport,

        /// Valid certificates as a fraction of all certificates, in
        /// percent. 100 when the upload held no certificates.
        success_rate: f64,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },

    /// An infrastructure failure stopped the batch; nothing was committed.
    Aborted {
        /// What went wrong.
        error: String,

        /// Wall-clock time the operation took.
        elapsed_ms: u64,
    },
}

/// Response of [`PkdEngine::distribute_validated`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DistributionResponse {
    /// Per-chunk reports and final state.
    pub report: DistributionReport,

    /// Wall-clock time the operation took.
    pub elapsed_ms: u64,
}

/// Entry point tying the toolkit's components together.
///
/// Collaborators are injected once; settings are snapshotted from the
/// current [`Settings`] when the engine is built.
pub struct PkdEngine {
    certificate_store: Arc<dyn CertificateStore>,
    outbox: Arc<Outbox>,
    registry: Arc<ProcessedBatchRegistry>,
    validator: CertificateValidator,
    revocation: RevocationChecker,
    orchestrator: UploadOrchestrator,
    pipeline: BatchDistributionPipeline,
    max_chain_depth: usize,
}

impl PkdEngine {
    /// Builds an engine over the given stores and collaborators.
    ///
    /// CRLs are fetched from `crl_store`; use [`PkdEngine::with_fetcher`]
    /// to substitute a different [`CrlFetcher`].
    pub fn new(
        certificate_store: Arc<dyn CertificateStore>,
        crl_store: Arc<dyn CrlStore>,
        directory: Arc<dyn DirectoryStore>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let fetcher = Arc::new(StoreCrlFetcher::new(crl_store.clone()));
        Self::with_fetcher(certificate_store, crl_store, directory, progress, fetcher)
    }

    /// Builds an engine with an explicit CRL fetcher.
    pub fn with_fetcher(
        certificate_store: Arc<dyn CertificateStore>,
        crl_store: Arc<dyn CrlStore>,
        directory: Arc<dyn DirectoryStore>,
        progress: Arc<dyn ProgressReporter>,
        crl_fetcher: Arc<dyn CrlFetcher>,
    ) -> Self {
        let settings = Settings::current();
        let outbox = Arc::new(Outbox::new());
        let registry = Arc::new(ProcessedBatchRegistry::new());

        let orchestrator = UploadOrchestrator::new(
            certificate_store.clone(),
            crl_store.clone(),
            crl_fetcher.clone(),
            outbox.clone(),
            progress.clone(),
        );

        let pipeline = BatchDistributionPipeline::new(
            certificate_store.clone(),
            crl_store,
            directory,
            registry.clone(),
            outbox.clone(),
            progress,
            settings.distribution,
        );

        Self {
            validator: CertificateValidator::new(certificate_store.clone()),
            revocation: RevocationChecker::new(crl_fetcher, settings.revocation),
            certificate_store,
            outbox,
            registry,
            orchestrator,
            pipeline,
            max_chain_depth: settings.core.max_chain_depth,
        }
    }

    /// The outbox validation commits into; exposed so hosts can observe or
    /// discard pending events.
    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// The idempotency registry; exposed so hosts can prune finished
    /// uploads.
    pub fn registry(&self) -> &Arc<ProcessedBatchRegistry> {
        &self.registry
    }

    /// Runs the enabled checks against a single certificate.
    pub fn validate_certificate(
        &self,
        certificate_id: &str,
        checks: CheckFlags,
        validation_log: &mut StatusTracker,
    ) -> Result<ValidateCertificateResponse> {
        let started = Instant::now();
        let outcome = self
            .validator
            .validate(certificate_id, checks, validation_log)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(if outcome.all_passed() {
            ValidateCertificateResponse::Validated {
                certificate_id: certificate_id.to_string(),
                outcome,
                elapsed_ms,
            }
        } else {
            ValidateCertificateResponse::Rejected {
                certificate_id: certificate_id.to_string(),
                outcome,
                elapsed_ms,
            }
        })
    }

    /// Builds and verifies the trust chain from `certificate_id` to a
    /// self-signed anchor.
    ///
    /// `max_depth` overrides the configured `core.max_chain_depth` for this
    /// call. When `check_revocation` is set, a complete chain additionally
    /// carries the leaf's revocation status.
    pub async fn verify_trust_chain(
        &self,
        certificate_id: &str,
        required_anchor_country: Option<&str>,
        check_revocation: bool,
        max_depth: Option<usize>,
        validation_log: &mut StatusTracker,
    ) -> Result<TrustChainResponse> {
        let started = Instant::now();

        let builder = TrustChainBuilder::new(
            self.certificate_store.clone(),
            max_depth.unwrap_or(self.max_chain_depth),
        )?;
        let report = builder.build_chain(certificate_id, required_anchor_country, validation_log)?;

        if let ChainOutcome::AnchorCountryMismatch { required, found } = &report.outcome {
            let (required, found) = (required.clone(), found.clone());
            return Ok(TrustChainResponse::AnchorCountryMismatch {
                report,
                required,
                found,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        if !report.chain_valid {
            return Ok(TrustChainResponse::Incomplete {
                report,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let revocation = if check_revocation {
            let leaf = self
                .certificate_store
                .certificate(certificate_id)?
                .ok_or_else(|| Error::CertificateMissing {
                    id: certificate_id.to_string(),
                })?;

            Some(self.revocation.check(&leaf, Utc::now(), validation_log).await)
        } else {
            None
        };

        Ok(TrustChainResponse::Complete {
            report,
            revocation,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Validates every certificate and CRL in an upload and commits the
    /// valid set for distribution.
    ///
    /// Infrastructure failures surface as
    /// [`BatchValidationResponse::Aborted`] rather than an `Err`; malformed
    /// input is still an `Err`.
    pub async fn validate_certificates_batch(
        &self,
        upload_id: &str,
        declared_certificates: usize,
        declared_crls: usize,
        validation_log: &mut StatusTracker,
    ) -> Result<BatchValidationResponse> {
        let started = Instant::now();

        match self
            .orchestrator
            .validate_upload(
                upload_id,
                declared_certificates,
                declared_crls,
                CheckFlags::all(),
                validation_log,
            )
            .await
        {
            Ok(report) => {
                let total = report.certificates.total();
                let success_rate = if total == 0 {
                    100.0
                } else {
                    report.certificates.valid() as f64 * 100.0 / total as f64
                };

                Ok(BatchValidationResponse::Completed {
                    report,
                    success_rate,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(err @ Error::Store(_)) => Ok(BatchValidationResponse::Aborted {
                error: err.to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            Err(err) => Err(err),
        }
    }

    /// Distributes the committed validation event for `upload_id` to the
    /// directory, filing entries under `target_base`.
    pub async fn distribute_validated(
        &self,
        upload_id: &str,
        target_base: &str,
        validation_log: &mut StatusTracker,
    ) -> Result<DistributionResponse> {
        let started = Instant::now();

        let report = self
            .pipeline
            .distribute_upload(upload_id, target_base, validation_log)
            .await?;

        Ok(DistributionResponse {
            report,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::certificate::CertificateStatus;

    #[test]
    fn responses_serialize_with_outcome_tags() {
        let response = ValidateCertificateResponse::Rejected {
            certificate_id: "cert-1".to_string(),
            outcome: CertificateCheckOutcome {
                signature_valid: Some(false),
                validity_period_valid: Some(true),
                constraints_valid: None,
                status: CertificateStatus::Invalid,
            },
            elapsed_ms: 12,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("Rejected").is_some());
        assert_eq!(value["Rejected"]["certificate_id"], "cert-1");
        assert_eq!(value["Rejected"]["outcome"]["status"], "Invalid");
    }

    #[test]
    fn aborted_batch_response_round_trips() {
        let response = BatchValidationResponse::Aborted {
            error: "store unreachable: backing store offline".to_string(),
            elapsed_ms: 3,
        };

        let json = serde_json::to_string(&response).unwrap();
        let parsed: BatchValidationResponse = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, BatchValidationResponse::Aborted { .. }));
    }
}
