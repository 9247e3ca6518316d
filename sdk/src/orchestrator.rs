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

//! Upload-level validation orchestration.
//!
//! Walks every certificate and CRL in an upload, runs the per-certificate
//! checks, the trust-chain walk, and the revocation lookup, persists the
//! resulting status, and commits a [`BatchValidated`] event for
//! distribution as the final step. One bad object never stops the batch:
//! each item is isolated, including against panics in the checking code.
//! Infrastructure failures (an unreachable store) are the only thing that
//! aborts the upload.
//!
//! [`BatchValidated`]: crate::distribution::BatchValidated

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use chrono::{DateTime, Utc};
use pkd_status_tracker::{log_item, validation_codes::*, StatusTracker};
use serde::{Deserialize, Serialize};

use crate::{
    certificate::{Certificate, CertificateStatus, CertificateType},
    distribution::{BatchValidated, Outbox},
    progress::{ProgressReporter, ProgressStage},
    revocation::{CrlFetcher, RevocationChecker},
    settings::Settings,
    store::{CertificateStore, CrlStore},
    trust_chain::TrustChainBuilder,
    validator::{CertificateValidator, CheckFlags},
    Error, Result,
};

/// Classification tallies for one certificate type.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TypeCounts {
    /// Certificates of this type seen in the upload.
    pub total: usize,

    /// Classified valid.
    pub valid: usize,

    /// Classified invalid (signature, constraints, or processing failure).
    pub invalid: usize,

    /// Classified expired.
    pub expired: usize,

    /// Classified not yet valid.
    pub not_yet_valid: usize,

    /// Classified revoked.
    pub revoked: usize,
}

impl TypeCounts {
    fn record(&mut self, status: CertificateStatus) {
        self.total += 1;
        match status {
            CertificateStatus::Valid => self.valid += 1,
            CertificateStatus::Expired => self.expired += 1,
            CertificateStatus::NotYetValid => self.not_yet_valid += 1,
            CertificateStatus::Revoked => self.revoked += 1,
            CertificateStatus::Invalid | CertificateStatus::Extracted => self.invalid += 1,
        }
    }
}

/// Certificate tallies broken down by type.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CertificateCounts {
    /// Country signing CA certificates.
    pub csca: TypeCounts,

    /// Document signer certificates.
    pub dsc: TypeCounts,

    /// Document signers for non-conventional travel documents.
    pub dsc_nc: TypeCounts,
}

impl CertificateCounts {
    fn for_type(&mut self, certificate_type: CertificateType) -> &mut TypeCounts {
        match certificate_type {
            CertificateType::Csca => &mut self.csca,
            CertificateType::Dsc => &mut self.dsc,
            CertificateType::DscNc => &mut self.dsc_nc,
        }
    }

    /// Total certificates across all types.
    pub fn total(&self) -> usize {
        self.csca.total + self.dsc.total + self.dsc_nc.total
    }

    /// Total certificates classified valid.
    pub fn valid(&self) -> usize {
        self.csca.valid + self.dsc.valid + self.dsc_nc.valid
    }
}

/// CRL tallies for one upload.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CrlCounts {
    /// CRLs seen in the upload.
    pub total: usize,

    /// CRLs accepted for distribution.
    pub accepted: usize,

    /// Accepted CRLs that are past their declared nextUpdate.
    pub stale: usize,

    /// CRLs rejected because no stored certificate matches their issuer.
    pub issuer_unknown: usize,
}

/// Result of validating one upload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UploadValidationReport {
    /// Upload that was validated.
    pub upload_id: String,

    /// Certificate tallies by type.
    pub certificates: CertificateCounts,

    /// CRL tallies.
    pub crls: CrlCounts,

    /// `true` when a [`BatchValidated`] event was committed for this upload.
    ///
    /// [`BatchValidated`]: crate::distribution::BatchValidated
    pub committed_for_distribution: bool,
}

/// Runs upload-level validation.
pub struct UploadOrchestrator {
    certificate_store: Arc<dyn CertificateStore>,
    crl_store: Arc<dyn CrlStore>,
    validator: CertificateValidator,
    revocation: RevocationChecker,
    outbox: Arc<Outbox>,
    progress: Arc<dyn ProgressReporter>,
    progress_ceiling: u8,
    max_chain_depth: usize,
}

impl UploadOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    ///
    /// Revocation policy, fetch timeout, and the validation progress window
    /// are snapshotted from the current [`Settings`].
    pub fn new(
        certificate_store: Arc<dyn CertificateStore>,
        crl_store: Arc<dyn CrlStore>,
        crl_fetcher: Arc<dyn CrlFetcher>,
        outbox: Arc<Outbox>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let settings = Settings::current();

        Self {
            validator: CertificateValidator::new(certificate_store.clone()),
            revocation: RevocationChecker::new(crl_fetcher, settings.revocation),
            certificate_store,
            crl_store,
            outbox,
            progress,
            progress_ceiling: settings.distribution.progress_floor,
            max_chain_depth: settings.core.max_chain_depth,
        }
    }

    /// Validates every certificate and CRL in an upload.
    ///
    /// `declared_certificates` and `declared_crls` are the counts the
    /// uploader announced; a mismatch against what the store holds is
    /// logged but does not abort.
    ///
    /// On success the set of valid objects is committed for distribution
    /// and the report says so. Returns `Err` only for store-level failures,
    /// in which case nothing was committed.
    pub async fn validate_upload(
        &self,
        upload_id: &str,
        declared_certificates: usize,
        declared_crls: usize,
        checks: CheckFlags,
        validation_log: &mut StatusTracker,
    ) -> Result<UploadValidationReport> {
        if checks.is_empty() {
            return Err(Error::BadParam(
                "at least one check must be enabled".to_string(),
            ));
        }

        self.progress.report(
            upload_id,
            ProgressStage::Validating,
            0,
            "validation started",
            0,
            declared_certificates + declared_crls,
        );

        let certs = match self.certificate_store.certificates_for_upload(upload_id) {
            Ok(certs) => certs,
            Err(err) => return Err(self.abort(upload_id, err.into())),
        };
        let crls = match self.crl_store.crls_for_upload(upload_id) {
            Ok(crls) => crls,
            Err(err) => return Err(self.abort(upload_id, err.into())),
        };

        if certs.len() != declared_certificates || crls.len() != declared_crls {
            log::warn!(
                "upload {upload_id}: declared {declared_certificates} certificates / {declared_crls} CRLs, store holds {} / {}",
                certs.len(),
                crls.len()
            );
        }

        let total_items = certs.len() + crls.len();
        let mut processed = 0usize;

        let mut certificate_counts = CertificateCounts::default();
        let mut valid_certificate_ids: Vec<String> = Vec::new();

        let chain_builder =
            TrustChainBuilder::new(self.certificate_store.clone(), self.max_chain_depth)?;
        let mut chain_cache: HashMap<String, bool> = HashMap::new();

        for cert in &certs {
            validation_log.push_current_object(cert.id.clone());
            let status = self
                .process_certificate(cert, checks, &chain_builder, &mut chain_cache, validation_log)
                .await;
            validation_log.pop_current_object();

            let status = match status {
                Ok(status) => status,
                Err(err) => return Err(self.abort(upload_id, err)),
            };

            if let Err(err) = self.certificate_store.update_status(&cert.id, status) {
                return Err(self.abort(upload_id, err.into()));
            }

            certificate_counts.for_type(cert.certificate_type).record(status);
            if status == CertificateStatus::Valid {
                valid_certificate_ids.push(cert.id.clone());
            }

            processed += 1;
            self.report_validating(upload_id, processed, total_items);
        }

        let mut crl_counts = CrlCounts::default();
        let mut accepted_crl_ids: Vec<String> = Vec::new();
        let now = Utc::now();

        for crl in &crls {
            validation_log.push_current_object(crl.id.clone());
            crl_counts.total += 1;

            let issuer_known = match self.certificate_store.find_by_subject(&crl.issuer) {
                Ok(candidates) => !candidates.is_empty(),
                Err(err) => return Err(self.abort(upload_id, err.into())),
            };

            if !issuer_known {
                log_item!(
                    crl.id.clone(),
                    format!("no stored certificate matches CRL issuer {}", crl.issuer),
                    "validate_upload"
                )
                .validation_status(CRL_ISSUER_UNKNOWN)
                .failure_no_throw(validation_log, Error::BadParam(crl.issuer.to_string()));

                crl_counts.issuer_unknown += 1;
            } else {
                if crl.is_stale_at(now) {
                    log_item!(
                        crl.id.clone(),
                        "CRL is past its declared next update",
                        "validate_upload"
                    )
                    .validation_status(CRL_STALE)
                    .informational(validation_log);

                    crl_counts.stale += 1;
                } else {
                    log_item!(crl.id.clone(), "CRL inside validity window", "validate_upload")
                        .validation_status(CRL_INSIDE_VALIDITY)
                        .success(validation_log);
                }

                crl_counts.accepted += 1;
                accepted_crl_ids.push(crl.id.clone());
            }

            validation_log.pop_current_object();
            processed += 1;
            self.report_validating(upload_id, processed, total_items);
        }

        // Commit is the last step: if anything above failed, no event exists
        // and distribution cannot run for this upload.
        self.outbox.commit(BatchValidated {
            upload_id: upload_id.to_string(),
            certificate_ids: valid_certificate_ids,
            crl_ids: accepted_crl_ids,
            committed_at: Utc::now(),
        });

        self.progress.report(
            upload_id,
            ProgressStage::Validating,
            self.progress_ceiling,
            "validation complete",
            total_items,
            total_items,
        );

        Ok(UploadValidationReport {
            upload_id: upload_id.to_string(),
            certificates: certificate_counts,
            crls: crl_counts,
            committed_for_distribution: true,
        })
    }

    /// Runs the checks for one certificate and derives its final status.
    ///
    /// The synchronous checks run under `catch_unwind` so a panic in
    /// checking code classifies this certificate invalid instead of taking
    /// down the upload. Store-level failures come back as `Err` and abort
    /// the caller.
    async fn process_certificate(
        &self,
        cert: &Certificate,
        checks: CheckFlags,
        chain_builder: &TrustChainBuilder,
        chain_cache: &mut HashMap<String, bool>,
        validation_log: &mut StatusTracker,
    ) -> Result<CertificateStatus> {
        let now = Utc::now();

        let status = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut item_log = StatusTracker::default();
            let result =
                self.run_synchronous_checks(cert, checks, now, chain_builder, chain_cache, &mut item_log);
            (result, item_log)
        })) {
            Ok((result, item_log)) => {
                validation_log.append(&item_log);
                result?
            }
            Err(_panic) => {
                log::error!("checks panicked for certificate {}", cert.id);

                log_item!(
                    cert.id.clone(),
                    "certificate checks panicked; classified invalid",
                    "process_certificate"
                )
                .failure_no_throw(
                    validation_log,
                    Error::InternalError(format!("checks panicked for {}", cert.id)),
                );

                CertificateStatus::Invalid
            }
        };

        if status != CertificateStatus::Valid {
            return Ok(status);
        }

        let revocation = self.revocation.check(cert, now, validation_log).await;
        Ok(match self.revocation.status_change(&revocation) {
            Some(status) => status,
            None => CertificateStatus::Valid,
        })
    }

    /// Per-certificate checks followed by the trust-chain walk.
    ///
    /// The chain walk only runs when the signature check is enabled and the
    /// certificate passed everything else; a certificate whose chain never
    /// reaches a self-signed anchor is classified invalid even though its
    /// immediate issuer verified.
    fn run_synchronous_checks(
        &self,
        cert: &Certificate,
        checks: CheckFlags,
        now: DateTime<Utc>,
        chain_builder: &TrustChainBuilder,
        chain_cache: &mut HashMap<String, bool>,
        item_log: &mut StatusTracker,
    ) -> Result<CertificateStatus> {
        let outcome = self.validator.validate_record(cert, checks, now, item_log)?;
        if outcome.status != CertificateStatus::Valid {
            return Ok(outcome.status);
        }

        if checks.signature
            && !self.chain_reaches_anchor(cert, chain_builder, chain_cache, item_log)?
        {
            return Ok(CertificateStatus::Invalid);
        }

        Ok(CertificateStatus::Valid)
    }

    fn chain_reaches_anchor(
        &self,
        cert: &Certificate,
        chain_builder: &TrustChainBuilder,
        chain_cache: &mut HashMap<String, bool>,
        item_log: &mut StatusTracker,
    ) -> Result<bool> {
        if let Some(cached) = chain_cache.get(cert.id.as_str()) {
            return Ok(*cached);
        }

        let report = chain_builder.build_chain(&cert.id, None, item_log)?;

        if report.chain_valid {
            // A valid chain vouches for every certificate on it, which keeps
            // the walk from re-verifying a shared CSCA once per document
            // signer.
            for link in &report.links {
                chain_cache.insert(link.certificate_id.clone(), true);
            }
        } else {
            chain_cache.insert(cert.id.clone(), false);
        }

        Ok(report.chain_valid)
    }

    fn report_validating(&self, upload_id: &str, processed: usize, total_items: usize) {
        if total_items == 0 {
            return;
        }

        let percentage = (self.progress_ceiling as usize * processed / total_items) as u8;
        self.progress.report(
            upload_id,
            ProgressStage::Validating,
            percentage.min(self.progress_ceiling),
            "validating",
            processed,
            total_items,
        );
    }

    fn abort(&self, upload_id: &str, err: Error) -> Error {
        log::error!("upload {upload_id}: validation aborted: {err}");

        self.progress.report(
            upload_id,
            ProgressStage::Failed,
            0,
            "validation aborted",
            0,
            0,
        );

        err
    }
}
