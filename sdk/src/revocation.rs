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

//! CRL-based revocation checking.
//!
//! An unreachable CRL is reported as its own status, never as "revoked":
//! [`RevocationStatus::CrlUnavailable`] and
//! [`RevocationStatus::CrlFetchTimeout`] are distinct from
//! [`RevocationStatus::NotRevoked`] so callers can see that the question
//! went unanswered. What that means for the certificate's classification is
//! decided by [`RevocationPolicy`], not here.
//!
//! [`RevocationPolicy`]: crate::settings::RevocationPolicy

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pkd_status_tracker::{log_item, validation_codes::*, StatusTracker};
use serde::{Deserialize, Serialize};

use crate::{
    certificate::{Certificate, CertificateStatus, DistinguishedName},
    crl::{CertificateRevocationList, CrlReasonCode},
    settings::{Revocation, RevocationPolicy},
    store::{CrlStore, StoreError},
};

/// Where a certificate stands against its issuer's CRL.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RevocationStatus {
    /// The certificate's serial number appears on the issuer's CRL.
    Revoked {
        /// Reason recorded on the CRL entry.
        reason: CrlReasonCode,

        /// When the issuer revoked the certificate.
        revocation_date: DateTime<Utc>,
    },

    /// The issuer's CRL was consulted and does not list this certificate.
    NotRevoked,

    /// No CRL for the issuer could be obtained.
    CrlUnavailable,

    /// The CRL fetch did not complete within the configured timeout.
    CrlFetchTimeout,
}

impl RevocationStatus {
    /// Returns `true` when the CRL was actually consulted.
    pub fn crl_was_consulted(&self) -> bool {
        matches!(self, Self::Revoked { .. } | Self::NotRevoked)
    }
}

/// Obtains the current CRL for an issuer.
///
/// The store-backed implementation below serves deployments that ingest
/// CRLs through uploads; a host can substitute one that fetches over HTTP
/// from the CRL distribution point instead.
#[async_trait]
pub trait CrlFetcher: Send + Sync {
    /// Returns the latest CRL issued by `issuer`, or `None` if the fetcher
    /// has no CRL for it.
    async fn fetch(
        &self,
        issuer: &DistinguishedName,
    ) -> Result<Option<CertificateRevocationList>, StoreError>;
}

/// [`CrlFetcher`] that reads from a [`CrlStore`].
pub struct StoreCrlFetcher {
    store: Arc<dyn CrlStore>,
}

impl StoreCrlFetcher {
    /// Creates a fetcher over `store`.
    pub fn new(store: Arc<dyn CrlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CrlFetcher for StoreCrlFetcher {
    async fn fetch(
        &self,
        issuer: &DistinguishedName,
    ) -> Result<Option<CertificateRevocationList>, StoreError> {
        self.store.crl_for_issuer(issuer)
    }
}

/// Checks certificates against their issuer's CRL.
pub struct RevocationChecker {
    fetcher: Arc<dyn CrlFetcher>,
    settings: Revocation,
}

impl RevocationChecker {
    /// Creates a checker with the given fetcher and revocation settings.
    pub fn new(fetcher: Arc<dyn CrlFetcher>, settings: Revocation) -> Self {
        Self { fetcher, settings }
    }

    /// Determines the revocation status of `cert` at instant `now`.
    ///
    /// A stale CRL (past its `next_update`) is still consulted; staleness is
    /// recorded as an informational finding rather than discarding the only
    /// revocation data available.
    pub async fn check(
        &self,
        cert: &Certificate,
        now: DateTime<Utc>,
        validation_log: &mut StatusTracker,
    ) -> RevocationStatus {
        let timeout = Duration::from_millis(self.settings.fetch_timeout_ms);

        let fetched = match tokio::time::timeout(timeout, self.fetcher.fetch(&cert.issuer)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                log_item!(
                    cert.id.clone(),
                    format!(
                        "CRL fetch for issuer {} exceeded {}ms",
                        cert.issuer, self.settings.fetch_timeout_ms
                    ),
                    "check_revocation"
                )
                .validation_status(CRL_FETCH_TIMEOUT)
                .informational(validation_log);

                return RevocationStatus::CrlFetchTimeout;
            }
        };

        let crl = match fetched {
            Ok(Some(crl)) => crl,
            Ok(None) => {
                log_item!(
                    cert.id.clone(),
                    format!("no CRL available for issuer {}", cert.issuer),
                    "check_revocation"
                )
                .validation_status(CRL_UNAVAILABLE)
                .informational(validation_log);

                return RevocationStatus::CrlUnavailable;
            }
            Err(err) => {
                log::warn!("CRL fetch failed for issuer {}: {err}", cert.issuer);

                log_item!(
                    cert.id.clone(),
                    format!("CRL fetch failed for issuer {}", cert.issuer),
                    "check_revocation"
                )
                .validation_status(CRL_UNAVAILABLE)
                .informational(validation_log);

                return RevocationStatus::CrlUnavailable;
            }
        };

        if crl.is_stale_at(now) {
            log_item!(
                cert.id.clone(),
                format!("CRL {} is past its next update; consulting it anyway", crl.id),
                "check_revocation"
            )
            .validation_status(CRL_STALE)
            .informational(validation_log);
        } else {
            log_item!(cert.id.clone(), "CRL inside validity window", "check_revocation")
                .validation_status(CRL_INSIDE_VALIDITY)
                .success(validation_log);
        }

        match crl.entry_for_serial(&cert.serial_number) {
            Some(entry) => {
                log_item!(
                    cert.id.clone(),
                    format!(
                        "serial {} revoked by issuer ({:?})",
                        cert.serial_hex(),
                        entry.reason
                    ),
                    "check_revocation"
                )
                .validation_status(CERTIFICATE_REVOKED)
                .failure_no_throw(validation_log, crate::validator::ValidationError::Revoked);

                RevocationStatus::Revoked {
                    reason: entry.reason,
                    revocation_date: entry.revocation_date,
                }
            }
            None => {
                log_item!(
                    cert.id.clone(),
                    "serial not listed on issuer CRL",
                    "check_revocation"
                )
                .validation_status(CRL_NOT_REVOKED)
                .success(validation_log);

                RevocationStatus::NotRevoked
            }
        }
    }

    /// Translates a revocation status into a certificate status change, per
    /// the configured policy.
    ///
    /// Returns `None` when the certificate's existing classification should
    /// stand. An unanswered revocation question under fail-closed yields
    /// [`CertificateStatus::Invalid`], never
    /// [`CertificateStatus::Revoked`].
    pub fn status_change(&self, revocation: &RevocationStatus) -> Option<CertificateStatus> {
        match revocation {
            RevocationStatus::Revoked { .. } => Some(CertificateStatus::Revoked),
            RevocationStatus::NotRevoked => None,
            RevocationStatus::CrlUnavailable | RevocationStatus::CrlFetchTimeout => {
                match self.settings.policy {
                    RevocationPolicy::FailOpen => None,
                    RevocationPolicy::FailClosed => Some(CertificateStatus::Invalid),
                }
            }
        }
    }
}
