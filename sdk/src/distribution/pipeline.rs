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

//! Concurrent dispatch of validated objects to the directory store.
//!
//! The pipeline consumes a committed [`BatchValidated`] event, splits its
//! object ids into batch units, and uploads units concurrently under a
//! semaphore sized by `distribution.worker_threads`. A rejected object fails
//! only itself; an unreachable directory or store fails the whole unit.
//! Progress is reported into the window above `distribution.progress_floor`,
//! and the `Completed` stage is reported exactly once, at 100.
//!
//! [`BatchValidated`]: crate::distribution::outbox::BatchValidated

use std::{collections::HashMap, sync::Arc};

use pkd_status_tracker::{log_item, validation_codes::*, StatusTracker};
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    directory::{DirectoryError, DirectoryStore, EntryLocation, PublishOutcome},
    distribution::{
        chunk::{chunk_objects, BatchObjectType, BatchUnit},
        outbox::Outbox,
        registry::ProcessedBatchRegistry,
    },
    progress::{ProgressReporter, ProgressStage},
    settings::Distribution,
    store::{CertificateStore, CrlStore},
    Error, Result,
};

/// How one batch unit ended.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ChunkOutcome {
    /// Every object was attempted; rejected objects are listed on the
    /// report.
    Completed,

    /// Another worker already claimed this batch id; nothing was sent.
    SkippedDuplicate,

    /// An infrastructure failure stopped the unit partway.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

/// Result of processing one batch unit.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChunkReport {
    /// Unit this report covers.
    pub batch_id: String,

    /// Kind of object the unit carried.
    pub object_type: BatchObjectType,

    /// How the unit ended.
    pub outcome: ChunkOutcome,

    /// Objects newly stored in the directory.
    pub stored: usize,

    /// Objects the directory already held identically.
    pub duplicates: usize,

    /// Per-object failures: id and reason.
    pub item_failures: Vec<(String, String)>,
}

/// Overall state of an upload's distribution run.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DistributionState {
    /// Every unit completed. Individual objects may still have been
    /// rejected; see the chunk reports.
    Completed,

    /// At least one unit hit an infrastructure failure.
    Failed,
}

/// Result of distributing one upload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DistributionReport {
    /// Upload that was distributed.
    pub upload_id: String,

    /// Overall state.
    pub state: DistributionState,

    /// Number of units dispatched (claimed units, not skipped duplicates).
    pub dispatched_units: usize,

    /// Total objects newly stored.
    pub stored: usize,

    /// Total objects skipped as directory duplicates.
    pub duplicates: usize,

    /// Total per-object failures across all units.
    pub item_failures: usize,

    /// Per-unit reports, in completion order.
    pub chunk_reports: Vec<ChunkReport>,
}

/// Distributes validated uploads to a directory store.
pub struct BatchDistributionPipeline {
    certificate_store: Arc<dyn CertificateStore>,
    crl_store: Arc<dyn CrlStore>,
    directory: Arc<dyn DirectoryStore>,
    registry: Arc<ProcessedBatchRegistry>,
    outbox: Arc<Outbox>,
    progress: Arc<dyn ProgressReporter>,
    settings: Distribution,
}

impl BatchDistributionPipeline {
    /// Creates a pipeline over the given collaborators.
    pub fn new(
        certificate_store: Arc<dyn CertificateStore>,
        crl_store: Arc<dyn CrlStore>,
        directory: Arc<dyn DirectoryStore>,
        registry: Arc<ProcessedBatchRegistry>,
        outbox: Arc<Outbox>,
        progress: Arc<dyn ProgressReporter>,
        settings: Distribution,
    ) -> Self {
        Self {
            certificate_store,
            crl_store,
            directory,
            registry,
            outbox,
            progress,
            settings,
        }
    }

    /// Distributes the committed validation event for `upload_id`.
    ///
    /// `base_location` is the deployment-specific suffix every published
    /// entry is filed under.
    ///
    /// Returns [`Error::BadParam`] when no event was committed for the
    /// upload, which is how calls for unvalidated (or already-distributed)
    /// uploads are refused.
    pub async fn distribute_upload(
        &self,
        upload_id: &str,
        base_location: &str,
        validation_log: &mut StatusTracker,
    ) -> Result<DistributionReport> {
        let Some(event) = self.outbox.take(upload_id) else {
            return Err(Error::BadParam(format!(
                "no committed validation event for upload {upload_id}"
            )));
        };

        let mut units = chunk_objects(
            upload_id,
            BatchObjectType::Certificate,
            &event.certificate_ids,
            self.settings.chunk_size,
        );
        units.extend(chunk_objects(
            upload_id,
            BatchObjectType::Crl,
            &event.crl_ids,
            self.settings.chunk_size,
        ));

        let cert_units = units
            .iter()
            .filter(|u| u.object_type == BatchObjectType::Certificate)
            .count();
        self.registry
            .set_expected(upload_id, BatchObjectType::Certificate, cert_units);
        self.registry
            .set_expected(upload_id, BatchObjectType::Crl, units.len() - cert_units);

        let total_units = units.len();
        let floor = self.settings.progress_floor;

        if total_units == 0 {
            log::info!("upload {upload_id}: nothing to distribute");
            self.progress
                .report(upload_id, ProgressStage::Completed, 100, "distributed", 0, 0);

            return Ok(DistributionReport {
                upload_id: upload_id.to_string(),
                state: DistributionState::Completed,
                dispatched_units: 0,
                stored: 0,
                duplicates: 0,
                item_failures: 0,
                chunk_reports: vec![],
            });
        }

        self.progress.report(
            upload_id,
            ProgressStage::Distributing,
            floor,
            "distribution started",
            0,
            total_units,
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.worker_threads));
        let mut join_set = JoinSet::new();

        for unit in units {
            let permit_source = semaphore.clone();
            let certificate_store = self.certificate_store.clone();
            let crl_store = self.crl_store.clone();
            let directory = self.directory.clone();
            let registry = self.registry.clone();
            let base_location = base_location.to_string();

            join_set.spawn(async move {
                // Holding the permit for the unit's lifetime is the
                // concurrency bound.
                let _permit = permit_source.acquire_owned().await;

                process_unit(
                    unit,
                    certificate_store,
                    crl_store,
                    directory,
                    registry,
                    &base_location,
                )
                .await
            });
        }

        let mut chunk_reports = Vec::with_capacity(total_units);
        let mut done = 0usize;
        let mut any_failed = false;

        while let Some(joined) = join_set.join_next().await {
            done += 1;

            let (report, chunk_log) = match joined {
                Ok(result) => result,
                Err(join_err) => {
                    log::error!("upload {upload_id}: batch worker panicked: {join_err}");
                    any_failed = true;
                    continue;
                }
            };

            validation_log.append(&chunk_log);
            if matches!(report.outcome, ChunkOutcome::Failed { .. }) {
                any_failed = true;
            }
            chunk_reports.push(report);

            if done < total_units {
                let span = (100 - floor) as usize;
                let percentage = floor + (span * done / total_units) as u8;
                self.progress.report(
                    upload_id,
                    ProgressStage::Distributing,
                    percentage.min(99),
                    "distributing",
                    done,
                    total_units,
                );
            }
        }

        let stored = chunk_reports.iter().map(|r| r.stored).sum();
        let duplicates = chunk_reports.iter().map(|r| r.duplicates).sum();
        let item_failures = chunk_reports.iter().map(|r| r.item_failures.len()).sum();
        let dispatched_units = chunk_reports
            .iter()
            .filter(|r| r.outcome != ChunkOutcome::SkippedDuplicate)
            .count();

        let state = if any_failed {
            self.progress.report(
                upload_id,
                ProgressStage::Failed,
                99,
                "distribution failed",
                done,
                total_units,
            );
            DistributionState::Failed
        } else {
            self.progress.report(
                upload_id,
                ProgressStage::Completed,
                100,
                "distributed",
                done,
                total_units,
            );
            DistributionState::Completed
        };

        Ok(DistributionReport {
            upload_id: upload_id.to_string(),
            state,
            dispatched_units,
            stored,
            duplicates,
            item_failures,
            chunk_reports,
        })
    }
}

async fn process_unit(
    unit: BatchUnit,
    certificate_store: Arc<dyn CertificateStore>,
    crl_store: Arc<dyn CrlStore>,
    directory: Arc<dyn DirectoryStore>,
    registry: Arc<ProcessedBatchRegistry>,
    base_location: &str,
) -> (ChunkReport, StatusTracker) {
    let mut chunk_log = StatusTracker::default();

    if !registry.claim(&unit.batch_id, &unit.upload_id, unit.object_type) {
        log_item!(
            unit.batch_id.clone(),
            "batch id already claimed; skipping duplicate delivery",
            "process_unit"
        )
        .validation_status(DISTRIBUTION_BATCH_DUPLICATE)
        .informational(&mut chunk_log);

        return (
            ChunkReport {
                batch_id: unit.batch_id,
                object_type: unit.object_type,
                outcome: ChunkOutcome::SkippedDuplicate,
                stored: 0,
                duplicates: 0,
                item_failures: vec![],
            },
            chunk_log,
        );
    }

    let mut stored = 0usize;
    let mut duplicates = 0usize;
    let mut item_failures: Vec<(String, String)> = Vec::new();

    let outcome = match publish_objects(
        &unit,
        certificate_store,
        crl_store,
        directory,
        base_location,
        &mut stored,
        &mut duplicates,
        &mut item_failures,
        &mut chunk_log,
    )
    .await
    {
        Ok(()) => {
            registry.mark_completed(&unit.batch_id);

            log_item!(
                unit.batch_id.clone(),
                format!("batch stored ({stored} new, {duplicates} duplicate)"),
                "process_unit"
            )
            .validation_status(DISTRIBUTION_BATCH_STORED)
            .success(&mut chunk_log);

            ChunkOutcome::Completed
        }
        Err(reason) => {
            registry.mark_failed(&unit.batch_id);

            log_item!(unit.batch_id.clone(), reason.clone(), "process_unit")
                .validation_status(STORE_UNAVAILABLE)
                .failure_no_throw(&mut chunk_log, Error::InternalError(reason.clone()));

            ChunkOutcome::Failed { reason }
        }
    };

    (
        ChunkReport {
            batch_id: unit.batch_id,
            object_type: unit.object_type,
            outcome,
            stored,
            duplicates,
            item_failures,
        },
        chunk_log,
    )
}

/// Publishes every object in the unit. Per-object rejections are recorded
/// and skipped; an `Err` return means an infrastructure failure that aborts
/// the unit.
#[allow(clippy::too_many_arguments)]
async fn publish_objects(
    unit: &BatchUnit,
    certificate_store: Arc<dyn CertificateStore>,
    crl_store: Arc<dyn CrlStore>,
    directory: Arc<dyn DirectoryStore>,
    base_location: &str,
    stored: &mut usize,
    duplicates: &mut usize,
    item_failures: &mut Vec<(String, String)>,
    chunk_log: &mut StatusTracker,
) -> std::result::Result<(), String> {
    match unit.object_type {
        BatchObjectType::Certificate => {
            for object_id in &unit.object_ids {
                let cert = certificate_store
                    .certificate(object_id)
                    .map_err(|err| format!("certificate load failed: {err}"))?;

                let Some(cert) = cert else {
                    record_item_failure(
                        object_id,
                        "certificate record disappeared before publication",
                        item_failures,
                        chunk_log,
                    );
                    continue;
                };

                let location = EntryLocation::for_certificate(base_location, &cert);
                match directory.publish_certificate(&cert, &location).await {
                    Ok(PublishOutcome::Stored) => *stored += 1,
                    Ok(PublishOutcome::DuplicateSkipped) => *duplicates += 1,
                    Err(DirectoryError::Rejected(reason)) => {
                        record_item_failure(object_id, &reason, item_failures, chunk_log);
                    }
                    Err(DirectoryError::Unavailable(reason)) => {
                        return Err(format!("directory unreachable: {reason}"));
                    }
                }
            }
        }
        BatchObjectType::Crl => {
            let crls = crl_store
                .crls_for_upload(&unit.upload_id)
                .map_err(|err| format!("CRL load failed: {err}"))?;
            let by_id: HashMap<&str, _> =
                crls.iter().map(|crl| (crl.id.as_str(), crl)).collect();

            for object_id in &unit.object_ids {
                let Some(crl) = by_id.get(object_id.as_str()) else {
                    record_item_failure(
                        object_id,
                        "CRL record disappeared before publication",
                        item_failures,
                        chunk_log,
                    );
                    continue;
                };

                let location = EntryLocation::for_crl(base_location, crl);
                match directory.publish_crl(crl, &location).await {
                    Ok(PublishOutcome::Stored) => *stored += 1,
                    Ok(PublishOutcome::DuplicateSkipped) => *duplicates += 1,
                    Err(DirectoryError::Rejected(reason)) => {
                        record_item_failure(object_id, &reason, item_failures, chunk_log);
                    }
                    Err(DirectoryError::Unavailable(reason)) => {
                        return Err(format!("directory unreachable: {reason}"));
                    }
                }
            }
        }
    }

    Ok(())
}

fn record_item_failure(
    object_id: &str,
    reason: &str,
    item_failures: &mut Vec<(String, String)>,
    chunk_log: &mut StatusTracker,
) {
    log_item!(object_id.to_string(), reason.to_string(), "publish_objects")
        .validation_status(DISTRIBUTION_ITEM_FAILED)
        .failure_no_throw(chunk_log, Error::BadParam(reason.to_string()));

    item_failures.push((object_id.to_string(), reason.to_string()));
}
