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

//! Idempotency registry for dispatched batch units.
//!
//! A unit may be delivered to a worker more than once (redelivery after a
//! crash, duplicated dispatch). The registry's compare-and-set claim is what
//! makes processing exactly-once: the first worker to claim a batch id wins,
//! every later claim is refused. Registry state only ever leaves through
//! explicit pruning.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::distribution::chunk::BatchObjectType;

/// Lifecycle of one claimed batch unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchState {
    /// A worker holds the claim and is processing the unit.
    InFlight,

    /// The unit was processed to completion.
    Completed,

    /// Processing failed at the infrastructure level. The claim stays so
    /// the failure remains visible; a retry must use a new batch id.
    Failed,
}

#[derive(Default)]
struct RegistryInner {
    batches: HashMap<String, (String, BatchObjectType, BatchState)>,
    expected: HashMap<(String, BatchObjectType), usize>,
}

/// Tracks which batch units have been claimed and finished.
#[derive(Default)]
pub struct ProcessedBatchRegistry {
    inner: Mutex<RegistryInner>,
}

impl ProcessedBatchRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declares how many units of `object_type` the upload will dispatch.
    ///
    /// Completion for the upload/type pair means this many units reached
    /// [`BatchState::Completed`].
    pub fn set_expected(&self, upload_id: &str, object_type: BatchObjectType, units: usize) {
        self.locked()
            .expected
            .insert((upload_id.to_string(), object_type), units);
    }

    /// Claims a batch id for processing.
    ///
    /// Returns `true` exactly once per batch id; every later call returns
    /// `false` regardless of the unit's current state.
    pub fn claim(&self, batch_id: &str, upload_id: &str, object_type: BatchObjectType) -> bool {
        let mut inner = self.locked();

        if inner.batches.contains_key(batch_id) {
            return false;
        }

        inner.batches.insert(
            batch_id.to_string(),
            (upload_id.to_string(), object_type, BatchState::InFlight),
        );
        true
    }

    /// Records that a claimed unit finished successfully.
    pub fn mark_completed(&self, batch_id: &str) {
        if let Some(entry) = self.locked().batches.get_mut(batch_id) {
            entry.2 = BatchState::Completed;
        }
    }

    /// Records that a claimed unit failed.
    pub fn mark_failed(&self, batch_id: &str) {
        if let Some(entry) = self.locked().batches.get_mut(batch_id) {
            entry.2 = BatchState::Failed;
        }
    }

    /// Returns the state of a batch id, if it was ever claimed.
    pub fn state(&self, batch_id: &str) -> Option<BatchState> {
        self.locked()
            .batches
            .get(batch_id)
            .map(|entry| entry.2)
    }

    /// Number of completed units for an upload/type pair.
    pub fn completed_count(&self, upload_id: &str, object_type: BatchObjectType) -> usize {
        self.locked()
            .batches
            .values()
            .filter(|(upload, ty, state)| {
                upload == upload_id && *ty == object_type && *state == BatchState::Completed
            })
            .count()
    }

    /// Returns `true` when every declared unit of every type for this upload
    /// has completed.
    ///
    /// An upload with no declared expectations is not complete; completion
    /// is only meaningful after [`set_expected`](Self::set_expected).
    pub fn upload_complete(&self, upload_id: &str) -> bool {
        let inner = self.locked();

        let mut declared = false;
        for ((upload, object_type), expected) in &inner.expected {
            if upload != upload_id {
                continue;
            }
            declared = true;

            let completed = inner
                .batches
                .values()
                .filter(|(u, ty, state)| {
                    u == upload_id && ty == object_type && *state == BatchState::Completed
                })
                .count();

            if completed < *expected {
                return false;
            }
        }

        declared
    }

    /// Removes every record belonging to an upload.
    ///
    /// Records persist until this is called; there is no implicit expiry.
    pub fn prune_upload(&self, upload_id: &str) {
        let mut inner = self.locked();
        inner.batches.retain(|_, (upload, _, _)| upload != upload_id);
        inner.expected.retain(|(upload, _), _| upload != upload_id);
    }

    /// Removes the records of completed units across all uploads, keeping
    /// in-flight and failed claims.
    ///
    /// Intended for a periodic maintenance sweep once completed uploads have
    /// been reported. Expectation declarations are untouched; use
    /// [`prune_upload`](Self::prune_upload) to retire an upload entirely.
    pub fn prune_completed(&self) {
        self.locked()
            .batches
            .retain(|_, (_, _, state)| *state != BatchState::Completed);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn claim_succeeds_exactly_once() {
        let registry = ProcessedBatchRegistry::new();

        assert!(registry.claim("b-1", "upload-1", BatchObjectType::Certificate));
        assert!(!registry.claim("b-1", "upload-1", BatchObjectType::Certificate));

        registry.mark_completed("b-1");
        assert!(!registry.claim("b-1", "upload-1", BatchObjectType::Certificate));
        assert_eq!(registry.state("b-1"), Some(BatchState::Completed));
    }

    #[test]
    fn completion_tracks_declared_expectations() {
        let registry = ProcessedBatchRegistry::new();
        registry.set_expected("upload-1", BatchObjectType::Certificate, 2);
        registry.set_expected("upload-1", BatchObjectType::Crl, 1);

        registry.claim("c-0", "upload-1", BatchObjectType::Certificate);
        registry.mark_completed("c-0");
        registry.claim("c-1", "upload-1", BatchObjectType::Certificate);
        registry.mark_completed("c-1");
        assert!(!registry.upload_complete("upload-1"));

        registry.claim("l-0", "upload-1", BatchObjectType::Crl);
        registry.mark_completed("l-0");
        assert!(registry.upload_complete("upload-1"));
    }

    #[test]
    fn failed_units_do_not_count_as_completed() {
        let registry = ProcessedBatchRegistry::new();
        registry.set_expected("upload-1", BatchObjectType::Certificate, 1);

        registry.claim("c-0", "upload-1", BatchObjectType::Certificate);
        registry.mark_failed("c-0");

        assert_eq!(
            registry.completed_count("upload-1", BatchObjectType::Certificate),
            0
        );
        assert!(!registry.upload_complete("upload-1"));
    }

    #[test]
    fn undeclared_upload_is_never_complete() {
        let registry = ProcessedBatchRegistry::new();
        assert!(!registry.upload_complete("upload-x"));
    }

    #[test]
    fn prune_completed_keeps_inflight_and_failed_claims() {
        let registry = ProcessedBatchRegistry::new();
        registry.claim("done", "upload-1", BatchObjectType::Certificate);
        registry.mark_completed("done");
        registry.claim("busy", "upload-1", BatchObjectType::Certificate);
        registry.claim("broken", "upload-2", BatchObjectType::Crl);
        registry.mark_failed("broken");

        registry.prune_completed();

        assert_eq!(registry.state("done"), None);
        assert_eq!(registry.state("busy"), Some(BatchState::InFlight));
        assert_eq!(registry.state("broken"), Some(BatchState::Failed));
    }

    #[test]
    fn prune_removes_all_state_for_an_upload() {
        let registry = ProcessedBatchRegistry::new();
        registry.set_expected("upload-1", BatchObjectType::Certificate, 1);
        registry.claim("c-0", "upload-1", BatchObjectType::Certificate);
        registry.mark_completed("c-0");

        registry.prune_upload("upload-1");

        assert_eq!(registry.state("c-0"), None);
        assert!(!registry.upload_complete("upload-1"));
        // After pruning the id can be claimed again.
        assert!(registry.claim("c-0", "upload-1", BatchObjectType::Certificate));
    }
}
