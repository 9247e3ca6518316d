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

//! Commit-then-dispatch hand-off between validation and distribution.
//!
//! Validation commits a [`BatchValidated`] event here as its last step;
//! distribution drains events and dispatches from them. If validation fails
//! after partial work, nothing was committed and nothing is dispatched. The
//! gap this leaves (a committed event whose dispatch never ran, after a
//! crash between commit and drain) is closed by redelivery: draining again
//! is safe because batch claims are idempotent downstream.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal that an upload's validation finished and its validated objects are
/// ready for distribution.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BatchValidated {
    /// Upload whose validation completed.
    pub upload_id: String,

    /// Ids of certificates that validated successfully.
    pub certificate_ids: Vec<String>,

    /// Ids of CRLs that validated successfully.
    pub crl_ids: Vec<String>,

    /// When validation committed this event.
    pub committed_at: DateTime<Utc>,
}

/// Holds committed [`BatchValidated`] events until distribution drains them.
#[derive(Default)]
pub struct Outbox {
    pending: Mutex<Vec<BatchValidated>>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, Vec<BatchValidated>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits an event. Committed events survive until drained or
    /// discarded.
    pub fn commit(&self, event: BatchValidated) {
        self.locked().push(event);
    }

    /// Removes and returns the committed event for `upload_id`, if any.
    pub fn take(&self, upload_id: &str) -> Option<BatchValidated> {
        let mut pending = self.locked();
        let index = pending.iter().position(|e| e.upload_id == upload_id)?;
        Some(pending.remove(index))
    }

    /// Removes and returns every committed event, oldest first.
    pub fn drain(&self) -> Vec<BatchValidated> {
        std::mem::take(&mut *self.locked())
    }

    /// Drops the committed event for `upload_id` without dispatching it.
    pub fn discard(&self, upload_id: &str) {
        self.locked()
            .retain(|e| e.upload_id != upload_id);
    }

    /// Number of committed, undrained events.
    pub fn pending_count(&self) -> usize {
        self.locked().len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn event(upload_id: &str) -> BatchValidated {
        BatchValidated {
            upload_id: upload_id.to_string(),
            certificate_ids: vec!["cert-1".to_string()],
            crl_ids: vec![],
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn take_removes_only_the_matching_event() {
        let outbox = Outbox::new();
        outbox.commit(event("upload-1"));
        outbox.commit(event("upload-2"));

        let taken = outbox.take("upload-1").unwrap();
        assert_eq!(taken.upload_id, "upload-1");
        assert_eq!(outbox.pending_count(), 1);
        assert!(outbox.take("upload-1").is_none());
    }

    #[test]
    fn discard_drops_without_dispatch() {
        let outbox = Outbox::new();
        outbox.commit(event("upload-1"));

        outbox.discard("upload-1");
        assert_eq!(outbox.pending_count(), 0);
    }

    #[test]
    fn drain_returns_in_commit_order() {
        let outbox = Outbox::new();
        outbox.commit(event("upload-1"));
        outbox.commit(event("upload-2"));

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].upload_id, "upload-1");
        assert_eq!(outbox.pending_count(), 0);
    }
}
