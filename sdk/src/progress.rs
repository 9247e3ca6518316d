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

//! Progress reporting collaborator.
//!
//! How updates reach an operator (SSE, polling, a log file) is outside this
//! crate; implementations of [`ProgressReporter`] bridge to whatever
//! transport the host application uses.

use serde::{Deserialize, Serialize};

/// The coarse phase an upload is in.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ProgressStage {
    /// Certificates and CRLs are being validated.
    Validating,

    /// Validated objects are being distributed to the directory store.
    Distributing,

    /// All dispatched work for the upload finished.
    Completed,

    /// An infrastructure-level failure aborted the upload's processing.
    Failed,
}

/// Receives stage/percentage updates as an upload is processed.
///
/// Implementations must tolerate updates arriving from multiple worker
/// threads.
pub trait ProgressReporter: Send + Sync {
    /// Reports one progress update.
    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        upload_id: &str,
        stage: ProgressStage,
        percentage: u8,
        message: &str,
        processed_count: usize,
        total_count: usize,
    );
}

/// A [`ProgressReporter`] that discards every update.
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn report(&self, _: &str, _: ProgressStage, _: u8, _: &str, _: usize, _: usize) {}
}
