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

//! Batch distribution of validated objects.
//!
//! Validation commits a [`BatchValidated`] event through the [`Outbox`];
//! the [`BatchDistributionPipeline`] consumes it, splits the object ids
//! into [`BatchUnit`]s, and dispatches them concurrently. The
//! [`ProcessedBatchRegistry`] makes redelivered units harmless.

pub mod chunk;
pub mod outbox;
pub mod pipeline;
pub mod registry;

pub use chunk::{chunk_objects, BatchObjectType, BatchUnit};
pub use outbox::{BatchValidated, Outbox};
pub use pipeline::{
    BatchDistributionPipeline, ChunkOutcome, ChunkReport, DistributionReport, DistributionState,
};
pub use registry::{BatchState, ProcessedBatchRegistry};
