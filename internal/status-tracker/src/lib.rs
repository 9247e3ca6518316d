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

//! This crate provides [`StatusTracker`], which is used by the `pkd` crate
//! and related crates to aggregate validation findings as certificates,
//! trust chains, and revocation lists are checked.
//!
//! A finding about a single object never aborts work on its siblings: it is
//! recorded as a [`LogItem`] and work continues. Callers inspect the tracker
//! afterward to classify each object.

#![deny(missing_docs)]
#![deny(warnings)]

mod log;
pub use log::{LogItem, LogKind};

mod status_tracker;
pub use status_tracker::{ErrorBehavior, StatusTracker};

pub mod validation_codes;
