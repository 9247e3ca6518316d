// Copyright 2022 Adobe. All rights reserved.
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

use thiserror::Error;

/// `Error` enumerates errors returned by most `pkd` toolkit operations.
///
/// Per-object validation findings are *not* errors in this sense: they are
/// recorded as log items in a [`StatusTracker`] and reported in the
/// operation's response. Only malformed input and infrastructure-level
/// failures surface here.
///
/// [`StatusTracker`]: pkd_status_tracker::StatusTracker
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied parameter was malformed (bad id, invalid depth,
    /// empty check set).
    #[error("bad parameter: {0}")]
    BadParam(String),

    /// Could not find a certificate with this id.
    #[error("certificate missing: id = {id}")]
    CertificateMissing {
        /// Id that could not be resolved.
        id: String,
    },

    /// The certificate or CRL store was unreachable.
    ///
    /// This aborts the surrounding operation; it is the only failure class
    /// that does.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    /// The loaded settings failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Could not parse a settings file.
    #[error(transparent)]
    SettingsFormat(#[from] config::ConfigError),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// A specialized `Result` type for `pkd` toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;
