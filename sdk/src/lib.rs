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

#![deny(warnings)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

//! This library implements trust-chain validation and directory
//! distribution for an ICAO PKD-style ePassport PKI: country signing CA
//! (CSCA) and document signer (DSC) certificates are checked individually,
//! resolved into chains up to a trust anchor, screened against their
//! issuer's CRL, and the surviving set is published to a directory store in
//! idempotent batches.
//!
//! Certificates and CRLs arrive already parsed; the records this crate
//! consumes carry the to-be-signed bytes, signatures, and the handful of
//! extracted extensions the checks need. Persistence, the directory wire
//! protocol, and progress transport stay behind the [`CertificateStore`],
//! [`CrlStore`], [`DirectoryStore`], and [`ProgressReporter`] traits.
//!
//! The usual entry point is [`PkdEngine`]:
//!
//! ```
//! # use std::sync::Arc;
//! use pkd::{PkdEngine, NullProgressReporter, MemoryCertificateStore, MemoryCrlStore};
//! # use pkd::{Certificate, CertificateRevocationList};
//! # use pkd::{DirectoryStore, DirectoryError, EntryLocation, PublishOutcome};
//! # struct NullDirectory;
//! # #[async_trait::async_trait]
//! # impl DirectoryStore for NullDirectory {
//! #     async fn publish_certificate(
//! #         &self,
//! #         _cert: &Certificate,
//! #         _location: &EntryLocation,
//! #     ) -> Result<PublishOutcome, DirectoryError> {
//! #         Ok(PublishOutcome::Stored)
//! #     }
//! #     async fn publish_crl(
//! #         &self,
//! #         _crl: &CertificateRevocationList,
//! #         _location: &EntryLocation,
//! #     ) -> Result<PublishOutcome, DirectoryError> {
//! #         Ok(PublishOutcome::Stored)
//! #     }
//! # }
//!
//! let engine = PkdEngine::new(
//!     Arc::new(MemoryCertificateStore::new()),
//!     Arc::new(MemoryCrlStore::new()),
//!     Arc::new(NullDirectory),
//!     Arc::new(NullProgressReporter),
//! );
//! ```
//!
//! [`CertificateStore`]: crate::store::CertificateStore
//! [`CrlStore`]: crate::store::CrlStore
//! [`DirectoryStore`]: crate::directory::DirectoryStore
//! [`ProgressReporter`]: crate::progress::ProgressReporter

pub mod api;
pub mod certificate;
pub mod crl;
pub mod directory;
pub mod distribution;
mod error;
pub mod orchestrator;
pub mod progress;
pub mod raw_signature;
pub mod revocation;
pub mod settings;
pub mod store;
pub mod trust_chain;
pub mod validator;

pub use api::{
    BatchValidationResponse, DistributionResponse, PkdEngine, TrustChainResponse,
    ValidateCertificateResponse,
};
pub use certificate::{
    Certificate, CertificateId, CertificateOrigin, CertificateStatus, CertificateType,
    DistinguishedName, KeyUsage, UploadId,
};
pub use crl::{CertificateRevocationList, CrlId, CrlReasonCode, RevokedEntry};
pub use directory::{DirectoryError, DirectoryStore, EntryLocation, PublishOutcome};
pub use error::{Error, Result};
pub use progress::{NullProgressReporter, ProgressReporter, ProgressStage};
pub use settings::{get_settings_value, update_settings_value, Settings};
pub use store::{
    CertificateStore, CrlStore, MemoryCertificateStore, MemoryCrlStore, StoreError,
};
pub use validator::{CertificateCheckOutcome, CheckFlags};
